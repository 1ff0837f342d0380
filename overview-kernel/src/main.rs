/**
 * OVERVIEW KERNEL - Point d'entrée du serveur de status overview
 *
 * RÔLE : Assembler config, permissions, inventaire du cluster, cache de
 * snapshots et API HTTP, puis servir jusqu'au Ctrl-C.
 */

use anyhow::Context;
use overview_kernel::cache::{spawn_cache_janitor, SnapshotCache};
use overview_kernel::cluster::inventory::InventoryCluster;
use overview_kernel::cluster::local::LocalComputer;
use overview_kernel::collector::Collector;
use overview_kernel::config::load_config;
use overview_kernel::http::{build_router, AppState};
use overview_kernel::security::{ApiKeyPermissions, Permission};
use overview_kernel::service::StatusService;
use overview_kernel::settings::OverviewSettings;
use overview_kernel::state::new_state;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env optionnel
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("overview_kernel=info")),
        )
        .init();

    let cfg = load_config().await;

    let settings = OverviewSettings::with_link(cfg.overview_link.as_deref()).unwrap_or_else(|e| {
        warn!("[kernel] {}, serving without overview link", e);
        OverviewSettings::default()
    });

    let mut permissions = ApiKeyPermissions::from_config(&cfg.api_keys);
    if let Ok(key) = std::env::var("OVERVIEW_API_KEY") {
        permissions = permissions.with_key("env", &key, &[Permission::Administer]);
    }
    if permissions.is_empty() {
        warn!("[kernel] no API key configured - every status request will be denied");
    }
    let permissions = Arc::new(permissions);

    let controller = Arc::new(LocalComputer::new(cfg.inventory.controller_executors));
    let runtime = Arc::new(InventoryCluster::new(&cfg.inventory).with_controller(controller));
    info!(
        "[kernel] inventory: agents {}, plugins {}",
        cfg.inventory.agents_file.display(),
        cfg.inventory.plugins_dir.display()
    );

    let cache = Arc::new(SnapshotCache::new(Duration::from_secs(cfg.cache_idle_ttl_secs)));
    spawn_cache_janitor(cache.clone(), cache.idle_ttl());

    let service = Arc::new(StatusService::new(
        cache,
        Arc::new(Collector::new(runtime)),
        permissions.clone(),
        new_state(settings),
    ));
    info!("[kernel] allowed origin: '{}'", service.link_root());

    let app = build_router(AppState { service, permissions });

    let addr: SocketAddr = cfg
        .bind
        .parse()
        .with_context(|| format!("invalid bind address {}", cfg.bind))?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("[kernel] listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("[kernel] stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("[kernel] failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
