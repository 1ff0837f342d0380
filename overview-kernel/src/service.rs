//! Service de statut : contrôle d'accès, cache de snapshots et collecte élevée.

use std::sync::Arc;
use tracing::{debug, info};

use crate::cache::{SnapshotCache, StatusCategory};
use crate::collector::Collector;
use crate::error::StatusError;
use crate::response::CorsResponse;
use crate::security::{with_elevated_context, Identity, Permission, PermissionEvaluator};
use crate::settings::{LinkAction, OverviewSettings};
use crate::state::Shared;

pub struct StatusService {
    cache: Arc<SnapshotCache>,
    collector: Arc<Collector>,
    permissions: Arc<dyn PermissionEvaluator>,
    settings: Shared<OverviewSettings>,
}

impl StatusService {
    pub fn new(
        cache: Arc<SnapshotCache>,
        collector: Arc<Collector>,
        permissions: Arc<dyn PermissionEvaluator>,
        settings: Shared<OverviewSettings>,
    ) -> Self {
        Self {
            cache,
            collector,
            permissions,
            settings,
        }
    }

    pub fn cache(&self) -> &Arc<SnapshotCache> {
        &self.cache
    }

    /// Sert une catégorie. La permission est vérifiée avant tout accès au
    /// cache ; un miss collecte sous le contexte système.
    pub async fn status(
        &self,
        identity: &Identity,
        category: StatusCategory,
    ) -> Result<CorsResponse, StatusError> {
        self.permissions.require_read_permission(identity)?;
        debug!("[status] {} status request from '{}'", category, identity);

        let collector = self.collector.clone();
        let payload = self
            .cache
            .get(category, move || collect_elevated(collector, category))
            .await?;

        Ok(CorsResponse::json(payload, self.link_root()))
    }

    pub fn link_root(&self) -> String {
        self.settings.lock().link_root()
    }

    pub fn link_action(&self, identity: &Identity) -> Result<Option<LinkAction>, StatusError> {
        self.permissions.require_read_permission(identity)?;
        Ok(self.settings.lock().link_action())
    }

    pub fn check_link(&self, identity: &Identity, link: &str) -> Result<(), StatusError> {
        self.permissions.require(identity, Permission::Administer)?;
        crate::settings::check_overview_link(link)
    }

    pub fn configure(&self, identity: &Identity, link: Option<&str>) -> Result<(), StatusError> {
        self.permissions.require(identity, Permission::Administer)?;
        let mut settings = self.settings.lock();
        settings.set_overview_link(link)?;
        info!("[status] overview link set to '{}' by {}", settings.overview_link(), identity);
        Ok(())
    }
}

async fn collect_elevated(
    collector: Arc<Collector>,
    category: StatusCategory,
) -> Result<Option<String>, StatusError> {
    tokio::task::spawn_blocking(move || with_elevated_context(|ctx| collector.collect(ctx, category)))
        .await?
}
