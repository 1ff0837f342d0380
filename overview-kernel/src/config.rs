use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::warn;

use crate::cache::DEFAULT_IDLE_TTL;
use crate::security::Permission;

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct KernelConfig {
    pub bind: String,
    pub overview_link: Option<String>,
    pub api_keys: HashMap<String, ApiKeyConf>,
    pub inventory: InventoryConf,
    pub cache_idle_ttl_secs: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ApiKeyConf {
    pub key: String,
    #[serde(default = "default_permissions")]
    pub permissions: Vec<Permission>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct InventoryConf {
    pub agents_file: PathBuf,
    pub plugins_dir: PathBuf,
    pub controller_executors: u32,
    pub heartbeat_timeout_secs: u64,
}

fn default_permissions() -> Vec<Permission> {
    vec![Permission::Read]
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".into(),
            overview_link: None,
            api_keys: HashMap::new(),
            inventory: InventoryConf::default(),
            cache_idle_ttl_secs: DEFAULT_IDLE_TTL.as_secs(),
        }
    }
}

impl Default for InventoryConf {
    fn default() -> Self {
        Self {
            agents_file: PathBuf::from("./data/agents.json"),
            plugins_dir: PathBuf::from("./plugins"),
            controller_executors: 2,
            heartbeat_timeout_secs: 120,
        }
    }
}

/// Parse la config YAML ; un texte vide donne la config par défaut.
pub fn parse_config(txt: &str) -> Result<KernelConfig, serde_yaml::Error> {
    if txt.trim().is_empty() {
        return Ok(KernelConfig::default());
    }
    let mut cfg: KernelConfig = serde_yaml::from_str(txt)?;

    // TTL nul : cache inopérant et janitor sans période
    if cfg.cache_idle_ttl_secs == 0 {
        warn!(
            "[kernel] cache_idle_ttl_secs must be positive, using {}",
            DEFAULT_IDLE_TTL.as_secs()
        );
        cfg.cache_idle_ttl_secs = DEFAULT_IDLE_TTL.as_secs();
    }
    Ok(cfg)
}

/// Charge la config pointée par OVERVIEW_KERNEL_CONFIG (défaut overview.yaml).
pub async fn load_config() -> KernelConfig {
    let path = std::env::var("OVERVIEW_KERNEL_CONFIG").unwrap_or_else(|_| "overview.yaml".into());
    if Path::new(&path).exists() {
        let txt = fs::read_to_string(&path).await.unwrap_or_default();
        parse_config(&txt).unwrap_or_else(|e| {
            warn!("[kernel] invalid config {}: {}", path, e);
            KernelConfig::default()
        })
    } else {
        warn!("[kernel] no {} found, using default config", path);
        KernelConfig::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = KernelConfig::default();
        assert_eq!(cfg.bind, "0.0.0.0:8080");
        assert_eq!(cfg.cache_idle_ttl_secs, 180);
        assert!(cfg.overview_link.is_none());
        assert_eq!(cfg.inventory.heartbeat_timeout_secs, 120);
    }

    #[test]
    fn test_empty_config_is_default() {
        let cfg = parse_config("  \n").unwrap();
        assert_eq!(cfg.bind, KernelConfig::default().bind);
    }

    #[test]
    fn test_partial_config() {
        let cfg = parse_config(
            r#"
overview_link: "https://abc.de/overview"
api_keys:
  dashboard:
    key: "s3cret"
  ops:
    key: "root"
    permissions: [administer]
inventory:
  agents_file: /var/lib/overview/agents.json
"#,
        )
        .unwrap();

        assert_eq!(cfg.overview_link.as_deref(), Some("https://abc.de/overview"));
        assert_eq!(cfg.api_keys["dashboard"].permissions, vec![Permission::Read]);
        assert_eq!(cfg.api_keys["ops"].permissions, vec![Permission::Administer]);
        assert_eq!(cfg.inventory.agents_file, PathBuf::from("/var/lib/overview/agents.json"));
        assert_eq!(cfg.inventory.plugins_dir, PathBuf::from("./plugins"));
        assert_eq!(cfg.cache_idle_ttl_secs, 180);
    }

    #[test]
    fn test_zero_cache_ttl_uses_default() {
        let cfg = parse_config("cache_idle_ttl_secs: 0").unwrap();
        assert_eq!(cfg.cache_idle_ttl_secs, DEFAULT_IDLE_TTL.as_secs());

        let cfg = parse_config("cache_idle_ttl_secs: 30").unwrap();
        assert_eq!(cfg.cache_idle_ttl_secs, 30);
    }

    #[test]
    fn test_invalid_config() {
        assert!(parse_config("bind: [1, 2").is_err());
    }
}
