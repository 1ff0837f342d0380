/**
 * INVENTORY RUNTIME - Runtime de cluster adossé à des fichiers
 *
 * RÔLE : Exposer les agents du registre (agents.json, un enregistrement par
 * agent_id avec les métriques du dernier heartbeat) et les plugins décrits
 * par les manifests JSON du dossier plugins.
 *
 * OPÉRATION :
 * - le registre est relu à chaque énumération, le cache de snapshots devant
 *   garde ce coût faible
 * - chaque handle emporte l'enregistrement lu par son énumération
 * - un agent dont le dernier heartbeat dépasse le timeout est offline
 * - les agents retirés ne se résolvent pas en computer
 * - les agents restreints ne sont visibles que du contexte système
 */

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::{debug, warn};

use super::{
    ClusterRuntime, Computer, MemoryUsage, MonitorData, MonitorValue, NodeHandle, PluginInfo,
    SystemProperties, TelemetryError, ARCHITECTURE_MONITOR, MEMORY_MONITOR,
    RUNTIME_NAME_PROPERTY, RUNTIME_VERSION_PROPERTY,
};
use crate::config::InventoryConf;
use crate::security::ExecutionContext;

const BYTES_PER_MB: u64 = 1024 * 1024;

// Enregistrement du registre, indexé par agent_id dans agents.json
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentRecord {
    pub hostname: Option<String>,
    pub os: Option<String>,           // linux, windows, android, macos
    pub architecture: Option<String>, // x86_64, aarch64, ...
    #[serde(default = "default_executors")]
    pub executors: u32,
    #[serde(default = "default_status")]
    pub status: String, // online, offline, maintenance
    pub offline_reason: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_seen: Option<OffsetDateTime>,
    pub memory: Option<AgentMemory>,
    pub runtime: Option<AgentRuntime>,
    #[serde(default)]
    pub retired: bool,
    #[serde(default)]
    pub restricted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentMemory {
    pub total_mb: u64,
    pub used_mb: u64,
    pub available_mb: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentRuntime {
    pub name: Option<String>,
    pub version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginManifest {
    pub name: String,
    pub version: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
}

fn default_executors() -> u32 {
    1
}

fn default_status() -> String {
    "online".to_string()
}

pub type AgentsMap = BTreeMap<String, AgentRecord>;

pub struct InventoryCluster {
    agents_file: PathBuf,
    plugins_dir: PathBuf,
    heartbeat_timeout: Duration,
    controller: Option<Arc<dyn Computer>>,
    core_version: Option<String>,
}

impl InventoryCluster {
    pub fn new(conf: &InventoryConf) -> Self {
        Self {
            agents_file: conf.agents_file.clone(),
            plugins_dir: conf.plugins_dir.clone(),
            heartbeat_timeout: Duration::from_secs(conf.heartbeat_timeout_secs),
            controller: None,
            core_version: Some(env!("CARGO_PKG_VERSION").to_string()),
        }
    }

    pub fn with_controller(mut self, controller: Arc<dyn Computer>) -> Self {
        self.controller = Some(controller);
        self
    }

    pub fn with_core_version(mut self, version: Option<String>) -> Self {
        self.core_version = version;
        self
    }

    fn load_agents(&self) -> Result<AgentsMap, TelemetryError> {
        if !self.agents_file.exists() {
            debug!("[inventory] no agents file at {}", self.agents_file.display());
            return Ok(AgentsMap::new());
        }

        let content = std::fs::read_to_string(&self.agents_file)?;
        serde_json::from_str(&content).map_err(|e| {
            TelemetryError::Malformed(format!("{}: {}", self.agents_file.display(), e))
        })
    }

    fn load_manifest(path: &Path) -> Result<PluginManifest, TelemetryError> {
        let content = std::fs::read_to_string(path)?;
        let manifest: PluginManifest = serde_json::from_str(&content)
            .map_err(|e| TelemetryError::Malformed(e.to_string()))?;

        if manifest.name.is_empty() {
            return Err(TelemetryError::Malformed("name cannot be empty".to_string()));
        }
        Ok(manifest)
    }
}

impl ClusterRuntime for InventoryCluster {
    fn agent_nodes(&self, ctx: &ExecutionContext) -> Result<Vec<NodeHandle>, TelemetryError> {
        let nodes = self
            .load_agents()?
            .into_iter()
            .filter(|(_, record)| ctx.is_system() || !record.restricted)
            .map(|(id, record)| NodeHandle {
                name: id,
                record: Some(Arc::new(record)),
            })
            .collect();
        Ok(nodes)
    }

    fn to_computer(&self, ctx: &ExecutionContext, node: &NodeHandle) -> Option<Arc<dyn Computer>> {
        let record = node.record.as_deref()?;
        if record.retired || (record.restricted && !ctx.is_system()) {
            return None;
        }

        Some(Arc::new(AgentComputer {
            record: record.clone(),
            heartbeat_timeout: self.heartbeat_timeout,
            now: OffsetDateTime::now_utc(),
        }))
    }

    fn controller(&self, _ctx: &ExecutionContext) -> Option<Arc<dyn Computer>> {
        self.controller.clone()
    }

    fn plugins(&self, _ctx: &ExecutionContext) -> Result<Vec<PluginInfo>, TelemetryError> {
        let entries = match std::fs::read_dir(&self.plugins_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("[inventory] no plugins dir at {}", self.plugins_dir.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut plugins = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            match Self::load_manifest(&path) {
                Ok(manifest) => plugins.push(PluginInfo {
                    display_name: manifest.display_name.unwrap_or_else(|| manifest.name.clone()),
                    short_name: manifest.name,
                    version: manifest.version,
                }),
                Err(e) => warn!("[inventory] failed to load manifest {}: {}", path.display(), e),
            }
        }

        plugins.sort_by(|a, b| a.short_name.cmp(&b.short_name));
        Ok(plugins)
    }

    fn core_version(&self) -> Option<String> {
        self.core_version.clone()
    }
}

/// Agent vu à travers son dernier enregistrement.
struct AgentComputer {
    record: AgentRecord,
    heartbeat_timeout: Duration,
    now: OffsetDateTime,
}

impl AgentComputer {
    fn heartbeat_age(&self) -> Option<Duration> {
        let age = self.now - self.record.last_seen?;
        Some(Duration::from_secs(age.whole_seconds().max(0) as u64))
    }

    fn is_stale(&self) -> bool {
        self.heartbeat_age()
            .is_some_and(|age| age > self.heartbeat_timeout)
    }
}

impl Computer for AgentComputer {
    fn host_name(&self) -> Result<Option<String>, TelemetryError> {
        Ok(self.record.hostname.clone())
    }

    fn monitor_data(&self) -> Option<MonitorData> {
        let record = &self.record;
        if record.os.is_none() && record.architecture.is_none() && record.memory.is_none() {
            return None;
        }

        let architecture = record.os.as_ref().map(|os| match &record.architecture {
            Some(arch) => MonitorValue::Text(format!("{os} ({arch})")),
            None => MonitorValue::Text(os.clone()),
        });
        let memory = record.memory.as_ref().map(|m| {
            let available_mb = m.available_mb.unwrap_or(m.total_mb.saturating_sub(m.used_mb));
            MonitorValue::Memory(MemoryUsage {
                total_physical_memory: m.total_mb * BYTES_PER_MB,
                available_physical_memory: available_mb * BYTES_PER_MB,
            })
        });

        let mut data = MonitorData::new();
        data.insert(ARCHITECTURE_MONITOR.to_string(), architecture);
        data.insert(MEMORY_MONITOR.to_string(), memory);
        Some(data)
    }

    fn num_executors(&self) -> u32 {
        self.record.executors
    }

    fn is_offline(&self) -> bool {
        self.record.status == "offline" || self.is_stale()
    }

    fn offline_cause_reason(&self) -> String {
        if let Some(reason) = &self.record.offline_reason {
            return reason.clone();
        }
        match self.heartbeat_age() {
            Some(age) if age > self.heartbeat_timeout => {
                format!("no heartbeat for {}s", age.as_secs())
            }
            _ => "disconnected".to_string(),
        }
    }

    fn system_properties(&self) -> Result<SystemProperties, TelemetryError> {
        let runtime = self
            .record
            .runtime
            .as_ref()
            .ok_or_else(|| TelemetryError::Unavailable("system properties".into()))?;

        let mut props = SystemProperties::new();
        if let Some(name) = &runtime.name {
            props.insert(RUNTIME_NAME_PROPERTY.to_string(), name.clone());
        }
        if let Some(version) = &runtime.version {
            props.insert(RUNTIME_VERSION_PROPERTY.to_string(), version.clone());
        }
        Ok(props)
    }
}
