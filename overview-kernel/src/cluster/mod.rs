//! Interface du runtime de cluster
//!
//! Le status overview ne parle jamais directement aux agents : il passe par un
//! [`ClusterRuntime`] qui énumère nœuds et plugins et résout les nœuds en
//! [`Computer`] vivants. Chaque accesseur de télémétrie peut échouer ou
//! revenir vide ; c'est à l'appelant de s'en accommoder.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::security::ExecutionContext;
use self::inventory::AgentRecord;

pub mod inventory;
pub mod local;

#[cfg(test)]
pub(crate) mod fake;

/// Clé de monitor portant la description "<os> (<arch>)" du nœud.
pub const ARCHITECTURE_MONITOR: &str = "node_monitors.architecture";
/// Clé de monitor portant un [`MemoryUsage`].
pub const MEMORY_MONITOR: &str = "node_monitors.memory";

pub const RUNTIME_NAME_PROPERTY: &str = "runtime.name";
pub const RUNTIME_VERSION_PROPERTY: &str = "runtime.version";

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed telemetry: {0}")]
    Malformed(String),
    #[error("{0} unavailable")]
    Unavailable(String),
}

/// Mémoire physique rapportée par un nœud, en octets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryUsage {
    pub total_physical_memory: u64,
    pub available_physical_memory: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MonitorValue {
    Text(String),
    Memory(MemoryUsage),
}

/// Clé de monitor -> valeur ; `None` signifie que le monitor a rapporté null.
pub type MonitorData = HashMap<String, Option<MonitorValue>>;

pub type SystemProperties = HashMap<String, String>;

/// Nœud vivant du cluster, contrôleur ou agent.
pub trait Computer: Send + Sync {
    fn host_name(&self) -> Result<Option<String>, TelemetryError>;

    /// `None` quand le nœud est injoignable.
    fn monitor_data(&self) -> Option<MonitorData>;

    fn num_executors(&self) -> u32;

    fn is_offline(&self) -> bool;

    fn offline_cause_reason(&self) -> String;

    fn system_properties(&self) -> Result<SystemProperties, TelemetryError>;
}

/// Agent configuré ; se résout ou non en computer vivant.
///
/// Un handle produit par l'inventaire garde l'enregistrement lu pendant son
/// énumération : la résolution ne dépend pas d'une autre passe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeHandle {
    pub name: String,
    record: Option<Arc<AgentRecord>>,
}

impl NodeHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            record: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginInfo {
    pub short_name: String,
    pub display_name: String,
    pub version: String,
}

pub trait ClusterRuntime: Send + Sync {
    fn agent_nodes(&self, ctx: &ExecutionContext) -> Result<Vec<NodeHandle>, TelemetryError>;

    fn to_computer(&self, ctx: &ExecutionContext, node: &NodeHandle) -> Option<Arc<dyn Computer>>;

    fn controller(&self, ctx: &ExecutionContext) -> Option<Arc<dyn Computer>>;

    fn plugins(&self, ctx: &ExecutionContext) -> Result<Vec<PluginInfo>, TelemetryError>;

    fn core_version(&self) -> Option<String>;
}
