//! Vue d'un [`Computer`] tolérante aux échecs
//!
//! Chaque accesseur est isolé : un attribut absent ou en échec devient
//! [`PLACEHOLDER`] sans empêcher la lecture des autres attributs.

use std::sync::Arc;
use tracing::warn;

use crate::cluster::{
    Computer, MemoryUsage, MonitorData, MonitorValue, TelemetryError, ARCHITECTURE_MONITOR,
    MEMORY_MONITOR, RUNTIME_NAME_PROPERTY, RUNTIME_VERSION_PROPERTY,
};

pub const PLACEHOLDER: &str = "<unknown>";

const BYTES_PER_GB: f64 = (1u64 << 30) as f64;

/// Lit un champ, remplacé par [`PLACEHOLDER`] s'il manque ou échoue.
pub fn try_field<F>(field: &str, fetch: F) -> String
where
    F: FnOnce() -> Result<Option<String>, TelemetryError>,
{
    match fetch() {
        Ok(Some(value)) => value,
        Ok(None) => PLACEHOLDER.to_string(),
        Err(e) => {
            warn!("[telemetry] failed to obtain {}: {}", field, e);
            PLACEHOLDER.to_string()
        }
    }
}

/// "<used>/<total> GB", chacun arrondi au GiB entier (demi vers le haut).
pub fn format_memory(usage: &MemoryUsage) -> String {
    let used = usage
        .total_physical_memory
        .saturating_sub(usage.available_physical_memory);
    format!(
        "{}/{} GB",
        bytes_to_gb(used),
        bytes_to_gb(usage.total_physical_memory)
    )
}

fn bytes_to_gb(bytes: u64) -> u64 {
    // f64::round arrondit le demi loin de zéro, donc vers le haut ici
    (bytes as f64 / BYTES_PER_GB).round() as u64
}

pub struct NodeDetails {
    computer: Arc<dyn Computer>,
    core_version: Option<String>,
}

impl NodeDetails {
    pub fn new(computer: Arc<dyn Computer>) -> Self {
        Self {
            computer,
            core_version: None,
        }
    }

    pub fn with_core_version(mut self, version: Option<String>) -> Self {
        self.core_version = version;
        self
    }

    pub fn hostname(&self) -> String {
        try_field("hostname", || {
            Ok(self.computer.host_name()?.map(|h| h.to_lowercase()))
        })
    }

    pub fn operating_system(&self) -> String {
        try_field("operating system", || {
            Ok(match self.monitor_value(ARCHITECTURE_MONITOR) {
                Some(MonitorValue::Text(os)) => Some(os),
                _ => None,
            })
        })
    }

    pub fn num_executors(&self) -> u32 {
        self.computer.num_executors()
    }

    pub fn is_offline(&self) -> bool {
        self.computer.is_offline()
    }

    pub fn offline_cause_reason(&self) -> String {
        self.computer.offline_cause_reason()
    }

    pub fn memory_utilization(&self) -> String {
        try_field("memory utilization", || {
            Ok(match self.monitor_value(MEMORY_MONITOR) {
                Some(MonitorValue::Memory(usage)) => Some(format_memory(&usage)),
                _ => None,
            })
        })
    }

    /// "<name> <version>" ; chaque moitié a son propre repli, mais l'échec
    /// de lecture des propriétés réduit le champ à un seul placeholder.
    pub fn runtime_version(&self) -> String {
        match self.computer.system_properties() {
            Ok(props) => {
                let name = props.get(RUNTIME_NAME_PROPERTY).map(String::as_str);
                let version = props.get(RUNTIME_VERSION_PROPERTY).map(String::as_str);
                format!(
                    "{} {}",
                    name.unwrap_or(PLACEHOLDER),
                    version.unwrap_or(PLACEHOLDER)
                )
            }
            Err(e) => {
                warn!("[telemetry] failed to obtain runtime version: {}", e);
                PLACEHOLDER.to_string()
            }
        }
    }

    pub fn core_version(&self) -> String {
        try_field("core version", || Ok(self.core_version.clone()))
    }

    fn monitor_value(&self, key: &str) -> Option<MonitorValue> {
        self.monitor_data_or_empty().remove(key).flatten()
    }

    fn monitor_data_or_empty(&self) -> MonitorData {
        self.computer.monitor_data().unwrap_or_default()
    }
}
