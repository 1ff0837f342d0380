//! Nœud contrôleur adossé à la machine locale.
//!
//! Nom d'hôte, système et mémoire physique viennent de `sysinfo` ; les
//! propriétés runtime décrivent ce build du kernel.

use parking_lot::Mutex;
use sysinfo::System;

use super::{
    Computer, MemoryUsage, MonitorData, MonitorValue, SystemProperties, TelemetryError,
    ARCHITECTURE_MONITOR, MEMORY_MONITOR, RUNTIME_NAME_PROPERTY, RUNTIME_VERSION_PROPERTY,
};

pub struct LocalComputer {
    executors: u32,
    system: Mutex<System>,
}

impl LocalComputer {
    pub fn new(executors: u32) -> Self {
        Self {
            executors,
            system: Mutex::new(System::new()),
        }
    }

    fn memory(&self) -> Option<MemoryUsage> {
        let mut sys = self.system.lock();
        sys.refresh_memory();

        let total = sys.total_memory();
        if total == 0 {
            return None;
        }
        Some(MemoryUsage {
            total_physical_memory: total,
            available_physical_memory: sys.available_memory(),
        })
    }
}

impl Computer for LocalComputer {
    fn host_name(&self) -> Result<Option<String>, TelemetryError> {
        Ok(System::host_name())
    }

    fn monitor_data(&self) -> Option<MonitorData> {
        let architecture = System::name()
            .map(|os| MonitorValue::Text(format!("{} ({})", os, std::env::consts::ARCH)));

        let mut data = MonitorData::new();
        data.insert(ARCHITECTURE_MONITOR.to_string(), architecture);
        data.insert(MEMORY_MONITOR.to_string(), self.memory().map(MonitorValue::Memory));
        Some(data)
    }

    fn num_executors(&self) -> u32 {
        self.executors
    }

    fn is_offline(&self) -> bool {
        false
    }

    fn offline_cause_reason(&self) -> String {
        String::new()
    }

    fn system_properties(&self) -> Result<SystemProperties, TelemetryError> {
        let mut props = SystemProperties::new();
        props.insert(RUNTIME_NAME_PROPERTY.to_string(), env!("CARGO_PKG_NAME").to_string());
        props.insert(RUNTIME_VERSION_PROPERTY.to_string(), env!("CARGO_PKG_VERSION").to_string());
        Ok(props)
    }
}
