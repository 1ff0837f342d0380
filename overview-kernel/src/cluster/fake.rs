//! Runtime en mémoire pour les tests unitaires.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::{
    ClusterRuntime, Computer, MemoryUsage, MonitorData, MonitorValue, NodeHandle, PluginInfo,
    SystemProperties, TelemetryError, ARCHITECTURE_MONITOR, MEMORY_MONITOR,
    RUNTIME_NAME_PROPERTY, RUNTIME_VERSION_PROPERTY,
};
use crate::security::{ExecutionContext, Identity};

#[derive(Debug, Clone, Default)]
pub(crate) struct FakeComputer {
    pub host_name: Option<String>,
    pub host_name_fails: bool,
    pub monitor_data: Option<MonitorData>,
    pub num_executors: u32,
    pub offline: bool,
    pub offline_reason: String,
    // None fait échouer system_properties()
    pub system_properties: Option<SystemProperties>,
}

impl FakeComputer {
    pub fn named(host: &str) -> Self {
        Self {
            host_name: Some(host.to_string()),
            monitor_data: Some(MonitorData::new()),
            system_properties: Some(SystemProperties::new()),
            ..Self::default()
        }
    }

    pub fn executors(mut self, n: u32) -> Self {
        self.num_executors = n;
        self
    }

    pub fn offline(mut self, reason: &str) -> Self {
        self.offline = true;
        self.offline_reason = reason.to_string();
        self
    }

    pub fn monitor(mut self, key: &str, value: Option<MonitorValue>) -> Self {
        self.monitor_data
            .get_or_insert_with(MonitorData::new)
            .insert(key.to_string(), value);
        self
    }

    pub fn os(self, os: &str) -> Self {
        self.monitor(ARCHITECTURE_MONITOR, Some(MonitorValue::Text(os.to_string())))
    }

    pub fn memory(self, total: u64, available: u64) -> Self {
        self.monitor(
            MEMORY_MONITOR,
            Some(MonitorValue::Memory(MemoryUsage {
                total_physical_memory: total,
                available_physical_memory: available,
            })),
        )
    }

    pub fn runtime(mut self, name: &str, version: &str) -> Self {
        let props = self.system_properties.get_or_insert_with(SystemProperties::new);
        props.insert(RUNTIME_NAME_PROPERTY.to_string(), name.to_string());
        props.insert(RUNTIME_VERSION_PROPERTY.to_string(), version.to_string());
        self
    }

    pub fn into_arc(self) -> Arc<dyn Computer> {
        Arc::new(self)
    }
}

impl Computer for FakeComputer {
    fn host_name(&self) -> Result<Option<String>, TelemetryError> {
        if self.host_name_fails {
            return Err(TelemetryError::Io(std::io::Error::other("channel closed")));
        }
        Ok(self.host_name.clone())
    }

    fn monitor_data(&self) -> Option<MonitorData> {
        self.monitor_data.clone()
    }

    fn num_executors(&self) -> u32 {
        self.num_executors
    }

    fn is_offline(&self) -> bool {
        self.offline
    }

    fn offline_cause_reason(&self) -> String {
        self.offline_reason.clone()
    }

    fn system_properties(&self) -> Result<SystemProperties, TelemetryError> {
        self.system_properties
            .clone()
            .ok_or_else(|| TelemetryError::Unavailable("system properties".into()))
    }
}

#[derive(Default)]
pub(crate) struct FakeCluster {
    pub agents: Vec<(NodeHandle, Option<Arc<dyn Computer>>)>,
    pub controller: Option<Arc<dyn Computer>>,
    pub plugins: Vec<PluginInfo>,
    pub core_version: Option<String>,
    pub fail_enumeration: AtomicBool,
    // simule une collecte lente (appelée depuis spawn_blocking)
    pub enumeration_delay: Duration,
    pub enumerations: AtomicUsize,
    pub last_identity: Mutex<Option<Identity>>,
}

impl FakeCluster {
    pub fn with_agent(mut self, name: &str, computer: Option<FakeComputer>) -> Self {
        self.agents
            .push((NodeHandle::new(name), computer.map(FakeComputer::into_arc)));
        self
    }

    pub fn with_controller(mut self, computer: FakeComputer) -> Self {
        self.controller = Some(computer.into_arc());
        self
    }

    pub fn with_plugin(mut self, name: &str, display: &str, version: &str) -> Self {
        self.plugins.push(PluginInfo {
            short_name: name.to_string(),
            display_name: display.to_string(),
            version: version.to_string(),
        });
        self
    }

    pub fn enumerations(&self) -> usize {
        self.enumerations.load(Ordering::SeqCst)
    }

    fn observe(&self, ctx: &ExecutionContext) -> Result<(), TelemetryError> {
        self.enumerations.fetch_add(1, Ordering::SeqCst);
        if !self.enumeration_delay.is_zero() {
            std::thread::sleep(self.enumeration_delay);
        }
        *self.last_identity.lock() = Some(ctx.identity().clone());
        if self.fail_enumeration.load(Ordering::SeqCst) {
            return Err(TelemetryError::Unavailable("node list".into()));
        }
        Ok(())
    }
}

impl ClusterRuntime for FakeCluster {
    fn agent_nodes(&self, ctx: &ExecutionContext) -> Result<Vec<NodeHandle>, TelemetryError> {
        self.observe(ctx)?;
        Ok(self.agents.iter().map(|(node, _)| node.clone()).collect())
    }

    fn to_computer(&self, _ctx: &ExecutionContext, node: &NodeHandle) -> Option<Arc<dyn Computer>> {
        self.agents
            .iter()
            .find(|(n, _)| n == node)
            .and_then(|(_, computer)| computer.clone())
    }

    fn controller(&self, ctx: &ExecutionContext) -> Option<Arc<dyn Computer>> {
        let _ = self.observe(ctx);
        self.controller.clone()
    }

    fn plugins(&self, ctx: &ExecutionContext) -> Result<Vec<PluginInfo>, TelemetryError> {
        self.observe(ctx)?;
        Ok(self.plugins.clone())
    }

    fn core_version(&self) -> Option<String> {
        self.core_version.clone()
    }
}
