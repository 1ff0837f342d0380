//! Construit le payload JSON d'une catégorie de statut depuis le runtime du cluster.

use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::cache::StatusCategory;
use crate::cluster::{ClusterRuntime, TelemetryError};
use crate::error::StatusError;
use crate::security::ExecutionContext;
use crate::telemetry::NodeDetails;

/// Ligne décrivant un nœud. Les agents portent `status`, le contrôleur
/// `coreVersion` ; les autres clés sont toujours présentes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRow {
    pub name: String,
    pub operating_system: String,
    pub num_executors: String,
    pub memory: String,
    pub runtime_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub core_version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginRow {
    pub name: String,
    pub display_name: String,
    pub version: String,
}

pub struct Collector {
    runtime: Arc<dyn ClusterRuntime>,
}

impl Collector {
    pub fn new(runtime: Arc<dyn ClusterRuntime>) -> Self {
        Self { runtime }
    }

    /// `Ok(None)` : rien à rapporter (contrôleur non résolu).
    pub fn collect(
        &self,
        ctx: &ExecutionContext,
        category: StatusCategory,
    ) -> Result<Option<String>, StatusError> {
        match category {
            StatusCategory::Agents => self.collect_agents(ctx).map(Some),
            StatusCategory::Controller => self.collect_controller(ctx),
            StatusCategory::Plugins => self.collect_plugins(ctx).map(Some),
        }
    }

    fn collect_agents(&self, ctx: &ExecutionContext) -> Result<String, StatusError> {
        let nodes = self.runtime.agent_nodes(ctx).map_err(enumeration_failed)?;
        let mut rows = Vec::with_capacity(nodes.len());

        for node in &nodes {
            match self.runtime.to_computer(ctx, node) {
                Some(computer) => rows.push(agent_row(&NodeDetails::new(computer))),
                None => debug!("[collector] agent '{}' has no live computer, skipped", node.name),
            }
        }

        debug!("[collector] {} of {} agents reported", rows.len(), nodes.len());
        to_json(&rows)
    }

    fn collect_controller(&self, ctx: &ExecutionContext) -> Result<Option<String>, StatusError> {
        let Some(computer) = self.runtime.controller(ctx) else {
            debug!("[collector] controller computer not found");
            return Ok(None);
        };

        let details = NodeDetails::new(computer).with_core_version(self.runtime.core_version());
        to_json(&[controller_row(&details)]).map(Some)
    }

    fn collect_plugins(&self, ctx: &ExecutionContext) -> Result<String, StatusError> {
        let rows: Vec<PluginRow> = self
            .runtime
            .plugins(ctx)
            .map_err(enumeration_failed)?
            .into_iter()
            .map(|plugin| PluginRow {
                name: plugin.short_name,
                display_name: plugin.display_name,
                version: plugin.version,
            })
            .collect();

        to_json(&rows)
    }
}

fn node_row(details: &NodeDetails) -> NodeRow {
    NodeRow {
        name: details.hostname(),
        operating_system: details.operating_system(),
        num_executors: details.num_executors().to_string(),
        memory: details.memory_utilization(),
        runtime_version: details.runtime_version(),
        status: None,
        core_version: None,
    }
}

fn agent_row(details: &NodeDetails) -> NodeRow {
    let status = if details.is_offline() {
        format!("Offline ({})", details.offline_cause_reason())
    } else {
        "Online".to_string()
    };
    NodeRow {
        status: Some(status),
        ..node_row(details)
    }
}

fn controller_row(details: &NodeDetails) -> NodeRow {
    NodeRow {
        core_version: Some(details.core_version()),
        ..node_row(details)
    }
}

fn enumeration_failed(e: TelemetryError) -> StatusError {
    StatusError::CollectionFailed(format!("cluster enumeration failed: {e}"))
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, StatusError> {
    serde_json::to_string(value).map_err(|e| StatusError::CollectionFailed(e.to_string()))
}
