mod client;
mod context;
mod controller;
mod diff;
mod error;
mod events;
pub mod metrics;
mod node;
mod patch;
mod registry;
mod runtime;

use k8s_openapi::api::core::v1::Node;
use serde_json::Value;
use taint_remover_crds::v1alpha1::taintremover::TaintRemover;

pub use error::Error;
pub use events::NodeEvent;
pub use runtime::start_taint_remover_controllers;

pub type Result<T> = std::result::Result<T, Error>;

/// Seam over the cluster API consumed by the reconciliation driver. A
/// vanished node reads as `None`; patches are strategic-merge payloads
/// scoped to the node's taints field.
pub(crate) trait ClusterOps {
    async fn list_removers(&self) -> Result<Vec<TaintRemover>>;
    async fn list_nodes(&self) -> Result<Vec<Node>>;
    async fn get_node(&self, name: &str) -> Result<Option<Node>>;
    async fn patch_node_taints(&self, name: &str, patch: Value) -> Result<()>;
}
