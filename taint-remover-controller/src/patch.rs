use k8s_openapi::api::core::v1::Taint;
use serde::Serialize;
use serde_json::Value;

use crate::Result;

/// Strategic-merge payload scoped to the node's taints field. The whole
/// resulting list is written, never a full-object replace.
#[derive(Serialize)]
struct NodePatch {
    spec: NodeSpecPatch,
}

#[derive(Serialize)]
struct NodeSpecPatch {
    taints: Vec<Taint>,
}

pub(crate) fn build(taints: Vec<Taint>) -> Result<Value> {
    Ok(serde_json::to_value(NodePatch {
        spec: NodeSpecPatch { taints },
    })?)
}
