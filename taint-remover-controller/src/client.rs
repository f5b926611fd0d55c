use k8s_openapi::api::core::v1::Node;
use kube::{
    Api, Client,
    api::{ListParams, Patch, PatchParams},
};
use serde_json::Value;
use taint_remover_crds::v1alpha1::taintremover::TaintRemover;
use tracing::debug;

use crate::{ClusterOps, Result};

/// `ClusterOps` backed by the real cluster API.
pub(crate) struct KubeOps {
    client: Client,
}

impl KubeOps {
    pub(crate) fn new(client: Client) -> Self {
        Self { client }
    }
}

impl ClusterOps for KubeOps {
    async fn list_removers(&self) -> Result<Vec<TaintRemover>> {
        let api: Api<TaintRemover> = Api::all(self.client.clone());
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn list_nodes(&self) -> Result<Vec<Node>> {
        let api: Api<Node> = Api::all(self.client.clone());
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn get_node(&self, name: &str) -> Result<Option<Node>> {
        let api: Api<Node> = Api::all(self.client.clone());
        Ok(api.get_opt(name).await?)
    }

    async fn patch_node_taints(&self, name: &str, patch: Value) -> Result<()> {
        let api: Api<Node> = Api::all(self.client.clone());
        debug!("applying node patch {}", patch);
        api.patch(name, &PatchParams::default(), &Patch::Strategic(&patch))
            .await?;
        Ok(())
    }
}
