use std::sync::Arc;

use futures::StreamExt;
use k8s_openapi::api::core::v1::Node;
use kube::{
    Api, Client,
    runtime::{Controller, watcher::Config},
};
use taint_remover_crds::v1alpha1::taintremover::TaintRemover;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{
    Result,
    client::KubeOps,
    context::Context,
    controller::{error_policy, reconcile},
    events::watch_nodes,
    metrics::ControllerMetrics,
};

/// Starts the TaintRemover controller and the node watch feeding the
/// incremental removal path. Runs until the token is cancelled.
pub async fn start_taint_remover_controllers(
    client: Client,
    cancel: CancellationToken,
) -> Result<()> {
    let remover_api: Api<TaintRemover> = Api::all(client.clone());
    let node_api: Api<Node> = Api::all(client.clone());

    let context = Arc::new(Context {
        ops: KubeOps::new(client),
        cancel: cancel.clone(),
        metrics: ControllerMetrics::new("taint-remover"),
    });

    tokio::spawn(watch_nodes(node_api, context.clone(), cancel.clone()));

    info!("starting taint remover controller");
    Controller::new(remover_api, Config::default().any_semantic())
        .graceful_shutdown_on(shutdown(cancel))
        .run(reconcile, error_policy, context)
        .filter_map(|x| async move { std::result::Result::ok(x) })
        .for_each(|_| futures::future::ready(()))
        .await;
    Ok(())
}

async fn shutdown(cancel: CancellationToken) {
    cancel.cancelled().await;
}
