use std::{sync::Arc, time::Duration};

use k8s_openapi::api::core::v1::Node;
use kube::{ResourceExt, runtime::controller::Action};
use serde_json::Value;
use taint_remover_crds::v1alpha1::taintremover::{TaintRemover, TaintSpec};
use tracing::{Span, debug, error, field, info, instrument};

use crate::{
    ClusterOps, Error, Result,
    context::Context,
    diff::remaining_taints,
    metrics,
    node::{node_taints, tainted_nodes},
    patch,
    registry::removal_set,
};

pub(crate) const DEFAULT_REQUEUE_DURATION: Duration = Duration::from_secs(300);
const ERROR_REQUEUE_DURATION: Duration = Duration::from_secs(5);

#[instrument(skip(ctx, remover), fields(trace_id))]
pub(crate) async fn reconcile<C: ClusterOps>(
    remover: Arc<TaintRemover>,
    ctx: Arc<Context<C>>,
) -> Result<Action> {
    let trace_id = metrics::get_trace_id();
    if trace_id != opentelemetry::trace::TraceId::INVALID {
        Span::current().record("trace_id", field::display(&trace_id));
    }
    let _timer = ctx.metrics.count_and_measure(remover.as_ref(), &trace_id);

    info!("started reconciling TaintRemover {}", remover.name_any());
    let removed = remove_declared_taints(&ctx).await?;
    if removed > 0 {
        info!("removed declared taints from {} nodes", removed);
    }

    // periodic requeue backstops node events lost while the watch was away
    Ok(Action::requeue(DEFAULT_REQUEUE_DURATION))
}

pub(crate) fn error_policy<C: ClusterOps>(
    remover: Arc<TaintRemover>,
    error: &Error,
    ctx: Arc<Context<C>>,
) -> Action {
    ctx.metrics.count_failure(remover.as_ref(), error);
    let name = remover.name_any();
    error!(?error, "reconcile error for TaintRemover {}", name);
    Action::requeue(ERROR_REQUEUE_DURATION)
}

/// One full pass: collect the declared removal set, scan for tainted nodes,
/// strip matching taints from each. Returns how many nodes were patched; the
/// last per-node failure, if any, comes back as the error so the framework
/// re-queues the whole pass. Already-clean nodes diff to unchanged, so the
/// re-run is safe.
pub(crate) async fn remove_declared_taints<C: ClusterOps>(ctx: &Context<C>) -> Result<usize> {
    let removal = removal_set(&ctx.ops.list_removers().await?);
    if removal.is_empty() {
        return Ok(0);
    }
    debug!("collected {} declared taints", removal.len());

    let nodes = tainted_nodes(ctx.ops.list_nodes().await?);
    if nodes.is_empty() {
        return Ok(0);
    }
    debug!("found {} tainted nodes", nodes.len());

    let (removed, last_err) = remove_taints_from_nodes(ctx, &nodes, &removal).await;
    ctx.metrics.nodes_patched.inc_by(removed as u64);
    match last_err {
        Some(err) => Err(err),
        None => Ok(removed),
    }
}

/// Strips declared taints node by node. One node's failure never blocks its
/// siblings; cancellation stops the loop and surfaces as the last error.
pub(crate) async fn remove_taints_from_nodes<C: ClusterOps>(
    ctx: &Context<C>,
    nodes: &[Node],
    removal: &[TaintSpec],
) -> (usize, Option<Error>) {
    let mut removed = 0;
    let mut last_err = None;

    for node in nodes {
        let name = node.name_any();
        let (remaining, changed) = remaining_taints(node_taints(node), removal);
        if !changed {
            continue;
        }
        let payload = match patch::build(remaining) {
            Ok(payload) => payload,
            Err(err) => {
                error!(%err, "failed to build taint patch for node {}", name);
                last_err = Some(err);
                continue;
            }
        };
        match patch_node(ctx, &name, payload).await {
            Ok(()) => {
                info!("removed declared taints from node {}", name);
                removed += 1;
            }
            Err(Error::Canceled) => {
                error!("taint removal pass canceled at node {}", name);
                last_err = Some(Error::Canceled);
                break;
            }
            Err(err) => {
                error!(%err, "failed to patch node {}", name);
                last_err = Some(err);
            }
        }
    }

    (removed, last_err)
}

/// Applies the declared removal set to a single node, as routed from a node
/// lifecycle event. A vanished node and a node without taints are both
/// nothing to clean; the periodic full pass covers anything missed here.
pub(crate) async fn apply_removal_on_node<C: ClusterOps>(
    ctx: &Context<C>,
    name: &str,
) -> Result<()> {
    let Some(node) = ctx.ops.get_node(name).await? else {
        debug!("node {} no longer exists, nothing to clean", name);
        return Ok(());
    };
    let taints = node_taints(&node);
    if taints.is_empty() {
        return Ok(());
    }

    let removal = removal_set(&ctx.ops.list_removers().await?);
    if removal.is_empty() {
        return Ok(());
    }
    debug!(
        "node {} carries {} taints, {} declared for removal",
        name,
        taints.len(),
        removal.len()
    );

    let (remaining, changed) = remaining_taints(taints, &removal);
    if !changed {
        return Ok(());
    }
    let payload = patch::build(remaining)?;
    patch_node(ctx, name, payload).await?;
    ctx.metrics.nodes_patched.inc();
    info!("removed declared taints from node {}", name);
    Ok(())
}

/// A single patch raced against pass cancellation.
async fn patch_node<C: ClusterOps>(ctx: &Context<C>, name: &str, payload: Value) -> Result<()> {
    tokio::select! {
        biased;
        _ = ctx.cancel.cancelled() => Err(Error::Canceled),
        res = ctx.ops.patch_node_taints(name, payload) => res,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Mutex;

    use k8s_openapi::api::core::v1::{Node, NodeSpec, Taint};
    use kube::api::ObjectMeta;
    use kube::core::ErrorResponse;
    use serde_json::{Value, json};
    use taint_remover_crds::v1alpha1::taintremover::{
        TaintEffect, TaintRemover, TaintRemoverSpec, TaintSpec,
    };
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::metrics::ControllerMetrics;

    struct FakeCluster {
        removers: Vec<TaintRemover>,
        nodes: Vec<Node>,
        fail_patches: HashSet<String>,
        patches: Mutex<Vec<(String, Value)>>,
    }

    impl ClusterOps for FakeCluster {
        async fn list_removers(&self) -> Result<Vec<TaintRemover>> {
            Ok(self.removers.clone())
        }

        async fn list_nodes(&self) -> Result<Vec<Node>> {
            Ok(self.nodes.clone())
        }

        async fn get_node(&self, name: &str) -> Result<Option<Node>> {
            Ok(self
                .nodes
                .iter()
                .find(|node| node.metadata.name.as_deref() == Some(name))
                .cloned())
        }

        async fn patch_node_taints(&self, name: &str, patch: Value) -> Result<()> {
            if self.fail_patches.contains(name) {
                return Err(Error::KubeError(kube::Error::Api(ErrorResponse {
                    status: "Failure".into(),
                    message: format!("patch rejected for {name}"),
                    reason: "Conflict".into(),
                    code: 409,
                })));
            }
            self.patches.lock().unwrap().push((name.into(), patch));
            Ok(())
        }
    }

    fn make_context(
        test_name: &str,
        removers: Vec<TaintRemover>,
        nodes: Vec<Node>,
        fail_patches: &[&str],
    ) -> Context<FakeCluster> {
        Context {
            ops: FakeCluster {
                removers,
                nodes,
                fail_patches: fail_patches.iter().map(|n| (*n).into()).collect(),
                patches: Mutex::new(Vec::new()),
            },
            cancel: CancellationToken::new(),
            metrics: ControllerMetrics::new(test_name),
        }
    }

    fn make_taint(key: &str, value: Option<&str>, effect: &str) -> Taint {
        Taint {
            key: key.into(),
            value: value.map(Into::into),
            effect: effect.into(),
            ..Default::default()
        }
    }

    fn make_node(name: &str, taints: Vec<Taint>) -> Node {
        Node {
            metadata: ObjectMeta {
                name: Some(name.into()),
                ..Default::default()
            },
            spec: Some(NodeSpec {
                taints: Some(taints),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn make_remover(name: &str, taints: Vec<TaintSpec>) -> TaintRemover {
        TaintRemover::new(name, TaintRemoverSpec { taints })
    }

    fn spec_taint(key: &str, value: Option<&str>, effect: TaintEffect) -> TaintSpec {
        TaintSpec {
            key: key.into(),
            value: value.map(Into::into),
            effect,
        }
    }

    fn patched_names(ctx: &Context<FakeCluster>) -> Vec<String> {
        ctx.ops
            .patches
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    #[tokio::test]
    async fn test_full_pass_removes_declared_taints() {
        let ctx = make_context(
            "full-pass",
            vec![make_remover(
                "remover",
                vec![spec_taint("foo", Some("bar"), TaintEffect::NoSchedule)],
            )],
            vec![make_node(
                "node-a",
                vec![
                    make_taint("foo", Some("bar"), "NoSchedule"),
                    make_taint("not-ready", None, "NoSchedule"),
                ],
            )],
            &[],
        );

        let removed = remove_declared_taints(&ctx).await.unwrap();

        assert_eq!(removed, 1);
        let patches = ctx.ops.patches.lock().unwrap();
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].0, "node-a");
        assert_eq!(
            patches[0].1,
            json!({"spec": {"taints": [{"key": "not-ready", "effect": "NoSchedule"}]}})
        );
    }

    #[tokio::test]
    async fn test_full_pass_without_sources_is_noop() {
        let ctx = make_context(
            "no-sources",
            Vec::new(),
            vec![make_node("node-a", vec![make_taint("foo", None, "NoSchedule")])],
            &[],
        );

        let removed = remove_declared_taints(&ctx).await.unwrap();

        assert_eq!(removed, 0);
        assert!(patched_names(&ctx).is_empty());
    }

    #[tokio::test]
    async fn test_full_pass_without_tainted_nodes_is_noop() {
        let ctx = make_context(
            "no-tainted-nodes",
            vec![make_remover(
                "remover",
                vec![spec_taint("foo", None, TaintEffect::NoSchedule)],
            )],
            vec![make_node("node-a", Vec::new()), Node::default()],
            &[],
        );

        let removed = remove_declared_taints(&ctx).await.unwrap();

        assert_eq!(removed, 0);
        assert!(patched_names(&ctx).is_empty());
    }

    #[tokio::test]
    async fn test_full_pass_skips_nodes_without_matching_taints() {
        let ctx = make_context(
            "no-matches",
            vec![make_remover(
                "remover",
                vec![spec_taint("foo", None, TaintEffect::NoSchedule)],
            )],
            vec![make_node(
                "node-a",
                vec![make_taint("unrelated", None, "NoExecute")],
            )],
            &[],
        );

        let removed = remove_declared_taints(&ctx).await.unwrap();

        assert_eq!(removed, 0);
        assert!(patched_names(&ctx).is_empty());
    }

    #[tokio::test]
    async fn test_failing_node_does_not_block_siblings() {
        let removal = vec![spec_taint("foo", None, TaintEffect::NoSchedule)];
        let nodes = vec![
            make_node("node-1", vec![make_taint("foo", None, "NoSchedule")]),
            make_node("node-2", vec![make_taint("foo", None, "NoSchedule")]),
            make_node("node-3", vec![make_taint("foo", None, "NoSchedule")]),
        ];
        let ctx = make_context("partial-failure", Vec::new(), nodes.clone(), &["node-2"]);

        let (removed, last_err) = remove_taints_from_nodes(&ctx, &nodes, &removal).await;

        assert_eq!(removed, 2);
        assert!(last_err.is_some());
        assert_eq!(patched_names(&ctx), vec!["node-1", "node-3"]);
    }

    #[tokio::test]
    async fn test_canceled_pass_stops_and_surfaces_error() {
        let removal = vec![spec_taint("foo", None, TaintEffect::NoSchedule)];
        let nodes = vec![
            make_node("node-1", vec![make_taint("foo", None, "NoSchedule")]),
            make_node("node-2", vec![make_taint("foo", None, "NoSchedule")]),
        ];
        let ctx = make_context("canceled", Vec::new(), nodes.clone(), &[]);
        ctx.cancel.cancel();

        let (removed, last_err) = remove_taints_from_nodes(&ctx, &nodes, &removal).await;

        assert_eq!(removed, 0);
        assert!(matches!(last_err, Some(Error::Canceled)));
        assert!(patched_names(&ctx).is_empty());
    }

    #[tokio::test]
    async fn test_apply_on_node_removes_matching_taints() {
        let ctx = make_context(
            "apply-on-node",
            vec![make_remover(
                "remover",
                vec![spec_taint("foo", None, TaintEffect::NoSchedule)],
            )],
            vec![make_node(
                "node-a",
                vec![
                    make_taint("foo", Some("bar"), "NoSchedule"),
                    make_taint("keep", None, "NoExecute"),
                ],
            )],
            &[],
        );

        apply_removal_on_node(&ctx, "node-a").await.unwrap();

        let patches = ctx.ops.patches.lock().unwrap();
        assert_eq!(patches.len(), 1);
        assert_eq!(
            patches[0].1,
            json!({"spec": {"taints": [{"key": "keep", "effect": "NoExecute"}]}})
        );
    }

    #[tokio::test]
    async fn test_apply_on_missing_node_is_noop() {
        let ctx = make_context(
            "missing-node",
            vec![make_remover(
                "remover",
                vec![spec_taint("foo", None, TaintEffect::NoSchedule)],
            )],
            Vec::new(),
            &[],
        );

        apply_removal_on_node(&ctx, "gone").await.unwrap();

        assert!(patched_names(&ctx).is_empty());
    }

    #[tokio::test]
    async fn test_apply_on_untainted_node_is_noop() {
        let ctx = make_context(
            "untainted-node",
            vec![make_remover(
                "remover",
                vec![spec_taint("foo", None, TaintEffect::NoSchedule)],
            )],
            vec![make_node("node-a", Vec::new())],
            &[],
        );

        apply_removal_on_node(&ctx, "node-a").await.unwrap();

        assert!(patched_names(&ctx).is_empty());
    }

    #[tokio::test]
    async fn test_apply_on_node_without_declared_taints_is_noop() {
        let ctx = make_context(
            "no-declared",
            Vec::new(),
            vec![make_node("node-a", vec![make_taint("foo", None, "NoSchedule")])],
            &[],
        );

        apply_removal_on_node(&ctx, "node-a").await.unwrap();

        assert!(patched_names(&ctx).is_empty());
    }

    #[tokio::test]
    async fn test_deleted_event_routes_to_noop() {
        let node = make_node("node-a", vec![make_taint("foo", None, "NoSchedule")]);
        let ctx = make_context(
            "deleted-event",
            vec![make_remover(
                "remover",
                vec![spec_taint("foo", None, TaintEffect::NoSchedule)],
            )],
            vec![node.clone()],
            &[],
        );

        let event = crate::NodeEvent::Deleted(Box::new(node.clone()));
        crate::events::handle_node_event(&ctx, &event).await.unwrap();
        let event = crate::NodeEvent::Generic(Box::new(node));
        crate::events::handle_node_event(&ctx, &event).await.unwrap();

        assert!(patched_names(&ctx).is_empty());
    }
}
