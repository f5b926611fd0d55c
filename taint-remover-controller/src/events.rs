use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;
use k8s_openapi::api::core::v1::Node;
use kube::{
    Api, ResourceExt,
    runtime::{WatchStreamExt, watcher},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::{ClusterOps, Result, context::Context, controller::apply_removal_on_node};

/// A node lifecycle change as seen by the watch stream.
#[derive(Debug)]
pub enum NodeEvent {
    Created(Box<Node>),
    Updated { old: Box<Node>, new: Box<Node> },
    Deleted(Box<Node>),
    Generic(Box<Node>),
}

impl NodeEvent {
    /// Classifies a raw watcher event against the nodes seen so far. Init
    /// markers carry no node and classify to nothing.
    fn classify(event: watcher::Event<Node>, known: &mut HashMap<String, Node>) -> Option<Self> {
        match event {
            watcher::Event::InitApply(node) | watcher::Event::Apply(node) => {
                match known.insert(node.name_any(), node.clone()) {
                    Some(old) => Some(Self::Updated {
                        old: Box::new(old),
                        new: Box::new(node),
                    }),
                    None => Some(Self::Created(Box::new(node))),
                }
            }
            watcher::Event::Delete(node) => {
                known.remove(&node.name_any());
                Some(Self::Deleted(Box::new(node)))
            }
            watcher::Event::Init | watcher::Event::InitDone => None,
        }
    }

    /// The node worth cleaning for this event. A deleted node has nothing
    /// left to clean and generic events carry no state change.
    pub fn target(&self) -> Option<&Node> {
        match self {
            Self::Created(node) => Some(node),
            Self::Updated { new, .. } => Some(new),
            Self::Deleted(_) | Self::Generic(_) => None,
        }
    }
}

pub(crate) async fn handle_node_event<C: ClusterOps>(
    ctx: &Context<C>,
    event: &NodeEvent,
) -> Result<()> {
    match event.target() {
        Some(node) => apply_removal_on_node(ctx, &node.name_any()).await,
        None => Ok(()),
    }
}

/// Watches nodes and routes every new or updated node through the
/// incremental removal path. Routing failures are logged and left to the
/// next full pass.
pub(crate) async fn watch_nodes<C: ClusterOps>(
    api: Api<Node>,
    ctx: Arc<Context<C>>,
    cancel: CancellationToken,
) {
    let mut known = HashMap::new();
    let mut stream = watcher(api, watcher::Config::default())
        .default_backoff()
        .boxed();
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            event = stream.next() => event,
        };
        let Some(event) = event else { break };
        let event = match event {
            Ok(event) => event,
            Err(e) => {
                error!(%e, "unexpected error with node watch stream");
                continue;
            }
        };
        let Some(event) = NodeEvent::classify(event, &mut known) else {
            continue;
        };
        if let Err(e) = handle_node_event(&ctx, &event).await {
            error!(%e, "failed to apply taint removal on node change");
        }
    }
    debug!("node watch stopped");
}
