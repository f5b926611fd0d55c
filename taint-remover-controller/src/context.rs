use tokio_util::sync::CancellationToken;

use crate::{ClusterOps, metrics::ControllerMetrics};

pub(crate) struct Context<C: ClusterOps> {
    pub ops: C,
    /// Cancels the in-flight pass on shutdown; surfaced as the pass error.
    pub cancel: CancellationToken,
    pub metrics: ControllerMetrics,
}
