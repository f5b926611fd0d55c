use kube::Client;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::Result;

/// Connects to the cluster and runs the controllers until shutdown.
pub async fn start(ready: CancellationToken, cancel: CancellationToken) -> Result<()> {
    let client = Client::try_default().await?;
    info!("connected to cluster, starting controllers");
    ready.cancel();
    taint_remover_controller::start_taint_remover_controllers(client, cancel).await?;
    Ok(())
}
