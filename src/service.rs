//! Event dispatcher: one task per inbound event.

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::handler::RequestHandler;
use crate::transport::{InboundEvent, OutboundEvent};

/// Run `handler` for every event received on `inbound` and forward whatever
/// it produces to `outbound`.
///
/// Returns once `inbound` is closed and every spawned task has finished.
/// Events are handled concurrently, so responses may leave in a different
/// order than the requests arrived.
pub async fn dispatch(
    handler: RequestHandler,
    mut inbound: mpsc::Receiver<InboundEvent>,
    outbound: mpsc::Sender<OutboundEvent>,
) {
    let mut tasks = JoinSet::new();

    loop {
        tokio::select! {
            event = inbound.recv() => {
                let Some(event) = event else { break };
                let handler = handler.clone();
                let outbound = outbound.clone();
                tasks.spawn(async move {
                    let correlation_id = event.correlation_id.clone();
                    if let Some(reply) = handler.handle(event).await
                        && outbound.send(reply).await.is_err()
                    {
                        debug!(%correlation_id, "outbound channel closed, reply discarded");
                    }
                });
            }
            // Reap finished tasks so the set does not grow without bound.
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                if let Err(e) = joined {
                    warn!(error = %e, "search task failed");
                }
            }
        }
    }

    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            warn!(error = %e, "search task failed");
        }
    }
}
