use super::StateCell;
use bytes::Bytes;
use primserve_core::{channel::ReplyChannel, protocol::ProtocolState};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// How long the status responder waits for a probe before re-checking
/// whether the producer stopped.
pub const STATUS_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Spawns the task answering status probes with the current state code.
///
/// The task runs until the state becomes [`ProtocolState::Stopped`], the
/// token is cancelled or every prober is gone. It never touches the state.
pub fn spawn_status_responder<S>(
    channel: S,
    state: StateCell,
    shutdown: CancellationToken,
) -> JoinHandle<()>
where
    S: ReplyChannel + 'static,
{
    tokio::spawn(status_loop(channel, state, shutdown))
}

async fn status_loop<S: ReplyChannel>(mut channel: S, state: StateCell, shutdown: CancellationToken) {
    tracing::debug!("Status responder started");

    while state.get() != ProtocolState::Stopped {
        let probe = tokio::select! {
            () = shutdown.cancelled() => break,
            probe = channel.receive(Some(STATUS_POLL_INTERVAL)) => probe,
        };

        match probe {
            Ok(_) => {
                let current = state.get();
                tracing::trace!("Received status request, answering {current}");
                let reply = Bytes::copy_from_slice(&current.to_bytes());
                if let Err(e) = channel.send(reply, Some(STATUS_POLL_INTERVAL)).await {
                    tracing::debug!("Status reply not delivered: {e}");
                }
            }
            Err(e) if e.is_timeout() => {}
            Err(e) => {
                tracing::warn!("Status channel failed: {e}");
                break;
            }
        }
    }

    tracing::debug!("Status responder stopped");
}
