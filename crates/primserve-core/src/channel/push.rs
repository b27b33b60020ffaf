use super::{OutputChannel, with_deadline};
use crate::{Error, Result};
use bytes::Bytes;
use std::time::Duration;
use tokio::sync::mpsc;

/// Creates a connected push/pull pair with bounded buffering.
pub fn push_pull(capacity: usize) -> (PushSocket, PullSocket) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (PushSocket { tx }, PullSocket { rx })
}

/// Sending end of a pipeline channel. Clones feed the same sink.
#[derive(Debug, Clone)]
pub struct PushSocket {
    tx: mpsc::Sender<Bytes>,
}

impl OutputChannel for PushSocket {
    async fn send(&mut self, payload: Bytes, timeout: Option<Duration>) -> Result<()> {
        with_deadline(timeout, "push", self.tx.send(payload))
            .await?
            .map_err(|_| Error::channel("sink is gone"))
    }
}

/// Receiving end of a pipeline channel.
#[derive(Debug)]
pub struct PullSocket {
    rx: mpsc::Receiver<Bytes>,
}

impl PullSocket {
    /// Waits for the next pushed payload.
    ///
    /// Returns `Ok(None)` once every pusher is gone and the buffer is
    /// drained.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChannelTimeout`] if nothing arrived in time.
    pub async fn receive(&mut self, timeout: Option<Duration>) -> Result<Option<Bytes>> {
        with_deadline(timeout, "pull", self.rx.recv()).await
    }
}
