use super::{ReplyChannel, RequestChannel, with_deadline};
use crate::{Error, Result};
use bytes::Bytes;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// A request plus the slot its reply goes into.
type Envelope = (Bytes, oneshot::Sender<Bytes>);

/// Creates a connected request/reply pair.
///
/// The requester can be cloned with [`LocalRequester::connect`] so that
/// several workers share one producer endpoint; each clone tracks its own
/// outstanding request.
pub fn request_reply(capacity: usize) -> (LocalRequester, LocalReplier) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        LocalRequester { tx, pending: None },
        LocalReplier { rx, pending: None },
    )
}

/// Requesting end of an in-process request/reply channel.
#[derive(Debug)]
pub struct LocalRequester {
    tx: mpsc::Sender<Envelope>,
    pending: Option<oneshot::Receiver<Bytes>>,
}

impl LocalRequester {
    /// A new requester on the same replier, with no outstanding request.
    pub fn connect(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            pending: None,
        }
    }
}

impl RequestChannel for LocalRequester {
    async fn send(&mut self, payload: Bytes, timeout: Option<Duration>) -> Result<()> {
        if self.pending.is_some() {
            return Err(Error::channel("a reply is still outstanding"));
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        with_deadline(timeout, "request send", self.tx.send((payload, reply_tx)))
            .await?
            .map_err(|_| Error::channel("replier is gone"))?;
        self.pending = Some(reply_rx);
        Ok(())
    }

    async fn receive(&mut self, timeout: Option<Duration>) -> Result<Bytes> {
        let Some(reply_rx) = self.pending.as_mut() else {
            return Err(Error::channel("no request is outstanding"));
        };

        // A timeout leaves `pending` in place for the next attempt.
        let outcome = with_deadline(timeout, "reply receive", reply_rx).await?;
        self.pending = None;
        outcome.map_err(|_| Error::channel("replier dropped the request"))
    }

    fn awaiting_reply(&self) -> bool {
        self.pending.is_some()
    }
}

/// Replying end of an in-process request/reply channel.
#[derive(Debug)]
pub struct LocalReplier {
    rx: mpsc::Receiver<Envelope>,
    pending: Option<oneshot::Sender<Bytes>>,
}

impl ReplyChannel for LocalReplier {
    async fn receive(&mut self, timeout: Option<Duration>) -> Result<Bytes> {
        if self.pending.is_some() {
            return Err(Error::channel("previous request has not been answered"));
        }

        let (payload, reply_tx) = with_deadline(timeout, "request receive", self.rx.recv())
            .await?
            .ok_or_else(|| Error::channel("every requester is gone"))?;
        self.pending = Some(reply_tx);
        Ok(payload)
    }

    async fn send(&mut self, payload: Bytes, _timeout: Option<Duration>) -> Result<()> {
        let reply_tx = self
            .pending
            .take()
            .ok_or_else(|| Error::channel("no request to answer"))?;
        reply_tx
            .send(payload)
            .map_err(|_| Error::channel("requester went away before the reply"))
    }
}
