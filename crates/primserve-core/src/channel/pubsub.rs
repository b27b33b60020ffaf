use super::{OutputChannel, with_deadline};
use crate::{Error, Result};
use bytes::Bytes;
use std::time::Duration;
use tokio::sync::broadcast;

/// Publishing end of a fan-out channel.
///
/// Messages published while nobody is subscribed are dropped.
#[derive(Debug, Clone)]
pub struct Publisher {
    tx: broadcast::Sender<Bytes>,
}

impl Publisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publishes `payload` to every current subscriber.
    pub fn publish(&self, payload: Bytes) {
        match self.tx.send(payload) {
            Ok(receivers) => tracing::trace!(receivers, "published message"),
            Err(_) => tracing::trace!("published message without subscribers"),
        }
    }

    /// Publishes a UTF-8 message.
    pub fn publish_str(&self, message: &str) {
        self.publish(Bytes::copy_from_slice(message.as_bytes()));
    }

    /// A subscriber that sees every message published from now on.
    pub fn subscribe(&self) -> Subscriber {
        Subscriber {
            rx: self.tx.subscribe(),
        }
    }
}

impl OutputChannel for Publisher {
    async fn send(&mut self, payload: Bytes, _timeout: Option<Duration>) -> Result<()> {
        self.publish(payload);
        Ok(())
    }
}

/// Receiving end of a fan-out channel.
#[derive(Debug)]
pub struct Subscriber {
    rx: broadcast::Receiver<Bytes>,
}

impl Subscriber {
    /// Waits for the next published message.
    ///
    /// A subscriber that fell behind skips the messages it missed and logs
    /// how many were lost.
    ///
    /// # Errors
    ///
    /// - [`Error::ChannelTimeout`] if nothing was published in time.
    /// - [`Error::ChannelError`] once every publisher is gone.
    pub async fn receive(&mut self, timeout: Option<Duration>) -> Result<Bytes> {
        with_deadline(timeout, "subscription receive", async {
            loop {
                match self.rx.recv().await {
                    Ok(payload) => return Ok(payload),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "subscriber lagged, messages dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(Error::channel("every publisher is gone"));
                    }
                }
            }
        })
        .await?
    }
}
