//! # Channels
//!
//! Message transport between the producer, its workers and the process
//! driver. Every channel moves opaque [`Bytes`] payloads; the
//! [`codec`](crate::codec) module gives them meaning.
//!
//! Three shapes are provided, all backed by in-process tokio channels:
//!
//! - request/reply ([`reqrep`]): strict alternation of one request and one
//!   reply, used for the `work`, `config` and `status` channels.
//! - publish/subscribe ([`pubsub`]): fan-out of notifications and control
//!   commands. Publishing without subscribers is not an error.
//! - push/pull ([`push`]): the worker's processed-data sink.
//!
//! [`ChannelSet`] wires these up under their well-known names.
//!
//! Every operation takes an optional deadline. `None` waits indefinitely; an
//! expired deadline yields [`Error::ChannelTimeout`], which callers may retry.

pub mod pubsub;
pub mod push;
pub mod reqrep;
pub mod set;

pub use pubsub::{Publisher, Subscriber};
pub use push::{PullSocket, PushSocket, push_pull};
pub use reqrep::{LocalReplier, LocalRequester, request_reply};
pub use set::{ChannelConfig, ChannelName, ChannelSet, ServerEndpoints};

use crate::{Error, Result};
use bytes::Bytes;
use core::future::Future;
use std::time::Duration;

/// The requesting side of a request/reply channel.
///
/// A request must be followed by a [`receive`](RequestChannel::receive)
/// before the next [`send`](RequestChannel::send). A receive that times out
/// leaves the reply outstanding, so it can be awaited again later.
pub trait RequestChannel: Send {
    /// Sends a request.
    ///
    /// # Errors
    ///
    /// - [`Error::ChannelTimeout`] if the peer did not accept the request in
    ///   time.
    /// - [`Error::ChannelError`] if a reply is still outstanding or the peer
    ///   is gone.
    fn send(
        &mut self,
        payload: Bytes,
        timeout: Option<Duration>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Waits for the reply to the outstanding request.
    ///
    /// # Errors
    ///
    /// - [`Error::ChannelTimeout`] if no reply arrived in time. The request
    ///   stays outstanding.
    /// - [`Error::ChannelError`] if nothing was requested or the peer dropped
    ///   the request without answering.
    fn receive(&mut self, timeout: Option<Duration>) -> impl Future<Output = Result<Bytes>> + Send;

    /// Returns `true` while a request is waiting for its reply.
    fn awaiting_reply(&self) -> bool;
}

/// The replying side of a request/reply channel.
pub trait ReplyChannel: Send {
    /// Waits for the next request.
    ///
    /// # Errors
    ///
    /// - [`Error::ChannelTimeout`] if no request arrived in time.
    /// - [`Error::ChannelError`] if the previous request was not answered
    ///   yet, or every requester is gone.
    fn receive(&mut self, timeout: Option<Duration>) -> impl Future<Output = Result<Bytes>> + Send;

    /// Answers the request returned by the last
    /// [`receive`](ReplyChannel::receive).
    ///
    /// # Errors
    ///
    /// - [`Error::ChannelTimeout`] if the reply could not be delivered in
    ///   time.
    /// - [`Error::ChannelError`] if there is no request to answer or its
    ///   requester went away.
    fn send(
        &mut self,
        payload: Bytes,
        timeout: Option<Duration>,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// A one-way channel the sender never hears back from.
pub trait OutputChannel: Send {
    /// Hands `payload` to the channel.
    ///
    /// # Errors
    ///
    /// - [`Error::ChannelTimeout`] if the channel stayed full past the
    ///   deadline.
    /// - [`Error::ChannelError`] if the receiving side is gone.
    fn send(
        &mut self,
        payload: Bytes,
        timeout: Option<Duration>,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Runs `fut` under an optional deadline.
pub(crate) async fn with_deadline<F>(
    timeout: Option<Duration>,
    context: &str,
    fut: F,
) -> Result<F::Output>
where
    F: Future,
{
    match timeout {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| Error::timeout(format!("{context} after {limit:?}"))),
        None => Ok(fut.await),
    }
}
