use super::{
    LocalReplier, LocalRequester, Publisher, PullSocket, PushSocket, Subscriber, push_pull,
    request_reply,
};
use crate::{Error, Result};
use core::fmt;

/// Well-known channel names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelName {
    /// Worker requests for chunks.
    Work,
    /// Worker probes for the producer state.
    Status,
    /// Worker requests for the run configuration. Served by the same
    /// producer endpoint as [`ChannelName::Work`].
    Config,
    /// Producer status notifications.
    Notifications,
    /// Reconfiguration commands for the producer.
    Control,
    /// Processed worker output.
    Output,
}

impl ChannelName {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Work => "work",
            Self::Status => "status",
            Self::Config => "config",
            Self::Notifications => "notifications",
            Self::Control => "control",
            Self::Output => "output",
        }
    }
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Buffer sizes of the channels in a [`ChannelSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Requests queued per request/reply channel before senders wait.
    pub request_capacity: usize,
    /// Messages retained per publish/subscribe channel for slow subscribers.
    pub broadcast_capacity: usize,
    /// Payloads buffered on the output channel.
    pub output_capacity: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            request_capacity: 64,
            broadcast_capacity: 64,
            output_capacity: 256,
        }
    }
}

/// The producer's side of a [`ChannelSet`].
///
/// `control` is subscribed when the set is created, so commands published
/// before the producer starts waiting on it are not lost.
#[derive(Debug)]
pub struct ServerEndpoints<W = LocalReplier, S = LocalReplier> {
    pub work: W,
    pub status: S,
    pub notifications: Publisher,
    pub control: Subscriber,
}

/// Connects workers and the driver to one producer.
#[derive(Debug)]
pub struct ChannelSet {
    work: LocalRequester,
    status: LocalRequester,
    notifications: Publisher,
    control: Publisher,
    output: PushSocket,
}

impl ChannelSet {
    /// Creates every channel, returning the client side, the producer's
    /// endpoints and the output sink.
    pub fn new(config: ChannelConfig) -> (Self, ServerEndpoints, PullSocket) {
        let (work, work_replier) = request_reply(config.request_capacity);
        let (status, status_replier) = request_reply(config.request_capacity);
        let notifications = Publisher::new(config.broadcast_capacity);
        let control = Publisher::new(config.broadcast_capacity);
        let (output, sink) = push_pull(config.output_capacity);

        let endpoints = ServerEndpoints {
            work: work_replier,
            status: status_replier,
            notifications: notifications.clone(),
            control: control.subscribe(),
        };
        let set = Self {
            work,
            status,
            notifications,
            control,
            output,
        };
        (set, endpoints, sink)
    }

    /// A fresh requester on a request/reply channel.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChannelError`] if `name` is not a request/reply
    /// channel.
    pub fn requester(&self, name: ChannelName) -> Result<LocalRequester> {
        match name {
            ChannelName::Work | ChannelName::Config => Ok(self.work.connect()),
            ChannelName::Status => Ok(self.status.connect()),
            other => Err(Error::channel(format!(
                "{other} is not a request/reply channel"
            ))),
        }
    }

    /// Subscribes to a publish/subscribe channel.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChannelError`] if `name` is not a publish/subscribe
    /// channel.
    pub fn subscribe(&self, name: ChannelName) -> Result<Subscriber> {
        self.publisher(name).map(|publisher| publisher.subscribe())
    }

    /// A publishing handle on a publish/subscribe channel.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChannelError`] if `name` is not a publish/subscribe
    /// channel.
    pub fn publisher(&self, name: ChannelName) -> Result<Publisher> {
        match name {
            ChannelName::Notifications => Ok(self.notifications.clone()),
            ChannelName::Control => Ok(self.control.clone()),
            other => Err(Error::channel(format!(
                "{other} is not a publish/subscribe channel"
            ))),
        }
    }

    /// A pusher on the output channel.
    pub fn output(&self) -> PushSocket {
        self.output.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{OutputChannel, ReplyChannel, RequestChannel};
    use bytes::Bytes;

    #[tokio::test]
    async fn config_and_work_share_the_producer_endpoint() {
        let (set, mut server, _sink) = ChannelSet::new(ChannelConfig::default());
        let mut config = set.requester(ChannelName::Config).unwrap();
        let mut work = set.requester(ChannelName::Work).unwrap();

        config
            .send(Bytes::from_static(b"configrequest"), None)
            .await
            .unwrap();
        work.send(Bytes::from_static(b"primrequest"), None)
            .await
            .unwrap();

        assert_eq!(&server.work.receive(None).await.unwrap()[..], b"configrequest");
        server.work.send(Bytes::from_static(b"c"), None).await.unwrap();
        assert_eq!(&server.work.receive(None).await.unwrap()[..], b"primrequest");
        server.work.send(Bytes::from_static(b"w"), None).await.unwrap();

        assert_eq!(&config.receive(None).await.unwrap()[..], b"c");
        assert_eq!(&work.receive(None).await.unwrap()[..], b"w");
    }

    #[tokio::test]
    async fn control_published_before_the_wait_is_delivered() {
        let (set, mut server, _sink) = ChannelSet::new(ChannelConfig::default());
        set.publisher(ChannelName::Control)
            .unwrap()
            .publish_str("--stop");
        assert_eq!(&server.control.receive(None).await.unwrap()[..], b"--stop");
    }

    #[tokio::test]
    async fn output_reaches_the_sink() {
        let (set, _server, mut sink) = ChannelSet::new(ChannelConfig::default());
        set.output()
            .send(Bytes::from_static(b"hits"), None)
            .await
            .unwrap();
        assert_eq!(
            sink.receive(None).await.unwrap().as_deref(),
            Some(&b"hits"[..])
        );
    }

    #[test]
    fn wrong_channel_shapes_are_rejected() {
        let (set, _server, _sink) = ChannelSet::new(ChannelConfig::default());
        assert!(set.requester(ChannelName::Output).is_err());
        assert!(set.subscribe(ChannelName::Work).is_err());
        assert!(set.publisher(ChannelName::Status).is_err());
        assert_eq!(ChannelName::Notifications.to_string(), "notifications");
    }
}
