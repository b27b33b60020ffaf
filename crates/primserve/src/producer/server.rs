use super::{ProducerStateMachine, spawn_status_responder};
use bytes::Bytes;
use primserve_core::{
    Result, codec,
    channel::{LocalReplier, Publisher, ReplyChannel, ServerEndpoints, Subscriber},
    config::ReconfigRequest,
    protocol::{ProtocolState, WorkReply, producer_status},
};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Deadline for delivering a work reply.
pub const REPLY_TIMEOUT: Duration = Duration::from_secs(5);

/// The producer's serving loop.
///
/// Wraps a [`ProducerStateMachine`] with the channels it is reached
/// through: requests arrive on `work`, probes on `status`, notifications go
/// out on `notifications` and, when running as a service, reconfiguration
/// commands come in on `control`.
#[derive(Debug)]
pub struct PrimaryServer<W = LocalReplier, S = LocalReplier> {
    machine: ProducerStateMachine,
    work: W,
    status: Option<S>,
    notifications: Publisher,
    control: Subscriber,
    shutdown: CancellationToken,
    status_task: Option<JoinHandle<()>>,
    reply_timeout: Duration,
}

impl<W, S> PrimaryServer<W, S>
where
    W: ReplyChannel,
    S: ReplyChannel + 'static,
{
    pub fn new(
        machine: ProducerStateMachine,
        endpoints: ServerEndpoints<W, S>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            machine,
            work: endpoints.work,
            status: Some(endpoints.status),
            notifications: endpoints.notifications,
            control: endpoints.control,
            shutdown,
            status_task: None,
            reply_timeout: REPLY_TIMEOUT,
        }
    }

    /// Overrides [`REPLY_TIMEOUT`].
    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }

    pub fn machine(&self) -> &ProducerStateMachine {
        &self.machine
    }

    fn notify(&self, message: &str) {
        self.notifications.publish_str(&producer_status(message));
    }

    /// Announces the producer, starts the status responder and launches the
    /// generator initialization.
    ///
    /// # Errors
    ///
    /// Propagates [`ProducerStateMachine::start`] errors.
    pub async fn init(&mut self) -> Result<()> {
        self.notify("INITIALIZING");
        tracing::info!("Init server");

        if let Some(status) = self.status.take() {
            tracing::info!("Launching status responder");
            self.status_task = Some(spawn_status_responder(
                status,
                self.machine.state_cell(),
                self.shutdown.clone(),
            ));
        }
        self.machine.start().await
    }

    /// Serves one work-channel request.
    ///
    /// Returns whether the loop should keep going. When the batch is
    /// exhausted the producer goes idle and, as a service, waits for a
    /// reconfiguration. The state is `Stopped` whenever this returns `false`.
    ///
    /// # Errors
    ///
    /// - A generation failure, after answering the request with a
    ///   [`WorkReply::Error`].
    /// - A failure of the work channel itself.
    pub async fn conditional_run(&mut self) -> Result<bool> {
        let request = tokio::select! {
            () = self.shutdown.cancelled() => {
                tracing::info!("Shutdown requested, leaving the serving loop");
                self.machine.set_state(ProtocolState::Stopped);
                return Ok(false);
            }
            request = self.work.receive(None) => request,
        };
        let request = request.inspect_err(|e| {
            tracing::error!("Some error occurred on the work channel: {e}");
        })?;

        let more = match self.machine.handle_request(&request).await {
            Ok(response) => {
                self.reply(response.reply).await;
                response.more
            }
            Err(err) => {
                tracing::error!("Could not serve request: {err}");
                self.reply(codec::encode(&WorkReply::from(&err))?).await;
                return Err(err);
            }
        };

        let more = if more {
            true
        } else {
            tracing::info!("Going idle");
            self.machine.set_state(ProtocolState::Idle);
            if self.machine.config().as_service {
                self.wait_for_control_input().await
            } else {
                false
            }
        };

        if !more {
            self.machine.set_state(ProtocolState::Stopped);
        }
        Ok(more)
    }

    async fn reply(&mut self, payload: Bytes) {
        if let Err(e) = self.work.send(payload, Some(self.reply_timeout)).await {
            tracing::warn!("Reply not delivered: {e}");
        }
    }

    /// Blocks until a control command arrives and applies it.
    ///
    /// Returns `false` for a stop command, on shutdown or once no controller
    /// can reach the producer anymore. Commands that fail to parse or apply
    /// are logged and the wait continues.
    pub async fn wait_for_control_input(&mut self) -> bool {
        self.notify("AWAITING INPUT");
        tracing::info!("Waiting for control input");

        loop {
            let message = tokio::select! {
                () = self.shutdown.cancelled() => return false,
                message = self.control.receive(None) => message,
            };
            let message = match message {
                Ok(message) => message,
                Err(e) => {
                    tracing::warn!("Control channel failed: {e}");
                    return false;
                }
            };

            let command = String::from_utf8_lossy(&message);
            tracing::info!("Received control command {command:?}");
            let request = match ReconfigRequest::from_command(&command) {
                Ok(request) => request,
                Err(e) => {
                    tracing::warn!("Ignoring control command: {e}");
                    continue;
                }
            };

            match self.machine.reconfigure(request).await {
                Ok(true) => {
                    self.notify("RECONFIGURED");
                    return true;
                }
                Ok(false) => return false,
                Err(e) => tracing::warn!("Reconfiguration rejected: {e}"),
            }
        }
    }

    /// Runs the producer to completion: [`init`](Self::init), then
    /// [`conditional_run`](Self::conditional_run) until it returns `false`,
    /// then teardown.
    ///
    /// Teardown happens on errors too: the state becomes `Stopped`, a
    /// `STOPPED` notification goes out, and any in-flight generation and the
    /// status responder are joined.
    ///
    /// # Errors
    ///
    /// Returns the first error of [`init`](Self::init) or
    /// [`conditional_run`](Self::conditional_run).
    pub async fn run(&mut self) -> Result<()> {
        let outcome = self.serve().await;
        self.teardown().await;
        outcome
    }

    async fn serve(&mut self) -> Result<()> {
        self.init().await?;
        while self.conditional_run().await? {}
        Ok(())
    }

    async fn teardown(&mut self) {
        self.machine.set_state(ProtocolState::Stopped);
        self.notify("STOPPED");
        self.machine.join_generation().await;
        if let Some(task) = self.status_task.take() {
            if let Err(e) = task.await {
                tracing::error!("Status responder failed: {e}");
            }
        }
        tracing::info!("Producer stopped");
    }
}
