//! # Worker
//!
//! The consuming side of the protocol. A [`Worker`] repeatedly asks the
//! producer for a chunk, runs its [`TransportEngine`] on it and pushes the
//! result downstream, until the producer signals end of work.
//!
//! Every step has a deadline. Only waiting for a chunk is retried; any other
//! failure ends the worker's loop.

mod engine;

#[cfg(test)]
mod tests;

pub use engine::{HitSummary, SummaryEngine, TransportEngine, engine_for};

use bytes::Bytes;
use primserve_core::{
    Error, Result,
    channel::{OutputChannel, RequestChannel},
    codec,
    config::RunConfig,
    protocol::{CONFIG_REQUEST, PRIM_REQUEST, ProtocolState, WorkReply},
};
use rand::{SeedableRng, rngs::StdRng};
use std::time::Duration;

/// Deadline of one status probe.
pub const STATUS_TIMEOUT: Duration = Duration::from_secs(2);

/// Deadline for sending a work request and for each attempt at receiving
/// its reply.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(100);

/// Attempts at receiving a chunk before a round is given up.
pub const RECEIVE_ATTEMPTS: u32 = 3;

/// Deadlines and retry policy of a [`Worker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerConfig {
    pub status_timeout: Duration,
    pub request_timeout: Duration,
    pub receive_attempts: u32,
    pub output_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            status_timeout: STATUS_TIMEOUT,
            request_timeout: REQUEST_TIMEOUT,
            receive_attempts: RECEIVE_ATTEMPTS,
            output_timeout: REQUEST_TIMEOUT,
        }
    }
}

/// What a worker did over its lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub chunks: u64,
    pub primaries: u64,
    /// Events whose first part this worker processed.
    pub events_started: u64,
    /// Rounds that ended without a reply after every receive attempt.
    pub empty_rounds: u64,
}

/// Pulls chunks from a producer and pushes processed output.
///
/// `R` is the request/reply channel type used for both the work and the
/// optional status channel.
#[derive(Debug)]
pub struct Worker<R, O, E> {
    id: usize,
    work: R,
    status: Option<R>,
    output: O,
    engine: E,
    config: WorkerConfig,
    stats: WorkerStats,
}

impl<R, O, E> Worker<R, O, E>
where
    R: RequestChannel,
    O: OutputChannel,
    E: TransportEngine,
{
    pub fn new(id: usize, work: R, output: O, engine: E) -> Self {
        Self {
            id,
            work,
            status: None,
            output,
            engine,
            config: WorkerConfig::default(),
            stats: WorkerStats::default(),
        }
    }

    /// Checks the producer state before every request.
    pub fn with_status(mut self, status: R) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_config(mut self, config: WorkerConfig) -> Self {
        self.config = config;
        self
    }

    pub const fn id(&self) -> usize {
        self.id
    }

    pub const fn stats(&self) -> WorkerStats {
        self.stats
    }

    /// Asks the producer for its state.
    ///
    /// A probe whose reply timed out is not repeated; the next call keeps
    /// waiting for that reply instead.
    ///
    /// # Errors
    ///
    /// - [`Error::ChannelError`] without a status channel or if it failed.
    /// - [`Error::ChannelTimeout`] if the producer did not answer in time.
    /// - [`Error::Decode`] for a malformed or unknown state code.
    pub async fn query_status(&mut self, timeout: Duration) -> Result<ProtocolState> {
        let status = self.status.as_mut().ok_or_else(|| Error::ChannelError {
            context: "no status channel configured".to_string(),
        })?;
        if !status.awaiting_reply() {
            status.send(Bytes::new(), Some(timeout)).await?;
        }
        let reply = status.receive(Some(timeout)).await?;
        ProtocolState::from_bytes(&reply)
    }

    /// Returns `true` if the producer reports a state with work ahead
    /// (`Initializing`, `WaitingEvent` or `ReadyToServe`). `Idle`, `Stopped`,
    /// unknown codes and any failure to reach the producer give `false`.
    pub async fn poll_status(&mut self, timeout: Duration) -> bool {
        match self.query_status(timeout).await {
            Ok(state) => {
                tracing::debug!(worker = self.id, %state, "Producer status");
                state.has_work()
            }
            Err(e) => {
                tracing::warn!(worker = self.id, "Status probe failed: {e}");
                false
            }
        }
    }

    /// Runs one request/process/forward round.
    ///
    /// Returns `false` when the worker should stop: the producer has no more
    /// work, is unreachable, or the output could not be forwarded. A round
    /// in which no chunk arrived after every receive attempt returns `true`
    /// and leaves the request outstanding for the next round.
    ///
    /// # Errors
    ///
    /// - An error reply from the producer, or a reply that does not decode.
    ///   Neither is retried.
    /// - [`Error::Transport`] if the engine fails.
    #[tracing::instrument(level = "debug", skip(self), fields(worker = self.id))]
    pub async fn run_once(&mut self) -> Result<bool> {
        if self.status.is_some() && !self.poll_status(self.config.status_timeout).await {
            tracing::info!(worker = self.id, "Producer has no work, stopping");
            return Ok(false);
        }

        if self.work.awaiting_reply() {
            tracing::debug!(worker = self.id, "Resuming wait for an outstanding reply");
        } else if let Err(e) = self
            .work
            .send(Bytes::from_static(PRIM_REQUEST), Some(self.config.request_timeout))
            .await
        {
            tracing::warn!(worker = self.id, "Could not request work: {e}");
            return Ok(false);
        }

        let payload = match self.receive_with_retries().await {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                self.stats.empty_rounds += 1;
                return Ok(true);
            }
            Err(e) => {
                tracing::warn!(worker = self.id, "Work channel failed: {e}");
                return Ok(false);
            }
        };

        let chunk = codec::decode::<WorkReply>(&payload)?.into_chunk()?;
        if chunk.is_end_of_work() {
            tracing::info!(worker = self.id, "No more work");
            return Ok(false);
        }

        let info = &chunk.info;
        tracing::debug!(
            worker = self.id,
            "Processing {} primaries of event {} part {} out of {}",
            chunk.primaries.len(),
            info.event_id,
            info.part,
            info.n_parts
        );
        let mut rng = StdRng::seed_from_u64(info.seed);
        let output = self.engine.process(info, &chunk.primaries, &mut rng)?;

        self.stats.chunks += 1;
        self.stats.primaries += chunk.primaries.len() as u64;
        if info.part == 1 {
            self.stats.events_started += 1;
        }

        if let Err(e) = self
            .output
            .send(output, Some(self.config.output_timeout))
            .await
        {
            tracing::warn!(worker = self.id, "Could not forward output: {e}");
            return Ok(false);
        }
        Ok(true)
    }

    /// `Ok(None)` once every attempt timed out; channel failures other than
    /// timeouts are returned as errors.
    async fn receive_with_retries(&mut self) -> Result<Option<Bytes>> {
        let attempts = self.config.receive_attempts.max(1);
        for attempt in 1..=attempts {
            match self.work.receive(Some(self.config.request_timeout)).await {
                Ok(payload) => return Ok(Some(payload)),
                Err(e) if e.is_timeout() => {
                    tracing::debug!(worker = self.id, attempt, "No reply yet: {e}");
                }
                Err(e) => return Err(e),
            }
        }
        tracing::warn!(
            worker = self.id,
            "No reply after {attempts} attempts, giving up this round"
        );
        Ok(None)
    }

    /// Asks the producer for its run configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::ChannelError`] if a work request is still outstanding or
    ///   the channel failed.
    /// - See [`fetch_config`] for the rest.
    pub async fn fetch_config(&mut self) -> Result<RunConfig> {
        if self.work.awaiting_reply() {
            return Err(Error::ChannelError {
                context: "a work request is still outstanding".to_string(),
            });
        }
        fetch_config(&mut self.work, self.config.request_timeout).await
    }

    /// Calls [`run_once`](Self::run_once) until it returns `false`.
    ///
    /// # Errors
    ///
    /// Propagates the first [`run_once`](Self::run_once) error.
    pub async fn run(&mut self) -> Result<WorkerStats> {
        tracing::info!(worker = self.id, engine = self.engine.name(), "Worker started");
        while self.run_once().await? {}
        tracing::info!(
            worker = self.id,
            chunks = self.stats.chunks,
            primaries = self.stats.primaries,
            "Worker finished"
        );
        Ok(self.stats)
    }
}

/// Sends a config request on `work` and decodes the reply.
///
/// Lets a process learn which engine to run before it builds its
/// [`Worker`].
///
/// # Errors
///
/// - [`Error::ChannelError`] or [`Error::ChannelTimeout`] from the channel.
/// - [`Error::Decode`] or a mirrored error reply from the producer.
pub async fn fetch_config<R: RequestChannel>(
    work: &mut R,
    timeout: Duration,
) -> Result<RunConfig> {
    work.send(Bytes::from_static(CONFIG_REQUEST), Some(timeout)).await?;
    let payload = work.receive(Some(timeout)).await?;
    codec::decode::<WorkReply>(&payload)?.into_config()
}
