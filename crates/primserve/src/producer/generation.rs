use super::StateCell;
use crate::generator::{EventRequest, GeneratorHandle};
use primserve_core::{Error, Result, protocol::Event, protocol::ProtocolState};
use std::time::Instant;
use tokio::task::JoinHandle;

/// An event being generated on the blocking thread pool.
///
/// The task always runs to completion; [`GenerationTask::join`] is the only
/// way to collect its event, and it is used both for the first event after
/// (re)initialization and for the events prefetched while serving.
#[derive(Debug)]
pub struct GenerationTask {
    event_index: u32,
    handle: JoinHandle<Result<Event>>,
}

impl GenerationTask {
    /// Initializes the generator if needed, then generates the first event
    /// of a batch.
    ///
    /// Moves `state` from `Initializing` to `WaitingEvent` once the
    /// generator is ready and on to `ReadyToServe` once the event is
    /// complete. Transitions are skipped if the producer moved on in the
    /// meantime.
    pub fn initial(generator: GeneratorHandle, request: EventRequest, state: StateCell) -> Self {
        let event_index = request.event_index;
        let handle = tokio::task::spawn_blocking(move || {
            let started = Instant::now();
            if generator.ensure_initialized()? {
                tracing::info!(
                    "Generator {} initialization took {:?}",
                    generator.name(),
                    started.elapsed()
                );
            }
            state.transition(ProtocolState::Initializing, ProtocolState::WaitingEvent);
            let event = timed_generation(&generator, &request)?;
            state.transition(ProtocolState::WaitingEvent, ProtocolState::ReadyToServe);
            Ok(event)
        });
        Self {
            event_index,
            handle,
        }
    }

    /// Generates a further event with an already initialized generator.
    ///
    /// `state` moves from `ReadyToServe` to `WaitingEvent` before the task
    /// is spawned and back once the event is complete. A producer that went
    /// idle or stopped in the meantime keeps its state.
    pub fn next(generator: GeneratorHandle, request: EventRequest, state: StateCell) -> Self {
        let event_index = request.event_index;
        state.transition(ProtocolState::ReadyToServe, ProtocolState::WaitingEvent);
        let handle = tokio::task::spawn_blocking(move || {
            let event = timed_generation(&generator, &request)?;
            state.transition(ProtocolState::WaitingEvent, ProtocolState::ReadyToServe);
            Ok(event)
        });
        Self {
            event_index,
            handle,
        }
    }

    pub const fn event_index(&self) -> u32 {
        self.event_index
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the event.
    ///
    /// # Errors
    ///
    /// Returns the generator's error, or [`Error::Generation`] if the task
    /// panicked.
    pub async fn join(self) -> Result<Event> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(Error::Generation {
                reason: format!("generation of event {} failed: {e}", self.event_index),
            }),
        }
    }
}

fn timed_generation(generator: &GeneratorHandle, request: &EventRequest) -> Result<Event> {
    tracing::info!("Event generation started");
    let started = Instant::now();
    let event = generator.generate_event(request)?;
    tracing::info!(
        "Event generation took {:?} and produced {} primaries",
        started.elapsed(),
        event.len()
    );
    Ok(event)
}
