use super::{
    DriverPipe, GenerationTask, StateCell,
    chunking::{num_parts, part_range},
};
use crate::generator::{EventRequest, GeneratorHandle, GeneratorRegistry, Trigger};
use bytes::Bytes;
use primserve_core::{
    Error, Result, codec,
    config::{ReconfigRequest, RunConfig},
    protocol::{Chunk, Event, ProtocolState, Request, SubEventInfo, WorkReply},
};

/// Encoded reply to one work-channel request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub reply: Bytes,
    /// `false` once the producer has no more work for this batch.
    pub more: bool,
}

impl Response {
    fn encode(reply: &WorkReply, more: bool) -> Result<Self> {
        Ok(Self {
            reply: codec::encode(reply)?,
            more,
        })
    }
}

/// The producer's request-handling core.
///
/// Owns the current event and the counters that decide which part of it
/// goes out next. Requests are handled one at a time; the next event is
/// generated in the background while the current one is being served, and
/// only joined when a request actually needs it.
#[derive(Debug)]
pub struct ProducerStateMachine {
    config: RunConfig,
    trigger: Trigger,
    registry: GeneratorRegistry,
    generator: Option<GeneratorHandle>,
    generation: Option<GenerationTask>,
    event: Event,
    state: StateCell,
    initial_seed: u64,
    event_counter: u32,
    part_counter: u32,
    need_new_event: bool,
    driver_pipe: Option<DriverPipe>,
}

impl ProducerStateMachine {
    /// Validates `config`, layers its parameter sources and fixes the
    /// initial seed. Nothing is generated until [`start`](Self::start).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for invalid settings, parameter
    /// sources or triggers.
    pub fn new(mut config: RunConfig, registry: GeneratorRegistry) -> Result<Self> {
        config.validate()?;
        config.apply_param_sources()?;
        let trigger = config.trigger.parse()?;
        let initial_seed = resolve_seed(config.seed);
        config.seed = Some(initial_seed);

        tracing::info!("Chunk size set to {}", config.chunk_size);
        tracing::info!("Engine set to {}", config.mc_engine);

        Ok(Self {
            config,
            trigger,
            registry,
            generator: None,
            generation: None,
            event: Event::default(),
            state: StateCell::new(ProtocolState::Initializing),
            initial_seed,
            event_counter: 0,
            part_counter: 0,
            need_new_event: true,
            driver_pipe: None,
        })
    }

    /// Announces every event start on `pipe`.
    pub fn with_driver_pipe(mut self, pipe: DriverPipe) -> Self {
        self.driver_pipe = Some(pipe);
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn registry(&self) -> &GeneratorRegistry {
        &self.registry
    }

    /// The generator serving the current batch, once started.
    pub fn generator(&self) -> Option<&GeneratorHandle> {
        self.generator.as_ref()
    }

    pub fn state(&self) -> ProtocolState {
        self.state.get()
    }

    /// A handle on the state shared with the status responder.
    pub fn state_cell(&self) -> StateCell {
        self.state.clone()
    }

    pub fn set_state(&self, state: ProtocolState) {
        self.state.set(state);
    }

    pub const fn initial_seed(&self) -> u64 {
        self.initial_seed
    }

    pub const fn event_counter(&self) -> u32 {
        self.event_counter
    }

    pub const fn part_counter(&self) -> u32 {
        self.part_counter
    }

    pub const fn need_new_event(&self) -> bool {
        self.need_new_event
    }

    pub const fn max_events(&self) -> u32 {
        self.config.n_events
    }

    /// `true` while an event is being generated in the background.
    pub fn is_generating(&self) -> bool {
        self.generation.as_ref().is_some_and(|task| !task.is_finished())
    }

    pub const fn work_available(&self) -> bool {
        !(self.event_counter >= self.config.n_events && self.need_new_event)
    }

    /// Resolves the configured generator and starts initializing it, along
    /// with the first event, in the background.
    ///
    /// Any generation still in flight is joined first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownGenerator`] or the builder's error if the
    /// generator cannot be resolved.
    pub async fn start(&mut self) -> Result<()> {
        self.join_generation().await;
        self.init_generator()
    }

    fn init_generator(&mut self) -> Result<()> {
        let generator = self.registry.resolve(&self.config)?;
        self.launch_initialization(generator);
        Ok(())
    }

    fn launch_initialization(&mut self, generator: GeneratorHandle) {
        self.state.set(ProtocolState::Initializing);
        let request = self.event_request(self.event_counter.saturating_add(1));
        tracing::info!(
            "Initializing generator {} for {} events, initial seed {}",
            generator.name(),
            self.config.n_events,
            self.initial_seed
        );
        self.generation = Some(GenerationTask::initial(
            generator.clone(),
            request,
            self.state.clone(),
        ));
        self.generator = Some(generator);
    }

    fn event_request(&self, event_index: u32) -> EventRequest {
        EventRequest {
            event_index,
            seed: self.initial_seed.wrapping_add(u64::from(event_index)),
            trigger: self.trigger,
        }
    }

    /// Seed handed to workers with every chunk of the current event.
    fn chunk_seed(&self) -> u64 {
        u64::from(self.event_counter).wrapping_add(self.initial_seed)
    }

    /// Answers one work-channel request.
    ///
    /// - `configrequest`: the run configuration; `more` is `true`.
    /// - `primrequest`: the next chunk; `more` is `false` once the batch is
    ///   exhausted and the end-of-work sentinel went out.
    /// - anything else: a [`WorkReply::Error`] reply; `more` is `true`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Generation`] if the event a chunk needed could not be
    /// generated, or [`Error::Decode`] if the reply cannot be encoded.
    #[tracing::instrument(level = "debug", skip_all, fields(len = payload.len()))]
    pub async fn handle_request(&mut self, payload: &[u8]) -> Result<Response> {
        match Request::parse(payload) {
            Request::Config => {
                tracing::info!("Received config request");
                Response::encode(&WorkReply::Config(self.config.clone()), true)
            }
            Request::Primaries => {
                let (chunk, more) = self.next_chunk().await?;
                Response::encode(&WorkReply::Chunk(chunk), more)
            }
            Request::Unknown(request) => {
                tracing::warn!("Unknown request {request:?}");
                let err = Error::UnknownRequest { request };
                Response::encode(&WorkReply::from(&err), true)
            }
        }
    }

    /// Cuts the next chunk, joining the background generation when the
    /// previous event is used up.
    ///
    /// Returns the chunk and whether work was available. Without work the
    /// chunk is the end-of-work sentinel and no counter changes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Generation`] if the needed event could not be
    /// generated. Counters are left as they were.
    pub async fn next_chunk(&mut self) -> Result<(Chunk, bool)> {
        let work_available = self.work_available();
        tracing::info!(
            event_counter = self.event_counter,
            max_events = self.config.n_events,
            need_new_event = self.need_new_event,
            work_available,
            "Received request for work"
        );
        if !work_available {
            return Ok((
                Chunk::end_of_work(self.config.n_events, self.chunk_seed()),
                false,
            ));
        }

        if self.need_new_event {
            let task = self.generation.take().ok_or_else(|| Error::Generation {
                reason: "no event is being generated".to_string(),
            })?;
            self.event = task.join().await?;
            self.need_new_event = false;
            self.part_counter = 0;
            self.event_counter += 1;
        }

        let total = self.event.len();
        let granularity = self.config.chunk_size as usize;
        let n_parts = num_parts(total, granularity);
        let range = part_range(total, granularity, self.part_counter as usize);
        let part = self.part_counter + 1;

        let info = SubEventInfo {
            event_id: i32::try_from(self.event_counter).map_err(|_| Error::InvalidConfig {
                reason: format!("event counter {} exceeds i32", self.event_counter),
            })?,
            max_events: self.config.n_events,
            part,
            n_parts: u32::try_from(n_parts).unwrap_or(u32::MAX),
            seed: self.chunk_seed(),
            start_index: total as u64,
            header: self.event.header.clone(),
        };
        tracing::info!(
            "Sending {} particles for event {} part {part} out of {n_parts}",
            range.len(),
            self.event_counter
        );
        let chunk = Chunk {
            primaries: self.event.primaries[range].to_vec(),
            info,
        };

        if part == 1 {
            self.signal_event_start(chunk.info.event_id);
        }

        self.part_counter += 1;
        if self.part_counter as usize == n_parts {
            self.need_new_event = true;
            if self.event_counter < self.config.n_events {
                self.launch_next_generation();
            }
        }
        Ok((chunk, true))
    }

    fn launch_next_generation(&mut self) {
        let Some(generator) = self.generator.clone() else {
            return;
        };
        let request = self.event_request(self.event_counter + 1);
        self.generation = Some(GenerationTask::next(
            generator,
            request,
            self.state.clone(),
        ));
    }

    fn signal_event_start(&mut self, event_id: i32) {
        if let Some(pipe) = self.driver_pipe.as_mut() {
            if let Err(e) = pipe.signal_event_start(event_id) {
                tracing::warn!("Could not signal event start: {e}");
            }
        }
    }

    /// Applies a control-channel command.
    ///
    /// Returns `false` for a stop request. Otherwise the new settings are
    /// validated and the generator is resolved; only then is the in-flight
    /// generation, if any, joined, the settings committed, the counters
    /// reset and a new generator initialization launched.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidConfig`] for rejected settings.
    /// - [`Error::UnknownGenerator`] or the builder's error.
    ///
    /// Either way the previous settings, counters, state and in-flight
    /// generation are kept.
    pub async fn reconfigure(&mut self, request: ReconfigRequest) -> Result<bool> {
        tracing::info!("Reinitializing producer");
        if request.stop {
            return Ok(false);
        }

        let mut config = self.config.clone();
        config.config_file = request.config_file;
        config.key_values = request.key_values;
        config.generator = request.generator;
        config.trigger = request.trigger;
        config.ext_kin_file = request.ext_kin_file;
        config.n_events = request.n_events;
        config.validate()?;
        config.apply_param_sources()?;
        let trigger = config.trigger.parse()?;
        let generator = self.registry.resolve(&config)?;
        let initial_seed = resolve_seed(request.start_seed);
        config.seed = Some(initial_seed);

        self.join_generation().await;
        self.config = config;
        self.trigger = trigger;
        self.initial_seed = initial_seed;
        self.event_counter = 0;
        self.part_counter = 0;
        self.need_new_event = true;
        self.launch_initialization(generator);
        Ok(true)
    }

    /// Waits for the in-flight generation, if any, and discards its event.
    pub async fn join_generation(&mut self) {
        if let Some(task) = self.generation.take() {
            let index = task.event_index();
            if let Err(e) = task.join().await {
                tracing::warn!("Discarded generation of event {index}: {e}");
            }
        }
    }
}

/// Uses `seed` if given, otherwise draws one.
fn resolve_seed(seed: Option<u64>) -> u64 {
    seed.unwrap_or_else(|| {
        let seed = rand::random();
        tracing::info!("Drew random initial seed {seed}");
        seed
    })
}
