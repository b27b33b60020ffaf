//! # Event generators
//!
//! A [`WorkGenerator`] produces the primaries of one event per call. The
//! producer never calls a generator directly; it goes through a
//! [`GeneratorHandle`], which shares one instance between the serving path
//! and the background generation task and applies the configured
//! [`Trigger`].
//!
//! Built-in generators:
//!
//! - [`BoxGun`] (`boxgen`): uniform particles in momentum, pseudorapidity and
//!   azimuth, configured through `BoxGun.*` parameters.
//! - [`ExtKinematics`] (`extkin`): events replayed from a JSON-lines file.
//!
//! The [`GeneratorRegistry`] maps generator names to builders and keeps
//! cacheable instances alive across reconfigurations.

mod boxgen;
mod extkin;
mod registry;
mod trigger;


pub use boxgen::{BoxGun, BoxGunParams};
pub use extkin::ExtKinematics;
pub use registry::{BuildFn, GeneratorKind, GeneratorRegistry};
pub use trigger::{MAX_TRIALS, Trigger};

use core::fmt;
use parking_lot::Mutex;
use primserve_core::{
    Error, Result,
    protocol::{Event, EventHeader, Primary},
};
use rand::{SeedableRng, rngs::StdRng};
use std::sync::Arc;

/// A source of events.
///
/// Implementations must be deterministic for a given RNG state: the producer
/// seeds every event explicitly, so replaying a batch with the same initial
/// seed yields the same primaries.
pub trait WorkGenerator: Send {
    /// One-time setup, run lazily before the first event. May be slow.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Generation`] if the generator cannot be set up.
    fn init(&mut self) -> Result<()> {
        Ok(())
    }

    /// Produces the primaries of one event.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Generation`] if no event can be produced.
    fn generate(&mut self, rng: &mut StdRng) -> Result<Vec<Primary>>;
}

/// Inputs for generating a single event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRequest {
    /// 1-based index of the event in its batch.
    pub event_index: u32,
    pub seed: u64,
    pub trigger: Trigger,
}

struct Slot {
    generator: Box<dyn WorkGenerator>,
    initialized: bool,
}

/// A shared, lockable generator instance.
///
/// Clones refer to the same instance; [`GeneratorHandle::ptr_eq`] tells
/// whether two handles do.
#[derive(Clone)]
pub struct GeneratorHandle {
    name: Arc<str>,
    slot: Arc<Mutex<Slot>>,
}

impl fmt::Debug for GeneratorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratorHandle")
            .field("name", &self.name)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

impl GeneratorHandle {
    pub fn new(name: impl Into<Arc<str>>, generator: Box<dyn WorkGenerator>) -> Self {
        Self {
            name: name.into(),
            slot: Arc::new(Mutex::new(Slot {
                generator,
                initialized: false,
            })),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` if both handles share one instance.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot)
    }

    pub fn is_initialized(&self) -> bool {
        self.slot.lock().initialized
    }

    /// Runs [`WorkGenerator::init`] unless it already succeeded.
    ///
    /// Returns `true` if initialization ran during this call.
    ///
    /// # Errors
    ///
    /// Propagates the generator's initialization error; a later call tries
    /// again.
    pub fn ensure_initialized(&self) -> Result<bool> {
        let mut slot = self.slot.lock();
        if slot.initialized {
            return Ok(false);
        }
        slot.generator.init()?;
        slot.initialized = true;
        Ok(true)
    }

    /// Generates one event, calling the generator until the trigger accepts
    /// or [`MAX_TRIALS`] calls were made.
    ///
    /// # Errors
    ///
    /// - Propagates initialization and generation errors.
    /// - Returns [`Error::Generation`] if the trigger rejected every trial.
    pub fn generate_event(&self, request: &EventRequest) -> Result<Event> {
        self.ensure_initialized()?;

        let mut rng = StdRng::seed_from_u64(request.seed);
        let mut slot = self.slot.lock();
        for trials in 1..=MAX_TRIALS {
            let primaries = slot.generator.generate(&mut rng)?;
            if request.trigger.accepts(&primaries) {
                return Ok(Event {
                    header: EventHeader {
                        event_index: request.event_index,
                        seed: request.seed,
                        generator: self.name.to_string(),
                        trigger: request.trigger.to_string(),
                        n_primaries: primaries.len() as u64,
                        trials,
                    },
                    primaries,
                });
            }
        }

        Err(Error::Generation {
            reason: format!(
                "trigger {} rejected {MAX_TRIALS} consecutive events from {}",
                request.trigger, self.name
            ),
        })
    }
}
