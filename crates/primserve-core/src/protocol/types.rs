//! # Work Item Types
//!
//! Value types exchanged between the producer and its workers:
//!
//! - [`Primary`] - one input particle handed to the transport step
//! - [`Event`] - every primary generated for one collision plus its
//!   [`EventHeader`]
//! - [`SubEventInfo`] - bookkeeping for one chunk of an event
//! - [`Chunk`] - the wire payload of a work reply
//!
//! A [`Chunk`] with no primaries and an `event_id` of
//! [`END_OF_WORK_EVENT_ID`] is the end-of-work sentinel. Consumers must check
//! [`Chunk::is_end_of_work`] before touching the primaries.

use serde::{Deserialize, Serialize};

/// Event id carried by the end-of-work sentinel.
pub const END_OF_WORK_EVENT_ID: i32 = -1;

/// A single primary particle.
///
/// Momentum and energy are in GeV, the production vertex in cm and the
/// production time in ns.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Primary {
    /// PDG particle code.
    pub pdg: i32,
    pub px: f64,
    pub py: f64,
    pub pz: f64,
    pub e: f64,
    pub vx: f64,
    pub vy: f64,
    pub vz: f64,
    pub t: f64,
}

impl Primary {
    /// Total momentum.
    pub fn p(&self) -> f64 {
        (self.px * self.px + self.py * self.py + self.pz * self.pz).sqrt()
    }

    /// Transverse momentum.
    pub fn pt(&self) -> f64 {
        self.px.hypot(self.py)
    }
}

/// Event-level metadata, copied into every chunk of the event.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EventHeader {
    /// 1-based index of the event within the current batch.
    pub event_index: u32,
    /// Seed the generator RNG was created from.
    pub seed: u64,
    /// Identity of the generator that produced the event.
    pub generator: String,
    /// Trigger that accepted the event (empty when untriggered).
    pub trigger: String,
    pub n_primaries: u64,
    /// Number of generator calls needed until the trigger accepted.
    pub trials: u32,
}

/// The primaries generated for one collision.
///
/// An event is produced whole by a generation call and replaced, never
/// mutated, by the next one.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Event {
    pub header: EventHeader,
    pub primaries: Vec<Primary>,
}

impl Event {
    pub fn len(&self) -> usize {
        self.primaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primaries.is_empty()
    }
}

/// Describes which part of which event a chunk carries.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SubEventInfo {
    /// Event counter value, or [`END_OF_WORK_EVENT_ID`].
    pub event_id: i32,
    pub max_events: u32,
    /// 1-based part number.
    pub part: u32,
    pub n_parts: u32,
    /// Seed the worker uses for its transport RNG.
    pub seed: u64,
    /// Total number of primaries in the event this part was cut from.
    pub start_index: u64,
    pub header: EventHeader,
}

/// A bounded slice of one event's primaries, or the end-of-work sentinel.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Chunk {
    pub info: SubEventInfo,
    pub primaries: Vec<Primary>,
}

impl Chunk {
    /// Builds the end-of-work sentinel.
    pub fn end_of_work(max_events: u32, seed: u64) -> Self {
        Self {
            info: SubEventInfo {
                event_id: END_OF_WORK_EVENT_ID,
                max_events,
                part: 1,
                n_parts: 1,
                seed,
                start_index: 0,
                header: EventHeader::default(),
            },
            primaries: Vec::new(),
        }
    }

    /// Returns `true` for the reserved termination signal: no primaries and
    /// an `event_id` of [`END_OF_WORK_EVENT_ID`].
    pub fn is_end_of_work(&self) -> bool {
        self.primaries.is_empty() && self.info.event_id == END_OF_WORK_EVENT_ID
    }
}
