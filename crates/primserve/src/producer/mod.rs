//! # Producer
//!
//! The serving side of the protocol. A [`ProducerStateMachine`] owns the
//! current event and decides which chunk goes out next; a [`PrimaryServer`]
//! connects it to the work, status, notification and control channels.
//!
//! Event generation runs on the blocking pool ([`GenerationTask`]) and
//! overlaps with serving: as soon as the last part of an event is handed
//! out, the next event is started, and it is joined only when a worker asks
//! for it.
//!
//! The producer's lifecycle is published through a [`StateCell`] that the
//! status responder reads without locking.

pub mod chunking;
mod driver_pipe;
mod generation;
mod machine;
mod server;
mod state;
mod status;


pub use driver_pipe::DriverPipe;
pub use generation::GenerationTask;
pub use machine::{ProducerStateMachine, Response};
pub use server::{PrimaryServer, REPLY_TIMEOUT};
pub use state::StateCell;
pub use status::{STATUS_POLL_INTERVAL, spawn_status_responder};
