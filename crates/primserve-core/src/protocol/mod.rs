//! Wire-level protocol between the producer and its workers.
//!
//! - [`state`] - the producer lifecycle reported on the status channel.
//! - [`types`] - primaries, events and chunks.
//! - [`request`] - literal requests and the work reply envelope.
//! - [`notify`] - free-text notifications.

pub mod notify;
pub mod request;
pub mod state;
pub mod types;

pub use notify::*;
pub use request::*;
pub use state::*;
pub use types::*;
