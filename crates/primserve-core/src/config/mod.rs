//! Run configuration shared by the producer and its workers.
//!
//! - [`RunConfig`] - the process-wide configuration, also served to workers.
//! - [`ParamStore`] - layered generator parameters.
//! - [`ReconfigRequest`] - control-channel commands that start a new batch.

mod params;
mod reconfig;
mod run;

pub use params::ParamStore;
pub use reconfig::ReconfigRequest;
pub use run::{DEFAULT_CHUNK_SIZE, DEFAULT_GENERATOR, DEFAULT_MC_ENGINE, RunConfig};
