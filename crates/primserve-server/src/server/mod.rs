//! Process-level pieces of the `primserve-server` binary.
//!
//! - [`config`] - CLI and environment configuration.
//! - [`driver`] - Wires one producer, the workers and the output sink
//!   together over in-process channels.
//! - [`telemetry`] - Structured logging setup.

pub mod config;
pub mod driver;
pub mod telemetry;
