#![doc = include_str!("../README.md")]

pub mod generator;
pub mod producer;
pub mod worker;

// Public re-export so downstream crates can reach the protocol types via
// `primserve::primserve_core`.
pub use primserve_core;
pub use primserve_core::{Error, Result};
