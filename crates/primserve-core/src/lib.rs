#![doc = include_str!("../README.md")]

pub mod channel;
pub mod codec;
pub mod config;
pub mod error;
pub mod protocol;

pub use error::{Error, Result};
