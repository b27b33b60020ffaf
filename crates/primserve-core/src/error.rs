//! Error types for the primary distribution protocol.
//!
//! This module defines the central `Error` enum shared by the producer, the
//! workers and the channel layer. Every variant carries enough context to be
//! logged on its own; none of them wrap non-`Clone` sources so errors can be
//! fanned out to several tasks.
//!
//! ## Error Cases
//! - `ChannelTimeout`: A send or receive exceeded its deadline. Recoverable,
//!   the worker retries receives a bounded number of times.
//! - `ChannelError`: Transport-level failure (closed peer, protocol misuse).
//! - `Decode`: A payload could not be reconstructed into the expected type.
//! - `UnknownRequest`: The producer received a request it does not understand.
//! - `InvalidConfig`: A configuration value or override was rejected.
//! - `UnknownGenerator`: No generator is registered under the requested name.
//! - `Generation`: Event generation failed.
//! - `Transport`: The transport engine failed to process a chunk.
//! - `ServiceShutdown`: The operation was interrupted by shutdown.

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the primary server and its workers.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    /// A channel send/receive did not complete before its deadline.
    #[error("Channel timeout: {context}")]
    ChannelTimeout { context: String },

    /// Channel failure (e.g., peer gone, reply already pending).
    #[error("Channel error: {context}")]
    ChannelError { context: String },

    /// A payload could not be decoded into the expected type.
    #[error("Decode error: {reason}")]
    Decode { reason: String },

    /// The request payload was not recognized by the producer.
    #[error("Unknown request: {request:?}")]
    UnknownRequest { request: String },

    /// A configuration value, file or override was invalid.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// No generator kind is registered under this name.
    #[error("Unknown generator: {name}")]
    UnknownGenerator { name: String },

    /// Event generation failed.
    #[error("Generation error: {reason}")]
    Generation { reason: String },

    /// The transport engine could not process a chunk.
    #[error("Transport error: {reason}")]
    Transport { reason: String },

    /// The service is in the process of shutting down.
    #[error("Service is shutting down")]
    ServiceShutdown,
}

impl Error {
    /// Returns `true` for errors a caller may retry (currently only
    /// timeouts).
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::ChannelTimeout { .. })
    }

    pub(crate) fn timeout(context: impl Into<String>) -> Self {
        Self::ChannelTimeout {
            context: context.into(),
        }
    }

    pub(crate) fn channel(context: impl Into<String>) -> Self {
        Self::ChannelError {
            context: context.into(),
        }
    }

    pub(crate) fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode {
            reason: err.to_string(),
        }
    }
}
