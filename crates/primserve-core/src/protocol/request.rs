use super::types::Chunk;
use crate::{Error, config::RunConfig};
use serde::{Deserialize, Serialize};

/// Literal payload asking the producer for its run configuration.
pub const CONFIG_REQUEST: &[u8] = b"configrequest";

/// Literal payload asking the producer for the next chunk of primaries.
pub const PRIM_REQUEST: &[u8] = b"primrequest";

/// A request received on the work channel, classified by its literal payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Config,
    Primaries,
    Unknown(String),
}

impl Request {
    pub fn parse(payload: &[u8]) -> Self {
        match payload {
            CONFIG_REQUEST => Self::Config,
            PRIM_REQUEST => Self::Primaries,
            other => Self::Unknown(String::from_utf8_lossy(other).into_owned()),
        }
    }
}

/// Category of a [`WorkReply::Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyErrorKind {
    UnknownRequest,
    Generation,
    Internal,
}

/// Reply envelope sent on the work channel.
///
/// Every request gets exactly one reply, including requests the producer
/// could not make sense of, so a requester is never left waiting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkReply {
    Config(RunConfig),
    Chunk(Chunk),
    Error {
        kind: ReplyErrorKind,
        message: String,
    },
}

impl From<&Error> for WorkReply {
    fn from(err: &Error) -> Self {
        let kind = match err {
            Error::UnknownRequest { .. } => ReplyErrorKind::UnknownRequest,
            Error::Generation { .. } | Error::UnknownGenerator { .. } => {
                ReplyErrorKind::Generation
            }
            _ => ReplyErrorKind::Internal,
        };
        Self::Error {
            kind,
            message: err.to_string(),
        }
    }
}

impl WorkReply {
    /// Extracts a chunk, turning any other reply into an error.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownRequest`] / [`Error::Generation`] /
    ///   [`Error::ChannelError`] mirroring an error reply.
    /// - [`Error::Decode`] if the reply carries a configuration instead.
    pub fn into_chunk(self) -> Result<Chunk, Error> {
        match self {
            Self::Chunk(chunk) => Ok(chunk),
            Self::Config(_) => Err(Error::Decode {
                reason: "expected a chunk, received a configuration".to_string(),
            }),
            Self::Error { kind, message } => Err(kind.into_error(message)),
        }
    }

    /// Extracts a run configuration, turning any other reply into an error.
    ///
    /// # Errors
    ///
    /// See [`WorkReply::into_chunk`].
    pub fn into_config(self) -> Result<RunConfig, Error> {
        match self {
            Self::Config(config) => Ok(config),
            Self::Chunk(_) => Err(Error::Decode {
                reason: "expected a configuration, received a chunk".to_string(),
            }),
            Self::Error { kind, message } => Err(kind.into_error(message)),
        }
    }
}

impl ReplyErrorKind {
    fn into_error(self, message: String) -> Error {
        match self {
            Self::UnknownRequest => Error::UnknownRequest { request: message },
            Self::Generation => Error::Generation { reason: message },
            Self::Internal => Error::ChannelError { context: message },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Chunk;

    #[test]
    fn classifies_literal_payloads() {
        assert_eq!(Request::parse(b"configrequest"), Request::Config);
        assert_eq!(Request::parse(b"primrequest"), Request::Primaries);
        assert_eq!(
            Request::parse(b"primrequest "),
            Request::Unknown("primrequest ".to_string())
        );
        assert_eq!(Request::parse(b""), Request::Unknown(String::new()));
    }

    #[test]
    fn error_replies_map_back_to_errors() {
        let reply = WorkReply::from(&Error::UnknownRequest {
            request: "hello".to_string(),
        });
        assert!(matches!(
            reply,
            WorkReply::Error {
                kind: ReplyErrorKind::UnknownRequest,
                ..
            }
        ));
        assert!(matches!(
            reply.into_chunk(),
            Err(Error::UnknownRequest { .. })
        ));
    }

    #[test]
    fn mismatched_replies_are_decode_errors() {
        let reply = WorkReply::Chunk(Chunk::default());
        assert!(matches!(reply.into_config(), Err(Error::Decode { .. })));
    }
}
