//! Payload encoding for channel messages.
//!
//! Producer and workers only ever call [`encode`] and [`decode`]; the
//! underlying format is an implementation detail of this module.

use crate::{Error, Result};
use bytes::Bytes;
use serde::{Serialize, de::DeserializeOwned};

/// Serializes `value` into a message payload.
///
/// Non-finite floats are written as `null` and will not decode back into a
/// [`Primary`](crate::protocol::Primary); generators never produce them.
///
/// # Errors
///
/// Returns [`Error::Decode`] if the value cannot be serialized.
pub fn encode<T: Serialize>(value: &T) -> Result<Bytes> {
    serde_json::to_vec(value)
        .map(Bytes::from)
        .map_err(|e| Error::Decode {
            reason: format!("failed to encode payload: {e}"),
        })
}

/// Reconstructs a value from a message payload.
///
/// # Errors
///
/// Returns [`Error::Decode`] if the payload is not a valid encoding of `T`.
pub fn decode<T: DeserializeOwned>(payload: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(payload)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Chunk, Primary, WorkReply};

    #[test]
    fn chunk_reply_survives_the_wire() {
        let mut chunk = Chunk::end_of_work(5, 11);
        chunk.info.event_id = 2;
        chunk.primaries.push(Primary {
            pdg: 211,
            px: 0.5,
            e: 0.52,
            ..Primary::default()
        });

        let payload = encode(&WorkReply::Chunk(chunk.clone())).unwrap();
        let decoded: WorkReply = decode(&payload).unwrap();
        assert_eq!(decoded, WorkReply::Chunk(chunk));
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let err = decode::<WorkReply>(b"\x00\x01not a reply").unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }
}
