use crate::{Error, Result};
use core::fmt;

/// Size in bytes of an encoded [`ProtocolState`] on the status channel.
pub const STATE_CODE_SIZE: usize = core::mem::size_of::<i32>();

/// Lifecycle of a producer as observed through the status channel.
///
/// Transitions are driven by the producer only:
///
/// `Initializing → WaitingEvent → ReadyToServe → Idle → Stopped`
///
/// `Stopped` is terminal. `WaitingEvent` is only reported while a background
/// generation is in flight, and `ReadyToServe` is only entered once the event
/// it produced is complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ProtocolState {
    Initializing = 0,
    WaitingEvent = 1,
    ReadyToServe = 2,
    Idle = 3,
    Stopped = 4,
}

impl ProtocolState {
    /// Returns `true` if a worker should bother sending a work request.
    pub const fn has_work(self) -> bool {
        matches!(
            self,
            Self::Initializing | Self::WaitingEvent | Self::ReadyToServe
        )
    }

    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Encodes the state as the fixed-width status reply.
    pub const fn to_bytes(self) -> [u8; STATE_CODE_SIZE] {
        self.code().to_le_bytes()
    }

    /// Decodes a status reply.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if the payload is not exactly
    /// [`STATE_CODE_SIZE`] bytes or the code is unknown.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let raw: [u8; STATE_CODE_SIZE] = bytes.try_into().map_err(|_| Error::Decode {
            reason: format!(
                "status reply has {} bytes, expected {STATE_CODE_SIZE}",
                bytes.len()
            ),
        })?;
        Self::try_from(i32::from_le_bytes(raw))
    }
}

impl TryFrom<i32> for ProtocolState {
    type Error = Error;

    fn try_from(code: i32) -> Result<Self> {
        match code {
            0 => Ok(Self::Initializing),
            1 => Ok(Self::WaitingEvent),
            2 => Ok(Self::ReadyToServe),
            3 => Ok(Self::Idle),
            4 => Ok(Self::Stopped),
            other => Err(Error::Decode {
                reason: format!("unknown protocol state code {other}"),
            }),
        }
    }
}

impl fmt::Display for ProtocolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Initializing => "INITIALIZING",
            Self::WaitingEvent => "WAITING EVENT",
            Self::ReadyToServe => "SERVING",
            Self::Idle => "IDLE",
            Self::Stopped => "STOPPED",
        };
        f.write_str(name)
    }
}
