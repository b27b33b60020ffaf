use core::sync::atomic::Ordering;
use portable_atomic::AtomicU8;
use primserve_core::protocol::ProtocolState;
use std::sync::Arc;

/// Shared, lock-free view of a producer's [`ProtocolState`].
///
/// Writers are the serving loop and the background generation task; the
/// status responder only reads. [`ProtocolState::Stopped`] is terminal: once
/// stored, no write replaces it.
#[derive(Debug, Clone)]
pub struct StateCell(Arc<AtomicU8>);

impl StateCell {
    pub fn new(state: ProtocolState) -> Self {
        Self(Arc::new(AtomicU8::new(state as u8)))
    }

    pub fn get(&self) -> ProtocolState {
        decode(self.0.load(Ordering::Acquire))
    }

    /// Stores `state` unless the producer already stopped. Returns the
    /// previous state.
    pub fn set(&self, state: ProtocolState) -> ProtocolState {
        let previous = self
            .0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current != ProtocolState::Stopped as u8).then_some(state as u8)
            })
            .unwrap_or_else(|current| current);
        decode(previous)
    }

    /// Moves from `from` to `to` only if the state is still `from`.
    pub fn transition(&self, from: ProtocolState, to: ProtocolState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

fn decode(raw: u8) -> ProtocolState {
    // Only valid discriminants are ever stored.
    ProtocolState::try_from(i32::from(raw)).unwrap_or(ProtocolState::Stopped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stopped_is_terminal() {
        let cell = StateCell::new(ProtocolState::Initializing);
        assert_eq!(cell.set(ProtocolState::Idle), ProtocolState::Initializing);
        assert_eq!(cell.set(ProtocolState::Stopped), ProtocolState::Idle);
        assert_eq!(cell.set(ProtocolState::ReadyToServe), ProtocolState::Stopped);
        assert_eq!(cell.get(), ProtocolState::Stopped);
        assert!(!cell.transition(ProtocolState::Stopped, ProtocolState::Idle));
    }

    #[test]
    fn transitions_only_from_the_expected_state() {
        let cell = StateCell::new(ProtocolState::Initializing);
        let shared = cell.clone();
        assert!(shared.transition(ProtocolState::Initializing, ProtocolState::WaitingEvent));
        assert!(!shared.transition(ProtocolState::Initializing, ProtocolState::WaitingEvent));
        assert_eq!(cell.get(), ProtocolState::WaitingEvent);
    }
}
