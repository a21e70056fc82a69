//! Connection lifecycle state machine.
//!
//! Provides a [`ConnectionState`] enum with validated transitions that
//! return `Result` instead of panicking. The protocol client owns the
//! only instance and is the single source of truth for whether send and
//! receive are valid.

use std::fmt;

use crate::error::CabError;

/// The current phase of the client connection.
///
/// ```text
///  Disconnected ──► Connecting ──► Connected
///       ▲                │             │
///       └────────────────┴─────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No active connection. Initial / terminal state.
    #[default]
    Disconnected,

    /// TCP connection initiated but not yet established.
    Connecting,

    /// Connection is up and the handshake has been sent.
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
        }
    }
}

impl ConnectionState {
    /// Returns `true` when the connection is ready for protocol traffic.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Returns `true` when the connection is in the idle state.
    pub fn is_disconnected(&self) -> bool {
        matches!(self, Self::Disconnected)
    }

    // ── Transitions ──────────────────────────────────────────────

    /// Transition to `Connecting`.
    ///
    /// Valid from: `Disconnected`.
    pub fn begin_connect(&mut self) -> Result<(), CabError> {
        match self {
            Self::Disconnected => {
                *self = Self::Connecting;
                Ok(())
            }
            _ => Err(CabError::InvalidState(
                "cannot connect: not in Disconnected state",
            )),
        }
    }

    /// Transition to `Connected`.
    ///
    /// Valid from: `Connecting`.
    pub fn complete_connect(&mut self) -> Result<(), CabError> {
        match self {
            Self::Connecting => {
                *self = Self::Connected;
                Ok(())
            }
            _ => Err(CabError::InvalidState(
                "cannot complete connect: not in Connecting state",
            )),
        }
    }

    /// Reset to `Disconnected` regardless of current state.
    ///
    /// Used both for orderly disconnects and for I/O failures observed
    /// by the read loop.
    pub fn force_disconnect(&mut self) {
        *self = Self::Disconnected;
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_lifecycle() {
        let mut state = ConnectionState::Disconnected;

        state.begin_connect().unwrap();
        assert_eq!(state, ConnectionState::Connecting);

        state.complete_connect().unwrap();
        assert!(state.is_connected());

        state.force_disconnect();
        assert!(state.is_disconnected());
    }

    #[test]
    fn invalid_transition_connect_when_connected() {
        let mut state = ConnectionState::Connected;
        assert!(state.begin_connect().is_err());
    }

    #[test]
    fn invalid_transition_complete_from_disconnected() {
        let mut state = ConnectionState::Disconnected;
        assert!(state.complete_connect().is_err());
    }

    #[test]
    fn force_disconnect_from_any_state() {
        for mut state in [
            ConnectionState::Disconnected,
            ConnectionState::Connecting,
            ConnectionState::Connected,
        ] {
            state.force_disconnect();
            assert!(state.is_disconnected());
        }
    }

    #[test]
    fn display_format() {
        assert_eq!(ConnectionState::Disconnected.to_string(), "Disconnected");
        assert_eq!(ConnectionState::Connecting.to_string(), "Connecting");
        assert_eq!(ConnectionState::Connected.to_string(), "Connected");
    }

    #[test]
    fn default_is_disconnected() {
        assert!(ConnectionState::default().is_disconnected());
    }
}
