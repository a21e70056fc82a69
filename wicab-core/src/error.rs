//! Domain-specific error types for the wicab protocol client.
//!
//! All fallible operations return `Result<T, CabError>`.
//! No panics on invalid input — every error is typed and recoverable.
//! Malformed inbound lines are NOT errors: the decoder folds them into
//! [`ServerMessage::Unrecognized`](crate::message::ServerMessage) instead.

use thiserror::Error;

/// The canonical error type for the wicab client.
#[derive(Debug, Error)]
pub enum CabError {
    // ── Connection Errors ────────────────────────────────────────
    /// The TCP/IO layer reported an error.
    #[error("connection error: {0}")]
    Connection(#[from] std::io::Error),

    /// An operation required a live connection but none is open.
    #[error("not connected")]
    NotConnected,

    /// A lifecycle operation was attempted in the wrong state.
    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    // ── Framing Errors ───────────────────────────────────────────
    /// An inbound line exceeded the codec limit.
    #[error("line too long: {len} bytes (max {max})")]
    LineTooLong { len: usize, max: usize },

    // ── Domain Errors ────────────────────────────────────────────
    /// A locomotive address outside the valid DCC range.
    #[error("throttle address out of range: {0} (expected 0..=9999)")]
    InvalidAddress(u32),

    /// A session operation addressed a slot that does not exist.
    #[error("unknown throttle slot: {0}")]
    UnknownSlot(usize),
}
