//! # wicab-core
//!
//! Core protocol engine for wicab, a client for the WiThrottle-style
//! line protocol used to drive model-railroad locomotives and track
//! power over TCP.
//!
//! This crate contains:
//! - **Codec**: [`LineCodec`] for newline-framed TCP I/O via `tokio_util`
//! - **Messages**: [`ServerMessage`] — decoding of the inbound dialects
//!   (heartbeat, roster, power, multi-throttle updates)
//! - **Commands**: [`CabCommand`] — builders for the outbound grammar
//! - **Throttle**: [`Throttle`] — per-locomotive velocity, direction and
//!   function-button state
//! - **Network**: [`CabConnection`] for the managed TCP line transport
//! - **Client**: [`WiThrottleClient`] — handshake, background read loop,
//!   server-negotiated heartbeat, raw-line broadcast
//! - **State**: [`ConnectionState`] lifecycle and the [`Session`]
//!   aggregate with its background [`SessionMonitor`]
//! - **Error**: [`CabError`] — typed, `thiserror`-based error hierarchy

pub mod client;
pub mod codec;
pub mod commands;
pub mod error;
pub mod message;
pub mod network;
pub mod state;
pub mod throttle;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use client::WiThrottleClient;
pub use codec::{LineCodec, MAX_LINE_LEN};
pub use commands::CabCommand;
pub use error::CabError;
pub use message::{MultiThrottleOp, RosterEntry, ServerMessage, ThrottleAction, TrackPower};
pub use network::{CabConnection, Connection, ConnectionInfo};
pub use state::connection::ConnectionState;
pub use state::session::{Session, SessionMonitor, SessionSnapshot};
pub use throttle::{ADDRESS_MAX, AddressKind, Direction, Throttle, VELOCITY_MAX, VELOCITY_MIN};
