//! Outbound command construction.
//!
//! [`CabCommand`] covers the client→server half of the wire protocol.
//! Every variant encodes to exactly one line; the client forwards lines
//! verbatim, so callers can also hand-build raw strings for anything
//! not covered here.

use std::fmt;

use crate::throttle::{AddressKind, Direction};

/// A typed outbound command. `Display` produces the wire line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CabCommand {
    /// `HU<id>` — identify this client instance by a unique id.
    Identify { id: String },
    /// `N<name>` — announce a human-readable device name.
    SetName { name: String },
    /// `*+` — ask the server to report its heartbeat interval.
    HeartbeatMonitor,
    /// `*` — keepalive ping.
    HeartbeatPing,
    /// `PPA1` / `PPA0` — request track power on or off.
    TrackPower { on: bool },
    /// `M<slot>+<addr><;><addr>` — acquire a locomotive on a slot.
    Acquire { slot: usize, address: u16 },
    /// `M<slot>-<;>r` — release the slot's locomotive.
    Release { slot: usize },
    /// `M<slot>S<addr><;><addr>` — steal an address held by another
    /// client.
    Steal { slot: usize, address: u16 },
    /// `M<slot>A<;>V<value>` — set velocity (0–126, -1 for estop).
    Velocity { slot: usize, value: i16 },
    /// `M<slot>A<;>R<digit>` — set travel direction.
    SetDirection { slot: usize, direction: Direction },
    /// `M<slot>A<;>F<state><number>` — press (`0`) or release a
    /// function button.
    Function {
        slot: usize,
        number: u8,
        pressed: bool,
    },
    /// `M<slot>A<;>X` — emergency stop.
    EmergencyStop { slot: usize },
    /// `Q` — announce that the client is quitting.
    Quit,
}

impl CabCommand {
    /// The wire line for this command, without the trailing newline.
    pub fn to_line(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CabCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CabCommand::Identify { id } => write!(f, "HU{id}"),
            CabCommand::SetName { name } => write!(f, "N{name}"),
            CabCommand::HeartbeatMonitor => write!(f, "*+"),
            CabCommand::HeartbeatPing => write!(f, "*"),
            CabCommand::TrackPower { on } => {
                write!(f, "PPA{}", if *on { '1' } else { '0' })
            }
            CabCommand::Acquire { slot, address } => {
                let p = AddressKind::of(*address).prefix();
                write!(f, "M{slot}+{p}{address}<;>{p}{address}")
            }
            CabCommand::Release { slot } => write!(f, "M{slot}-<;>r"),
            CabCommand::Steal { slot, address } => {
                let p = AddressKind::of(*address).prefix();
                write!(f, "M{slot}S{p}{address}<;>{p}{address}")
            }
            CabCommand::Velocity { slot, value } => write!(f, "M{slot}A<;>V{value}"),
            CabCommand::SetDirection { slot, direction } => {
                write!(f, "M{slot}A<;>R{}", direction.to_wire())
            }
            CabCommand::Function {
                slot,
                number,
                pressed,
            } => {
                write!(f, "M{slot}A<;>F{}{number}", if *pressed { '0' } else { '1' })
            }
            CabCommand::EmergencyStop { slot } => write!(f, "M{slot}A<;>X"),
            CabCommand::Quit => write!(f, "Q"),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handshake_commands() {
        assert_eq!(
            CabCommand::Identify { id: "abc-123".into() }.to_line(),
            "HUabc-123"
        );
        assert_eq!(CabCommand::SetName { name: "wicab".into() }.to_line(), "Nwicab");
        assert_eq!(CabCommand::HeartbeatMonitor.to_line(), "*+");
        assert_eq!(CabCommand::HeartbeatPing.to_line(), "*");
    }

    #[test]
    fn track_power() {
        assert_eq!(CabCommand::TrackPower { on: true }.to_line(), "PPA1");
        assert_eq!(CabCommand::TrackPower { on: false }.to_line(), "PPA0");
    }

    #[test]
    fn acquire_uses_address_kind_prefix() {
        assert_eq!(
            CabCommand::Acquire { slot: 0, address: 1234 }.to_line(),
            "M0+L1234<;>L1234"
        );
        assert_eq!(
            CabCommand::Acquire { slot: 1, address: 3 }.to_line(),
            "M1+S3<;>S3"
        );
    }

    #[test]
    fn steal_and_release() {
        assert_eq!(
            CabCommand::Steal { slot: 0, address: 406 }.to_line(),
            "M0SL406<;>L406"
        );
        assert_eq!(CabCommand::Release { slot: 2 }.to_line(), "M2-<;>r");
    }

    #[test]
    fn throttle_actions() {
        assert_eq!(
            CabCommand::Velocity { slot: 0, value: 26 }.to_line(),
            "M0A<;>V26"
        );
        assert_eq!(
            CabCommand::SetDirection { slot: 0, direction: Direction::Reverse }.to_line(),
            "M0A<;>R0"
        );
        assert_eq!(
            CabCommand::Function { slot: 0, number: 15, pressed: true }.to_line(),
            "M0A<;>F015"
        );
        assert_eq!(
            CabCommand::Function { slot: 0, number: 15, pressed: false }.to_line(),
            "M0A<;>F115"
        );
        assert_eq!(CabCommand::EmergencyStop { slot: 3 }.to_line(), "M3A<;>X");
    }

    #[test]
    fn quit() {
        assert_eq!(CabCommand::Quit.to_line(), "Q");
    }
}
