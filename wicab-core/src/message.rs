//! Inbound message decoding for the WiThrottle wire protocol.
//!
//! [`ServerMessage::parse`] is a pure decoder from one trimmed wire line
//! to a structured event. Decoding never fails and never panics: lines
//! that match no dialect, and numeric fields that do not parse, fold
//! into [`ServerMessage::Unrecognized`].

use std::fmt;

use crate::throttle::Direction;

// ── TrackPower ───────────────────────────────────────────────────

/// Track power state as reported by `PPA<digit>` lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackPower {
    /// Nothing reported yet, or an unrecognized digit.
    #[default]
    Unknown,
    Off,
    On,
}

impl TrackPower {
    fn from_wire(c: Option<char>) -> Self {
        match c {
            Some('0') => TrackPower::Off,
            Some('1') => TrackPower::On,
            _ => TrackPower::Unknown,
        }
    }
}

impl fmt::Display for TrackPower {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackPower::Unknown => write!(f, "Unknown"),
            TrackPower::Off => write!(f, "Off"),
            TrackPower::On => write!(f, "On"),
        }
    }
}

// ── RosterEntry ──────────────────────────────────────────────────

/// One locomotive in the server's roster listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    /// Human-readable name shown to the operator.
    pub name: String,
    /// The address field as spelled by the server (e.g. `1234`).
    pub id: String,
}

// ── MultiThrottleOp ──────────────────────────────────────────────

/// The operation character of an `M<slot><op><;><payload>` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultiThrottleOp {
    /// `A` — an action on the slot (velocity, direction, function).
    Action,
    /// `+` — an address was added to the slot.
    Add,
    /// `-` — an address was removed from the slot.
    Remove,
    /// `S` — the slot stole an address held by another client.
    Steal,
}

impl MultiThrottleOp {
    fn from_wire(c: char) -> Option<Self> {
        match c {
            'A' => Some(MultiThrottleOp::Action),
            '+' => Some(MultiThrottleOp::Add),
            '-' => Some(MultiThrottleOp::Remove),
            'S' => Some(MultiThrottleOp::Steal),
            _ => None,
        }
    }

    /// The wire character for this operation.
    pub fn to_wire(self) -> char {
        match self {
            MultiThrottleOp::Action => 'A',
            MultiThrottleOp::Add => '+',
            MultiThrottleOp::Remove => '-',
            MultiThrottleOp::Steal => 'S',
        }
    }
}

// ── ServerMessage ────────────────────────────────────────────────

/// A decoded inbound line. First matching dialect wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// `*<seconds>` — the server announced its heartbeat interval.
    Heartbeat { seconds: u64 },
    /// `RL…` — full roster listing, in the order the server sent it.
    Roster(Vec<RosterEntry>),
    /// `PPA<digit>` — track power state.
    Power(TrackPower),
    /// `M<slot><op><;><payload>` — multi-throttle echo/update. The
    /// payload stays raw here; [`ThrottleAction::parse`] decodes it once
    /// the update is routed to a known slot.
    ThrottleUpdate {
        slot: usize,
        op: MultiThrottleOp,
        payload: String,
    },
    /// Anything the grammar does not cover.
    Unrecognized,
}

impl ServerMessage {
    /// Decode one trimmed, non-empty wire line.
    pub fn parse(line: &str) -> Self {
        if let Some(rest) = line.strip_prefix('*') {
            return match rest.parse::<u64>() {
                Ok(seconds) => ServerMessage::Heartbeat { seconds },
                Err(_) => ServerMessage::Unrecognized,
            };
        }
        if let Some(rest) = line.strip_prefix("RL") {
            return ServerMessage::Roster(parse_roster(rest));
        }
        if let Some(rest) = line.strip_prefix("PPA") {
            return ServerMessage::Power(TrackPower::from_wire(rest.chars().next()));
        }
        if let Some(update) = parse_multi_throttle(line) {
            return update;
        }
        ServerMessage::Unrecognized
    }
}

/// Roster format: `RL<count>|<name>|<id>|<kind>|<name>|<id>|<kind>…`.
/// Names sit at a stride of 3 starting at offset 1 of the split parts;
/// the leading count field is skipped and short tails are ignored.
fn parse_roster(rest: &str) -> Vec<RosterEntry> {
    let parts: Vec<&str> = rest.split('|').collect();
    let mut entries = Vec::new();
    let mut i = 1;
    while i + 1 < parts.len() {
        entries.push(RosterEntry {
            name: parts[i].to_string(),
            id: parts[i + 1].to_string(),
        });
        i += 3;
    }
    entries
}

fn parse_multi_throttle(line: &str) -> Option<ServerMessage> {
    let rest = line.strip_prefix('M')?;
    let mut chars = rest.chars();
    let slot = chars.next()?.to_digit(10)? as usize;
    let op = MultiThrottleOp::from_wire(chars.next()?)?;
    let payload = chars.as_str().strip_prefix("<;>")?;
    Some(ServerMessage::ThrottleUpdate {
        slot,
        op,
        payload: payload.to_string(),
    })
}

// ── ThrottleAction ───────────────────────────────────────────────

/// A decoded per-throttle action carried in the payload of a
/// multi-throttle line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleAction {
    /// `V<int>` — raw velocity; clamped to `[-1, 126]` on application.
    Velocity(i32),
    /// `R…<char>` — travel direction, read from the trailing character.
    Direction(Direction),
    /// `F<state><number>` — function button; state `0` presses, any
    /// other state releases.
    Function { number: u8, pressed: bool },
}

impl ThrottleAction {
    /// Decode a multi-throttle payload. Returns `None` for payloads
    /// outside the velocity/direction/function sub-grammar; the caller
    /// logs and moves on.
    pub fn parse(payload: &str) -> Option<Self> {
        let mut chars = payload.chars();
        match chars.next()? {
            'V' => chars.as_str().parse::<i32>().ok().map(ThrottleAction::Velocity),
            'R' => payload
                .chars()
                .last()
                .map(|c| ThrottleAction::Direction(Direction::from_wire(c))),
            'F' => {
                let state = chars.next()?;
                let number = chars.as_str().parse::<u8>().ok()?;
                Some(ThrottleAction::Function {
                    number,
                    pressed: state == '0',
                })
            }
            _ => None,
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
