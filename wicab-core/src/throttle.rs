//! Per-locomotive throttle state.
//!
//! A [`Throttle`] is the controllable state of one locomotive slot:
//! velocity, travel direction, and the set of pressed function buttons.
//! Slots themselves live in the session aggregate
//! ([`Session`](crate::state::session::Session)); the throttle knows
//! nothing about the wire or the connection.

use std::collections::BTreeSet;
use std::fmt;

use crate::error::CabError;
use crate::message::ThrottleAction;

// ── Direction ────────────────────────────────────────────────────

/// Travel direction as encoded on the wire (`R0` reverse, `R1` forward).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    Reverse,
    #[default]
    Forward,
}

impl Direction {
    /// Decode a wire character. Any character other than `0` maps to
    /// `Forward`, the established fallback for this protocol.
    pub fn from_wire(c: char) -> Self {
        match c {
            '0' => Direction::Reverse,
            _ => Direction::Forward,
        }
    }

    /// The wire digit for this direction.
    pub fn to_wire(self) -> char {
        match self {
            Direction::Reverse => '0',
            Direction::Forward => '1',
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Reverse => write!(f, "Reverse"),
            Direction::Forward => write!(f, "Forward"),
        }
    }
}

// ── AddressKind ──────────────────────────────────────────────────

/// DCC address class; decides the `S`/`L` letter used when the address
/// appears in multi-throttle commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressKind {
    /// Addresses below 128.
    Short,
    /// Addresses 128 and up.
    Long,
}

impl AddressKind {
    /// Classify a locomotive address.
    pub fn of(address: u16) -> Self {
        if address < 128 {
            AddressKind::Short
        } else {
            AddressKind::Long
        }
    }

    /// The wire prefix letter for this kind.
    pub fn prefix(self) -> char {
        match self {
            AddressKind::Short => 'S',
            AddressKind::Long => 'L',
        }
    }
}

// ── Throttle ─────────────────────────────────────────────────────

/// Highest valid DCC address.
pub const ADDRESS_MAX: u16 = 9999;

/// Velocity floor: `-1` is the protocol's "emergency stop / unknown" value.
pub const VELOCITY_MIN: i16 = -1;

/// Velocity ceiling: 126 speed steps.
pub const VELOCITY_MAX: i16 = 126;

/// The controllable state of one locomotive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Throttle {
    address: u16,
    velocity: i16,
    direction: Direction,
    pressed_functions: BTreeSet<u8>,
}

impl Throttle {
    /// Create a throttle for the given address.
    ///
    /// Fails with [`CabError::InvalidAddress`] when the address is above
    /// [`ADDRESS_MAX`]; negative addresses are unrepresentable in `u16`.
    pub fn new(address: u16) -> Result<Self, CabError> {
        if address > ADDRESS_MAX {
            return Err(CabError::InvalidAddress(u32::from(address)));
        }
        Ok(Self {
            address,
            velocity: 0,
            direction: Direction::Forward,
            pressed_functions: BTreeSet::new(),
        })
    }

    pub fn address(&self) -> u16 {
        self.address
    }

    /// Short/long classification of the address.
    pub fn address_kind(&self) -> AddressKind {
        AddressKind::of(self.address)
    }

    pub fn velocity(&self) -> i16 {
        self.velocity
    }

    /// Store a velocity, clamped into `[-1, 126]`.
    pub fn set_velocity(&mut self, velocity: i32) {
        self.velocity = velocity.clamp(i32::from(VELOCITY_MIN), i32::from(VELOCITY_MAX)) as i16;
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn set_direction(&mut self, direction: Direction) {
        self.direction = direction;
    }

    /// Mark a function button pressed. Idempotent.
    pub fn press_function(&mut self, number: u8) {
        self.pressed_functions.insert(number);
    }

    /// Mark a function button released. A no-op for absent functions.
    pub fn unpress_function(&mut self, number: u8) {
        self.pressed_functions.remove(&number);
    }

    pub fn is_function_pressed(&self, number: u8) -> bool {
        self.pressed_functions.contains(&number)
    }

    /// Currently pressed function numbers, ascending.
    pub fn pressed_functions(&self) -> &BTreeSet<u8> {
        &self.pressed_functions
    }

    /// Fold one decoded wire action into this throttle.
    pub fn apply(&mut self, action: &ThrottleAction) {
        match action {
            ThrottleAction::Velocity(v) => self.set_velocity(*v),
            ThrottleAction::Direction(d) => self.set_direction(*d),
            ThrottleAction::Function { number, pressed } => {
                if *pressed {
                    self.press_function(*number);
                } else {
                    self.unpress_function(*number);
                }
            }
        }
    }
}

impl fmt::Display for Throttle {
    /// Wire spelling of the address, e.g. `S3` or `L1234`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.address_kind().prefix(), self.address)
    }
}

// ── Tests ────────────────────────────────────────────────────────
