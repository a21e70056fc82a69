//! Prompt command parsing.
//!
//! Maps the lines an operator types at the prompt onto core
//! [`CabCommand`]s or local actions. Parsing is line-oriented and
//! whitespace-tolerant; anything unknown produces a usage error string
//! rather than reaching the wire.

use wicab_core::throttle::Direction;

/// One parsed prompt line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    /// `power on` / `power off`.
    Power(bool),
    /// `acquire <address>` — create a slot and request the locomotive.
    Acquire { address: u16 },
    /// `release <slot>`.
    Release { slot: usize },
    /// `v <slot> <value>` — velocity, -1..=126.
    Velocity { slot: usize, value: i16 },
    /// `dir <slot> f|r`.
    Direction { slot: usize, direction: Direction },
    /// `fn <slot> <number> [on|off]` — function button, default on.
    Function {
        slot: usize,
        number: u8,
        pressed: bool,
    },
    /// `estop <slot>`.
    EmergencyStop { slot: usize },
    /// `raw <line>` — send a line verbatim.
    Raw(String),
    /// `roster` — print the roster listing.
    Roster,
    /// `status` — print the session snapshot.
    Status,
    /// `help`.
    Help,
    /// `quit` / `exit`.
    Quit,
}

/// Usage text shown by `help` and on parse errors.
pub const USAGE: &str = "\
commands:
  power on|off          request track power
  acquire <address>     acquire a locomotive (prints its slot)
  release <slot>        release a slot
  v <slot> <value>      set velocity (-1..=126)
  dir <slot> f|r        set direction
  fn <slot> <n> [on|off] press/release function button n
  estop <slot>          emergency stop
  raw <line>            send a raw protocol line
  roster                show the server roster
  status                show the session state
  quit                  disconnect and exit";

/// Parse one prompt line.
pub fn parse(input: &str) -> Result<ReplCommand, String> {
    let mut words = input.split_whitespace();
    let Some(verb) = words.next() else {
        return Err(USAGE.to_string());
    };

    match verb {
        "power" => match words.next() {
            Some("on") => Ok(ReplCommand::Power(true)),
            Some("off") => Ok(ReplCommand::Power(false)),
            _ => Err("usage: power on|off".into()),
        },
        "acquire" => {
            let address = arg(words.next(), "acquire <address>")?;
            Ok(ReplCommand::Acquire { address })
        }
        "release" => {
            let slot = arg(words.next(), "release <slot>")?;
            Ok(ReplCommand::Release { slot })
        }
        "v" | "velocity" => {
            let slot = arg(words.next(), "v <slot> <value>")?;
            let value = arg(words.next(), "v <slot> <value>")?;
            Ok(ReplCommand::Velocity { slot, value })
        }
        "dir" => {
            let slot = arg(words.next(), "dir <slot> f|r")?;
            let direction = match words.next() {
                Some("f") | Some("forward") => Direction::Forward,
                Some("r") | Some("reverse") => Direction::Reverse,
                _ => return Err("usage: dir <slot> f|r".into()),
            };
            Ok(ReplCommand::Direction { slot, direction })
        }
        "fn" => {
            let slot = arg(words.next(), "fn <slot> <number> [on|off]")?;
            let number = arg(words.next(), "fn <slot> <number> [on|off]")?;
            let pressed = match words.next() {
                None | Some("on") => true,
                Some("off") => false,
                _ => return Err("usage: fn <slot> <number> [on|off]".into()),
            };
            Ok(ReplCommand::Function {
                slot,
                number,
                pressed,
            })
        }
        "estop" => {
            let slot = arg(words.next(), "estop <slot>")?;
            Ok(ReplCommand::EmergencyStop { slot })
        }
        "raw" => {
            let rest = input.trim_start().strip_prefix("raw").unwrap_or("").trim();
            if rest.is_empty() {
                return Err("usage: raw <line>".into());
            }
            Ok(ReplCommand::Raw(rest.to_string()))
        }
        "roster" => Ok(ReplCommand::Roster),
        "status" => Ok(ReplCommand::Status),
        "help" => Ok(ReplCommand::Help),
        "quit" | "exit" => Ok(ReplCommand::Quit),
        other => Err(format!("unknown command: {other}\n{USAGE}")),
    }
}

fn arg<T: std::str::FromStr>(word: Option<&str>, usage: &str) -> Result<T, String> {
    word.and_then(|w| w.parse().ok())
        .ok_or_else(|| format!("usage: {usage}"))
}

// ── Tests ────────────────────────────────────────────────────────
