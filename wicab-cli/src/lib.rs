//! # wicab-cli — Terminal WiThrottle Client
//!
//! Thin driver around `wicab-core`: connects to a WiThrottle server,
//! prints every inbound line, and turns prompt commands into protocol
//! commands. All protocol logic lives in the core crate.
//!
//! ## Modes
//!
//! - **Prompt**: Connect and read commands from stdin (default).
//! - **Config generation**: Print the default TOML (`--gen-config`).

pub mod config;
pub mod repl;
