//! wicab — entry point.
//!
//! ```text
//! wicab                           Connect using wicab.toml / defaults
//! wicab --host 10.0.0.2 -p 12090  Override the server endpoint
//! wicab --config <path>           Load a custom config TOML
//! wicab --gen-config              Write default config to stdout
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use wicab_cli::config::CabConfig;
use wicab_cli::repl::{self, ReplCommand, USAGE};
use wicab_core::{CabCommand, SessionMonitor, SessionSnapshot, WiThrottleClient};

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "wicab", about = "Terminal client for WiThrottle servers")]
struct Cli {
    /// Server host (overrides the config file).
    #[arg(long)]
    host: Option<String>,

    /// Server port (overrides the config file).
    #[arg(short, long)]
    port: Option<u16>,

    /// Device name announced to the server.
    #[arg(long)]
    name: Option<String>,

    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "wicab.toml")]
    config: PathBuf,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // --gen-config: dump defaults and exit.
    if cli.gen_config {
        let text = toml::to_string_pretty(&CabConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    // Load config, then let flags override it.
    let config = CabConfig::load(&cli.config);
    let host = cli.host.unwrap_or(config.connection.host);
    let port = cli.port.unwrap_or(config.connection.port);
    let device_name = cli.name.unwrap_or(config.client.device_name);

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let client = if config.client.client_id.is_empty() {
        WiThrottleClient::with_device_name(device_name)
    } else {
        WiThrottleClient::with_options(config.client.client_id.clone(), device_name)
    };
    let monitor = SessionMonitor::spawn(&client);

    println!("connecting to {host}:{port} …");
    client.connect(&host, port).await?;
    println!("connected — type `help` for commands");

    let mut messages = client.subscribe();
    let mut input = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
            message = messages.recv() => match message {
                Ok(line) => println!("<< {line}"),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                    debug!(missed, "prompt lagged behind the read loop");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
            line = input.next_line() => {
                let Ok(Some(line)) = line else { break };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match repl::parse(line) {
                    Ok(ReplCommand::Quit) => break,
                    Ok(command) => {
                        if let Err(e) = run_command(&client, &monitor, command).await {
                            eprintln!("error: {e}");
                        }
                    }
                    Err(usage) => eprintln!("{usage}"),
                }
            }
        }
    }

    monitor.shutdown();
    let _ = client.send_command(&CabCommand::Quit).await;
    client.close().await;
    println!("disconnected");
    Ok(())
}

// ── Command dispatch ─────────────────────────────────────────────

async fn run_command(
    client: &WiThrottleClient,
    monitor: &SessionMonitor,
    command: ReplCommand,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        ReplCommand::Power(on) => client.send_command(&CabCommand::TrackPower { on }).await?,
        ReplCommand::Acquire { address } => {
            let slot = monitor.acquire(address)?;
            client
                .send_command(&CabCommand::Acquire { slot, address })
                .await?;
            println!("acquired {address} on slot {slot}");
        }
        ReplCommand::Release { slot } => {
            client.send_command(&CabCommand::Release { slot }).await?;
            monitor.release(slot)?;
        }
        ReplCommand::Velocity { slot, value } => {
            client
                .send_command(&CabCommand::Velocity { slot, value })
                .await?;
        }
        ReplCommand::Direction { slot, direction } => {
            client
                .send_command(&CabCommand::SetDirection { slot, direction })
                .await?;
        }
        ReplCommand::Function {
            slot,
            number,
            pressed,
        } => {
            client
                .send_command(&CabCommand::Function {
                    slot,
                    number,
                    pressed,
                })
                .await?;
        }
        ReplCommand::EmergencyStop { slot } => {
            client
                .send_command(&CabCommand::EmergencyStop { slot })
                .await?;
        }
        ReplCommand::Raw(line) => client.send(&line).await?,
        ReplCommand::Roster => print_roster(&monitor.snapshot()),
        ReplCommand::Status => print_status(&monitor.snapshot()),
        ReplCommand::Help => println!("{USAGE}"),
        ReplCommand::Quit => unreachable!("handled by the prompt loop"),
    }
    Ok(())
}

fn print_roster(snapshot: &SessionSnapshot) {
    if snapshot.roster.is_empty() {
        println!("roster: (empty)");
        return;
    }
    for entry in &snapshot.roster {
        println!("  {} ({})", entry.name, entry.id);
    }
}

fn print_status(snapshot: &SessionSnapshot) {
    println!("connection: {}", snapshot.connection);
    println!("track power: {}", snapshot.power);
    for (slot, throttle) in snapshot.throttles.iter().enumerate() {
        match throttle {
            Some(t) => println!(
                "  slot {slot}: {t} v={} {} fns={:?}",
                t.velocity(),
                t.direction(),
                t.pressed_functions()
            ),
            None => println!("  slot {slot}: (released)"),
        }
    }
}
