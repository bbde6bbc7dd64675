//! # axiom-seat
//!
//! Command line front end for the seat engine: replays scripted device
//! events against a headless scene and checks seat configuration files.

use anyhow::Result;
use axiom_seat::event::Outgoing;
use axiom_seat::replay::{Replay, Script};
use axiom_seat::SeatConfig;
use clap::{Parser, Subcommand};
use log::{error, info};

#[derive(Parser)]
#[command(name = "axiom-seat")]
#[command(about = "Seat input-focus routing and grab dispatch for the Axiom compositor")]
#[command(version)]
struct Cli {
    /// Path to seat configuration file
    #[arg(short, long, default_value = "~/.config/axiom/seat.toml")]
    config: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay a TOML event script and print every delivery and signal
    Replay {
        /// Script with [[output]], [[view]] and [[step]] tables
        script: String,
    },
    /// Load and validate a seat configuration file
    CheckConfig {
        /// Configuration file to check
        file: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    if cli.debug {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    info!("💺 axiom-seat {} (built {})", axiom_seat::VERSION, env!("BUILD_DATE"));

    match cli.command {
        Command::Replay { script } => {
            let config = match SeatConfig::load(&cli.config) {
                Ok(config) => {
                    info!("✅ Configuration loaded from: {}", cli.config);
                    config
                }
                Err(e) => {
                    info!("📝 Using default configuration ({:#})", e);
                    SeatConfig::default()
                }
            };
            replay(&script, &config)
        }
        Command::CheckConfig { file } => match SeatConfig::load(&file) {
            Ok(config) => {
                info!("✅ {} is valid (seat '{}')", file, config.seat.name);
                Ok(())
            }
            Err(e) => {
                error!("❌ {:#}", e);
                Err(e)
            }
        },
    }
}

fn replay(path: &str, config: &SeatConfig) -> Result<()> {
    let script = Script::load(path)?;
    let mut replay = Replay::new(&script, config);
    let outputs = replay.run(&script.steps)?;

    for output in &outputs {
        println!("# step {}", output.index);
        for message in &output.messages {
            match message {
                Outgoing::Deliver(delivery) => println!("  -> {} {:?}", delivery.target, delivery.event),
                Outgoing::ProtocolError {
                    object,
                    kind,
                    message,
                } => println!("  !! {} {:?}: {}", object, kind, message),
                Outgoing::NoMemory { client } => println!("  !! {} out of memory", client),
            }
        }
        for signal in &output.signals {
            println!("  ** {:?}", signal);
        }
    }

    info!("🏁 Replayed {} steps", outputs.len());
    Ok(())
}
