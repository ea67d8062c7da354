//! Marquee CLI - Playback negotiation toolkit
//!
//! Features:
//! - Device capability and profile inspection
//! - Quality tier listing and bandwidth probing
//! - Playback negotiation against a live server
//! - Full playback sessions with a simulated player

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod output;
mod simulated;

use output::OutputFormat;

/// Marquee CLI - Playback negotiation toolkit
#[derive(Parser)]
#[command(name = "marquee")]
#[command(version)]
#[command(about = "Playback negotiation and session toolkit", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (text, json, table)
    #[arg(short, long, global = true, default_value = "text")]
    format: String,

    /// Engine configuration file (JSON)
    #[arg(short, long, global = true, env = "MARQUEE_CONFIG")]
    config: Option<PathBuf>,

    #[command(flatten)]
    server: ServerArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Server credentials
#[derive(clap::Args, Debug, Clone)]
pub struct ServerArgs {
    /// Server base URL
    #[arg(long, global = true, env = "MARQUEE_SERVER")]
    pub server: Option<String>,

    /// Access token
    #[arg(long, global = true, env = "MARQUEE_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// User id
    #[arg(long, global = true, env = "MARQUEE_USER_ID")]
    pub user_id: Option<String>,

    /// Device id (generated when omitted)
    #[arg(long, global = true, env = "MARQUEE_DEVICE_ID")]
    pub device_id: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the detected device capabilities
    Capabilities,

    /// Print the device profile sent during negotiation
    Profile {
        /// Bitrate ceiling in bps (device default when omitted)
        #[arg(short, long)]
        bitrate: Option<u64>,
    },

    /// List quality tiers
    Qualities,

    /// Negotiate playback for an item
    Negotiate {
        /// Item id
        item: String,

        /// Quality tier (auto, maximum, uhd4k, fhd1080_high, fhd1080, hd720, sd480, minimum)
        #[arg(short, long)]
        tier: Option<String>,

        /// Build the legacy HLS locator instead of negotiating
        #[arg(long)]
        legacy: bool,

        /// Start position in seconds
        #[arg(short, long)]
        start: Option<f64>,
    },

    /// Estimate bandwidth from server ping latency
    Probe,

    /// Play an item with a simulated player
    Play {
        /// Item id
        item: String,

        /// Quality tier
        #[arg(short, long)]
        tier: Option<String>,

        /// Simulated content duration in seconds
        #[arg(short, long, default_value = "60")]
        duration: f64,

        /// Playback speed multiplier for the simulated clock
        #[arg(long, default_value = "1.0")]
        speed: f64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    marquee_core::init();

    let format = OutputFormat::from(cli.format.as_str());
    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Capabilities => {
            commands::capabilities(format)?;
        }
        Commands::Profile { bitrate } => {
            commands::profile(bitrate)?;
        }
        Commands::Qualities => {
            commands::qualities(format)?;
        }
        Commands::Negotiate { item, tier, legacy, start } => {
            let tier = commands::parse_tier(tier.as_deref(), &config)?;
            commands::negotiate(&cli.server, &config, &item, tier, legacy, start, format).await?;
        }
        Commands::Probe => {
            commands::probe(&cli.server, &config, format).await?;
        }
        Commands::Play { item, tier, duration, speed } => {
            let tier = commands::parse_tier(tier.as_deref(), &config)?;
            commands::play(&cli.server, config, &item, tier, duration, speed, format).await?;
        }
    }

    Ok(())
}
