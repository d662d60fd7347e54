//! Veil CLI: drive the capture core against the in-process desktop host.
//!
//! Usage:
//!   veil sources [--screens] [--windows]     List capturable sources
//!   veil share <SOURCE_ID> [OPTIONS]         Share a source with the overlay hidden
//!   veil ask <MESSAGE>                       Ask the assistant
//!   veil check                               Check configuration and capabilities
//!
//! The terminal has no global keyboard hook, so the overlay hotkeys are not
//! active during `veil share`. `veil check` lists the configured bindings.

use clap::{Parser, Subcommand};

use veil_common::config::{AppConfig, OverlayPlacement};
use veil_overlay::MonitorSelector;

mod commands;

#[derive(Parser)]
#[command(
    name = "veil",
    about = "Share your screen while keeping the assistant overlay out of it",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List capturable screens and windows
    Sources {
        /// Only list screens
        #[arg(long)]
        screens: bool,

        /// Only list windows
        #[arg(long)]
        windows: bool,

        /// Print the raw JSON records
        #[arg(long)]
        json: bool,
    },

    /// Share a source until Ctrl+C
    Share {
        /// Source id from `veil sources`
        source_id: String,

        /// Do not open the overlay
        #[arg(long)]
        no_overlay: bool,

        /// Overlay anchor: corner|side|bottom|floating
        #[arg(long, value_parser = parse_placement)]
        placement: Option<OverlayPlacement>,

        /// Monitor for the placement: primary, an index, or a monitor name
        #[arg(long, default_value = "primary")]
        monitor: MonitorSelector,

        /// Stop automatically after this many seconds
        #[arg(long)]
        duration_secs: Option<u64>,
    },

    /// Send one message to the assistant
    Ask {
        /// Message text
        message: String,
    },

    /// Check configuration and platform capabilities
    Check,
}

fn parse_placement(value: &str) -> Result<OverlayPlacement, String> {
    match value.to_ascii_lowercase().as_str() {
        "corner" => Ok(OverlayPlacement::Corner),
        "side" => Ok(OverlayPlacement::Side),
        "bottom" => Ok(OverlayPlacement::Bottom),
        "floating" => Ok(OverlayPlacement::Floating),
        other => Err(format!(
            "unknown placement {other:?} (expected corner, side, bottom or floating)"
        )),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load();

    // Initialize logging
    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    logging.json |= cli.json_logs;
    veil_common::logging::init_logging(&logging);

    match cli.command {
        Commands::Sources {
            screens,
            windows,
            json,
        } => commands::sources::run(&config, screens, windows, json).await,
        Commands::Share {
            source_id,
            no_overlay,
            placement,
            monitor,
            duration_secs,
        } => {
            let layout = commands::share::OverlayLayout { placement, monitor };
            commands::share::run(&config, source_id, !no_overlay, layout, duration_secs).await
        }
        Commands::Ask { message } => commands::ask::run(&config, message).await,
        Commands::Check => commands::check::run(&config).await,
    }
}
