//! cosim command-line driver.
//!
//! # Quick Start
//!
//! ```bash
//! # Show the effective configuration
//! cosim config
//!
//! # Run the demo segment in lockstep
//! cosim run --frames 32
//!
//! # Same segment, free-running
//! cosim run --unsynchronized
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// cosim - bridge simulated network segments to external peer simulators.
#[derive(Parser)]
#[command(name = "cosim")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version information.
    Version,

    /// Run a two-device segment over the in-process loopback channel.
    Run {
        /// Project directory holding cosim.toml.
        #[arg(short, long, default_value = ".")]
        project: String,

        /// Override the channel path.
        #[arg(long)]
        channel_path: Option<String>,

        /// Free-running polling instead of lockstep synchronization.
        #[arg(long)]
        unsynchronized: bool,

        /// Simulated run length in nanoseconds.
        #[arg(short, long)]
        duration_ns: Option<u64>,

        /// Number of frames to send.
        #[arg(short, long)]
        frames: Option<u32>,
    },

    /// Show the effective configuration.
    Config {
        /// Project directory holding cosim.toml.
        #[arg(short, long, default_value = ".")]
        project: String,

        /// Output format (text, json, toml).
        #[arg(long, default_value = "text")]
        format: String,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Version => {
            commands::version::run();
            Ok(())
        }
        Commands::Run {
            project,
            channel_path,
            unsynchronized,
            duration_ns,
            frames,
        } => commands::run::run(
            &project,
            commands::run::Overrides {
                channel_path,
                unsynchronized,
                duration_ns,
                frames,
            },
        ),
        Commands::Config { project, format } => commands::config::show(&project, &format),
    }
}
