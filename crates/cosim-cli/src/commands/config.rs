//! Configuration display command.

use anyhow::{Context, Result};
use cosim_config::{CosimConfig, Paths};
use std::path::Path;

/// Show the effective configuration for a project directory.
pub fn show(project: &str, format: &str) -> Result<()> {
    let project_path = Path::new(project);
    let config =
        CosimConfig::load_from_dir(project_path).context("Failed to load configuration")?;

    match format {
        "json" => {
            let json = serde_json::to_string_pretty(&config)?;
            println!("{json}");
        }
        "toml" => {
            let toml_str = toml::to_string_pretty(&config)?;
            println!("{toml_str}");
        }
        _ => print_text(project_path, &config),
    }

    Ok(())
}

fn print_text(project_path: &Path, config: &CosimConfig) {
    println!("cosim Configuration");
    println!("===================\n");

    let project_file = Paths::project_config_file(project_path);
    println!(
        "Project file: {} ({})",
        project_file.display(),
        if project_file.exists() { "found" } else { "not found" }
    );
    println!();

    println!("Link:");
    println!("  Channel path: {}", config.link.channel_path);
    println!("  Sync mode: {}", config.link.sync_mode);
    println!("  Sync interval: {}", config.link.sync_interval());
    println!("  Poll interval: {}", config.link.poll_interval());
    println!("  Link latency: {}", config.link.link_latency());
    println!();

    println!("Simulation:");
    println!("  Duration: {}", config.simulation.duration());
    println!("  Max events: {}", config.simulation.max_events);
    println!("  Channel capacity: {}", config.simulation.channel_capacity);
    println!();

    println!("Traffic:");
    println!("  Frames: {}", config.traffic.frames);
    println!("  Payload: {} bytes", config.traffic.payload_bytes);
    println!("  Interval: {}", config.traffic.interval());
}
