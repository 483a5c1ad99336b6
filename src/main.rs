use anyhow::{Context, Result};
use clap::Parser;
use tokio::runtime::Runtime;
use tracing_subscriber::EnvFilter;

use transcribe_relay::app::config::{config_path, load_config, load_config_from, save_config, Config};
use transcribe_relay::cli::{
    handle_batch, handle_devices, handle_mic_check, handle_stream, Cli, Commands,
};
use transcribe_relay::menu::run_menu;

fn main() -> Result<()> {
    // Diagnostics go to stderr so transcript output on stdout stays clean.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => {
            // First run: write an editable config with the defaults.
            if !config_path().exists() {
                match save_config(&Config::default()) {
                    Ok(()) => eprintln!("Created default config at {}", config_path().display()),
                    Err(e) => eprintln!("Warning: could not write default config: {:#}", e),
                }
            }
            load_config().unwrap_or_else(|e| {
                eprintln!("Warning: {:#}; falling back to defaults", e);
                Config::default()
            })
        }
    };

    let runtime = Runtime::new().context("Failed to start async runtime")?;

    match &cli.command {
        Some(Commands::Stream(args)) => runtime.block_on(handle_stream(&config, args)),
        Some(Commands::Batch(args)) => runtime.block_on(handle_batch(&config, args)),
        Some(Commands::Devices) => handle_devices(),
        Some(Commands::MicCheck(args)) => handle_mic_check(args),
        None => run_menu(&config, &runtime),
    }
}
