//! CLI entry point for vidpress.
//!
//! Parses command line arguments, loads configuration, runs the startup
//! checks, and starts the HTTP server.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use vidpress::{run_server, run_startup_checks, Config};

/// vidpress - target-size video compression over HTTP
#[derive(Parser, Debug)]
#[command(name = "vidpress")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (config.toml)
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Skip the ffmpeg/ffprobe startup checks. For testing only.
    #[arg(long, default_value = "false")]
    skip_checks: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match Config::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if args.skip_checks {
        tracing::warn!("skipping startup checks (--skip-checks enabled)");
    } else if let Err(e) = run_startup_checks(&config) {
        eprintln!("Startup check failed: {}", e);
        return ExitCode::FAILURE;
    }

    tracing::info!(
        bind_addr = %config.server.bind_addr,
        upload_dir = %config.storage.upload_dir.display(),
        output_dir = %config.storage.output_dir.display(),
        "starting vidpress"
    );

    if let Err(e) = run_server(&config).await {
        eprintln!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
