//! Startup checks.
//!
//! Verifies the configured ffmpeg and ffprobe binaries respond to
//! `-version` before the server starts accepting uploads, so a
//! misconfigured binary path fails at boot instead of on the first job.

use crate::config::Config;
use std::process::Command;
use thiserror::Error;

/// Error types for startup checks.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("ffmpeg not available: {0}")]
    FfmpegUnavailable(String),

    #[error("ffprobe not available: {0}")]
    FfprobeUnavailable(String),
}

/// Run `<bin> -version` and return its first output line.
fn check_binary(bin: &str) -> Result<String, String> {
    let output = Command::new(bin).arg("-version").output().map_err(|e| {
        format!(
            "{} -version failed; is it installed and in PATH? Error: {}",
            bin, e
        )
    })?;

    if !output.status.success() {
        return Err(format!("{} -version exited with {}", bin, output.status));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(stdout.lines().next().unwrap_or("").to_string())
}

/// Run all startup checks in order: ffmpeg, then ffprobe.
pub fn run_startup_checks(cfg: &Config) -> Result<(), StartupError> {
    let ffmpeg_version =
        check_binary(&cfg.encoding.ffmpeg_bin).map_err(StartupError::FfmpegUnavailable)?;
    tracing::info!(version = %ffmpeg_version, "ffmpeg available");

    let ffprobe_version =
        check_binary(&cfg.encoding.ffprobe_bin).map_err(StartupError::FfprobeUnavailable)?;
    tracing::info!(version = %ffprobe_version, "ffprobe available");

    Ok(())
}
