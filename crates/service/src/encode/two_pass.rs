//! Two-pass encode run driver.
//!
//! One run: probe the input, plan a bitrate, execute ffmpeg pass 1
//! (analyze) and pass 2 (encode), streaming each pass's stderr through the
//! progress parser and mapping phase-local progress into the job's global
//! [0, 1] range. The driver knows nothing about the registry; it reports
//! through the narrow [`EncodeObserver`] contract.

use crate::bitrate::{plan_video_bitrate, PlanError};
use crate::probe::{probe_media, ProbeError};
use crate::progress::parse_stats_line;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Share of global progress attributed to pass 1. The analysis pass does no
/// audio or muxing work, so it is weighted lighter than the encode pass.
pub const ANALYZE_WEIGHT: f64 = 0.45;

/// Share of global progress attributed to pass 2.
pub const ENCODE_WEIGHT: f64 = 0.55;

/// Discard sink for pass 1 output.
const NULL_SINK: &str = "/dev/null";

/// Error type for encode runs.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// Probing the input failed.
    #[error(transparent)]
    Probe(#[from] ProbeError),

    /// Bitrate planning rejected the inputs.
    #[error(transparent)]
    Plan(#[from] PlanError),

    /// An ffmpeg pass exited with a nonzero status.
    #[error("ffmpeg pass {pass} failed with exit code {code}")]
    PassFailed { pass: u8, code: i32 },

    /// An ffmpeg pass was terminated by a signal.
    #[error("ffmpeg pass {pass} was terminated by a signal")]
    PassTerminated { pass: u8 },

    /// IO error spawning or reading the child process.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Progress and log sink for one encode run.
pub trait EncodeObserver: Send + Sync {
    /// Global progress in [0, 1], playback-speed multiplier, and estimated
    /// seconds remaining (0 when unknown).
    fn on_progress(&self, progress: f64, speed: f64, eta_secs: f64);

    /// One human-readable diagnostic line.
    fn on_log(&self, message: String);
}

/// Observer that discards every event.
pub struct NullObserver;

impl EncodeObserver for NullObserver {
    fn on_progress(&self, _progress: f64, _speed: f64, _eta_secs: f64) {}
    fn on_log(&self, _message: String) {}
}

/// The two encoder phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    Analyze,
    Encode,
}

impl Pass {
    fn number(self) -> u8 {
        match self {
            Pass::Analyze => 1,
            Pass::Encode => 2,
        }
    }

    /// Global progress already accumulated when this pass starts.
    fn base(self) -> f64 {
        match self {
            Pass::Analyze => 0.0,
            Pass::Encode => ANALYZE_WEIGHT,
        }
    }

    fn weight(self) -> f64 {
        match self {
            Pass::Analyze => ANALYZE_WEIGHT,
            Pass::Encode => ENCODE_WEIGHT,
        }
    }

    /// Estimated seconds remaining for the whole run.
    ///
    /// During pass 1 the not-yet-started second pass still has to process
    /// the complete input, so its full duration is added; otherwise the ETA
    /// would collapse to near zero right before pass 2 begins. Unknown
    /// speed reports 0 rather than failing.
    fn eta_secs(self, duration_secs: f64, current_secs: f64, speed: f64) -> f64 {
        if speed <= 0.0 {
            return 0.0;
        }
        let remaining = (duration_secs - current_secs).max(0.0) / speed;
        match self {
            Pass::Analyze => remaining + duration_secs / speed,
            Pass::Encode => remaining,
        }
    }

    fn status_line(self, frame: u64, current_secs: f64, speed: f64, size_kb: Option<u64>) -> String {
        let mut line = format!(
            "pass {}: frame {} time {:.1}s speed {:.2}x",
            self.number(),
            frame,
            current_secs,
            speed
        );
        if self == Pass::Encode {
            if let Some(kb) = size_kb {
                line.push_str(&format!(" size {}KiB", kb));
            }
        }
        line
    }
}

/// Inputs for one encode run.
#[derive(Debug, Clone)]
pub struct EncodeRequest {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub target_size_bytes: u64,
}

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeOutcome {
    /// Measured size of the written output file.
    pub output_size: u64,
    /// Video bitrate the run was planned with.
    pub video_bitrate_bps: u64,
}

/// Driver for two-pass target-size encodes.
#[derive(Debug, Clone)]
pub struct TwoPassEncoder {
    ffmpeg_bin: String,
    ffprobe_bin: String,
    audio_bitrate_bps: u64,
}

impl TwoPassEncoder {
    pub fn new(ffmpeg_bin: String, ffprobe_bin: String, audio_bitrate_bps: u64) -> Self {
        Self {
            ffmpeg_bin,
            ffprobe_bin,
            audio_bitrate_bps,
        }
    }

    /// Execute one complete run: probe, plan, pass 1, pass 2, cleanup.
    ///
    /// On failure no guarantee is made about partial output file content;
    /// the caller must not treat it as valid.
    pub async fn run(
        &self,
        req: &EncodeRequest,
        observer: &dyn EncodeObserver,
    ) -> Result<EncodeOutcome, EncodeError> {
        let info = probe_media(&self.ffprobe_bin, &req.input_path).await?;
        let video_bitrate =
            plan_video_bitrate(req.target_size_bytes, info.duration_secs, self.audio_bitrate_bps)?;

        let input_name = req
            .input_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| req.input_path.display().to_string());
        observer.on_log(format!(
            "planned encode: {} ({:.1}s, {} bytes) -> target {} bytes, video {} bps",
            input_name, info.duration_secs, info.size_bytes, req.target_size_bytes, video_bitrate
        ));

        let passlog = passlog_prefix(&req.output_path);

        let pass1 = pass1_command(&self.ffmpeg_bin, &req.input_path, video_bitrate, &passlog);
        self.run_pass(Pass::Analyze, pass1, info.duration_secs, observer)
            .await?;
        observer.on_log("pass 1 (analyze) complete".to_string());
        observer.on_progress(ANALYZE_WEIGHT, 0.0, 0.0);

        let pass2 = pass2_command(
            &self.ffmpeg_bin,
            &req.input_path,
            &req.output_path,
            video_bitrate,
            self.audio_bitrate_bps,
            &passlog,
        );
        self.run_pass(Pass::Encode, pass2, info.duration_secs, observer)
            .await?;

        cleanup_pass_logs(&passlog);

        let output_size = tokio::fs::metadata(&req.output_path).await?.len();
        observer.on_log(format!("encode complete: output {} bytes", output_size));
        observer.on_progress(1.0, 0.0, 0.0);

        Ok(EncodeOutcome {
            output_size,
            video_bitrate_bps: video_bitrate,
        })
    }

    /// Run one ffmpeg pass, feeding its stderr through the progress parser.
    async fn run_pass(
        &self,
        pass: Pass,
        cmd: std::process::Command,
        duration_secs: f64,
        observer: &dyn EncodeObserver,
    ) -> Result<(), EncodeError> {
        let mut child = tokio::process::Command::from(cmd)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        if let Some(stderr) = child.stderr.take() {
            let mut lines = BufReader::new(stderr).lines();
            while let Some(line) = lines.next_line().await? {
                let update = parse_stats_line(&line);
                let Some(current) = update.out_time_secs else {
                    continue;
                };

                let fraction = (current / duration_secs).min(1.0);
                let progress = pass.base() + fraction * pass.weight();
                let speed = update.speed.unwrap_or(0.0);
                let eta = pass.eta_secs(duration_secs, current, speed);
                observer.on_progress(progress, speed, eta);

                if let Some(frame) = update.frame {
                    observer.on_log(pass.status_line(frame, current, speed, update.size_kb));
                }
            }
        }

        let status = child.wait().await?;
        if status.success() {
            Ok(())
        } else {
            match status.code() {
                Some(code) => Err(EncodeError::PassFailed {
                    pass: pass.number(),
                    code,
                }),
                None => Err(EncodeError::PassTerminated {
                    pass: pass.number(),
                }),
            }
        }
    }
}

/// Build the pass-1 (analyze) command: two-pass statistics collection, no
/// audio, output discarded.
pub fn pass1_command(
    ffmpeg_bin: &str,
    input_path: &Path,
    video_bitrate_bps: u64,
    passlog: &Path,
) -> std::process::Command {
    let mut cmd = std::process::Command::new(ffmpeg_bin);
    cmd.arg("-y");
    cmd.arg("-i").arg(input_path);
    cmd.arg("-c:v").arg("libx264");
    cmd.arg("-b:v").arg(video_bitrate_bps.to_string());
    cmd.arg("-pass").arg("1");
    cmd.arg("-passlogfile").arg(passlog);
    cmd.arg("-an");
    cmd.arg("-f").arg("null");
    cmd.arg(NULL_SINK);
    cmd
}

/// Build the pass-2 (encode) command: same bitrate, fixed-rate AAC audio,
/// writing the real output file.
pub fn pass2_command(
    ffmpeg_bin: &str,
    input_path: &Path,
    output_path: &Path,
    video_bitrate_bps: u64,
    audio_bitrate_bps: u64,
    passlog: &Path,
) -> std::process::Command {
    let mut cmd = std::process::Command::new(ffmpeg_bin);
    cmd.arg("-y");
    cmd.arg("-i").arg(input_path);
    cmd.arg("-c:v").arg("libx264");
    cmd.arg("-b:v").arg(video_bitrate_bps.to_string());
    cmd.arg("-pass").arg("2");
    cmd.arg("-passlogfile").arg(passlog);
    cmd.arg("-c:a").arg("aac");
    cmd.arg("-b:a")
        .arg(format!("{}k", audio_bitrate_bps / 1000));
    cmd.arg(output_path);
    cmd
}

/// Per-run pass-log prefix next to the output file. Derived from the output
/// stem so concurrent jobs sharing the directory never clobber each other's
/// analysis logs.
fn passlog_prefix(output_path: &Path) -> PathBuf {
    let stem = output_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "out".to_string());
    let dir = output_path.parent().unwrap_or_else(|| Path::new("."));
    dir.join(format!("ffmpeg2pass_{}", stem))
}

/// Best-effort removal of the intermediate pass-log files ffmpeg derives
/// from the prefix. Failures are swallowed; stale logs never fail a run.
fn cleanup_pass_logs(passlog: &Path) {
    let Some(dir) = passlog.parent() else {
        return;
    };
    let Some(prefix) = passlog.file_name().map(|n| n.to_string_lossy().into_owned()) else {
        return;
    };
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        if entry.file_name().to_string_lossy().starts_with(&prefix) {
            let _ = std::fs::remove_file(entry.path());
        }
    }
}
