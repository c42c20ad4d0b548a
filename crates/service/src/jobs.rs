//! Job records for the compression service.
//!
//! A job tracks one uploaded file through its compression runs. The record
//! is owned by the registry; everything here is plain data plus the small
//! state-transition helpers the orchestrator and status surface use.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Input received and probed, no run started yet.
    Uploaded,
    /// A compression run is executing.
    Compressing,
    /// The last run finished successfully.
    Completed,
    /// The last run failed.
    Error,
}

impl JobStatus {
    /// A new compression run may start in any state except Compressing.
    pub fn can_start_run(self) -> bool {
        !matches!(self, JobStatus::Compressing)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Uploaded => write!(f, "uploaded"),
            JobStatus::Compressing => write!(f, "compressing"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Error => write!(f, "error"),
        }
    }
}

/// One upload and its compression state.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    /// Unique job identifier, assigned at creation.
    pub id: Uuid,
    /// Current status.
    pub status: JobStatus,
    /// Global progress of the active run in [0.0, 1.0].
    pub progress: f64,
    /// Last reported playback-speed multiplier (0 = unknown).
    pub speed: f64,
    /// Last reported estimate of seconds remaining (0 = unknown).
    pub eta: f64,
    /// Diagnostic log lines produced during the active run.
    pub logs: Vec<String>,
    /// Count of log entries already delivered to the polling client.
    pub cursor: usize,
    /// Path of the uploaded input file.
    pub input_path: PathBuf,
    /// Path of the compressed output, set when a run starts.
    pub output_path: Option<PathBuf>,
    /// Original filename as uploaded (sanitized).
    pub original_filename: String,
    /// Download filename for the output, set when a run starts.
    pub output_filename: Option<String>,
    /// Input file size in bytes, from probing.
    pub original_size: u64,
    /// Output file size in bytes, set on completion.
    pub output_size: Option<u64>,
    /// Input duration in seconds, from probing.
    pub duration: f64,
    /// Failure description, set only when status is Error.
    pub error_message: Option<String>,
}

impl Job {
    /// Create a job in Uploaded status.
    pub fn new(
        id: Uuid,
        input_path: PathBuf,
        original_filename: String,
        original_size: u64,
        duration: f64,
    ) -> Self {
        Self {
            id,
            status: JobStatus::Uploaded,
            progress: 0.0,
            speed: 0.0,
            eta: 0.0,
            logs: Vec::new(),
            cursor: 0,
            input_path,
            output_path: None,
            original_filename,
            output_filename: None,
            original_size,
            output_size: None,
            duration,
            error_message: None,
        }
    }

    /// Transition into Compressing and reset all per-run state.
    pub fn begin_run(&mut self, output_path: PathBuf, output_filename: String) {
        self.status = JobStatus::Compressing;
        self.progress = 0.0;
        self.speed = 0.0;
        self.eta = 0.0;
        self.logs.clear();
        self.cursor = 0;
        self.output_path = Some(output_path);
        self.output_filename = Some(output_filename);
        self.output_size = None;
        self.error_message = None;
    }

    /// Record a progress update from the run.
    ///
    /// Progress is clamped non-decreasing within a run; speed and eta are
    /// best-effort and carry no such guarantee.
    pub fn record_progress(&mut self, progress: f64, speed: f64, eta: f64) {
        self.progress = progress.max(self.progress);
        self.speed = speed;
        self.eta = eta;
    }

    /// Append a diagnostic log line.
    pub fn push_log(&mut self, message: String) {
        self.logs.push(message);
    }

    /// Mark the run completed with the measured output size.
    pub fn complete(&mut self, output_size: u64) {
        self.status = JobStatus::Completed;
        self.progress = 1.0;
        self.speed = 0.0;
        self.eta = 0.0;
        self.output_size = Some(output_size);
    }

    /// Mark the run failed. Progress keeps its last reported value so the
    /// client can see how far the run got.
    pub fn fail(&mut self, message: String) {
        self.status = JobStatus::Error;
        self.speed = 0.0;
        self.eta = 0.0;
        self.error_message = Some(message);
    }

    /// Build the polling status report and advance the log cursor.
    ///
    /// Each log entry is delivered exactly once across sequential polls.
    pub fn take_status(&mut self) -> StatusReport {
        let logs = self.logs[self.cursor..].to_vec();
        self.cursor = self.logs.len();

        StatusReport {
            status: self.status,
            progress: self.progress,
            speed: self.speed,
            eta: self.eta,
            logs,
            output_size: match self.status {
                JobStatus::Completed => self.output_size,
                _ => None,
            },
            error: match self.status {
                JobStatus::Error => self.error_message.clone(),
                _ => None,
            },
        }
    }
}

/// Snapshot returned to the polling client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusReport {
    pub status: JobStatus,
    pub progress: f64,
    pub speed: f64,
    pub eta: f64,
    /// Log entries not yet delivered; omitted when empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub logs: Vec<String>,
    /// Present only when status is Completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_size: Option<u64>,
    /// Present only when status is Error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
