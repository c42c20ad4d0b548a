//! Job orchestrator.
//!
//! Bridges the HTTP surface and the encode driver: atomically transitions a
//! job into Compressing, runs the two-pass encode on a background task
//! bounded by a semaphore, and propagates terminal status back into the
//! registry. Observer callbacks write through the registry so a job deleted
//! mid-run simply stops receiving updates.

use crate::encode::{EncodeObserver, EncodeRequest, TwoPassEncoder};
use crate::jobs::Job;
use crate::registry::{JobRegistry, RegistryError};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use uuid::Uuid;

/// Error type for orchestrator operations.
#[derive(Debug, Error, PartialEq)]
pub enum OrchestratorError {
    /// The job id is unknown.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A run is already executing for this job.
    #[error("job is already compressing")]
    AlreadyCompressing,

    /// The requested target size is not positive.
    #[error("target size must be positive")]
    InvalidTargetSize,
}

/// Resolve the concurrent-run limit: an explicit non-zero configured value
/// wins, otherwise derive from the logical core count.
pub fn derive_max_concurrent_jobs(configured: u32) -> usize {
    if configured > 0 {
        configured as usize
    } else {
        derive_from_cores(num_cpus::get())
    }
}

/// Each ffmpeg run is itself multithreaded, so the job-level limit stays
/// small: 4 runs for 16+ cores, 2 otherwise.
fn derive_from_cores(cores: usize) -> usize {
    if cores >= 16 {
        4
    } else {
        2
    }
}

/// Starts and supervises compression runs against the shared registry.
pub struct Orchestrator {
    registry: Arc<JobRegistry>,
    encoder: TwoPassEncoder,
    output_dir: PathBuf,
    semaphore: Arc<Semaphore>,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<JobRegistry>,
        encoder: TwoPassEncoder,
        output_dir: PathBuf,
        max_concurrent_jobs: usize,
    ) -> Self {
        Self {
            registry,
            encoder,
            output_dir,
            semaphore: Arc::new(Semaphore::new(max_concurrent_jobs)),
        }
    }

    /// Number of run slots currently free.
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Start a compression run for the job.
    ///
    /// The check of the current status and the transition into Compressing
    /// happen under the job's lock, so two concurrent starts for the same
    /// job cannot both succeed. Returns as soon as the background task is
    /// spawned; the run itself waits for a semaphore permit.
    pub fn start_compression(
        &self,
        id: Uuid,
        target_size_bytes: u64,
    ) -> Result<(), OrchestratorError> {
        if target_size_bytes == 0 {
            return Err(OrchestratorError::InvalidTargetSize);
        }

        let output_dir = self.output_dir.clone();
        let request = self.registry.mutate(id, |job| {
            if !job.status.can_start_run() {
                return Err(OrchestratorError::AlreadyCompressing);
            }
            let output_filename = format!("compressed_{}", job.original_filename);
            let output_path = output_dir.join(format!("{}_{}", id, output_filename));
            let request = EncodeRequest {
                input_path: job.input_path.clone(),
                output_path: output_path.clone(),
                target_size_bytes,
            };
            job.begin_run(output_path, output_filename);
            Ok(request)
        })??;

        let registry = Arc::clone(&self.registry);
        let encoder = self.encoder.clone();
        let semaphore = Arc::clone(&self.semaphore);
        tokio::spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .expect("semaphore should not be closed");

            let observer = RegistryObserver {
                registry: Arc::clone(&registry),
                id,
            };

            match encoder.run(&request, &observer).await {
                Ok(outcome) => {
                    tracing::info!(
                        job = %id,
                        output_size = outcome.output_size,
                        video_bitrate_bps = outcome.video_bitrate_bps,
                        "compression completed"
                    );
                    let _ = registry.mutate(id, |job| job.complete(outcome.output_size));
                }
                Err(err) => {
                    tracing::warn!(job = %id, error = %err, "compression failed");
                    let message = err.to_string();
                    let _ = registry.mutate(id, |job| {
                        job.push_log(message.clone());
                        job.fail(message);
                    });
                }
            }
        });

        Ok(())
    }

    /// Remove the job and best-effort delete its file artifacts.
    pub fn cleanup(&self, id: Uuid) -> Result<Job, OrchestratorError> {
        let job = self.registry.remove(id)?;
        let _ = std::fs::remove_file(&job.input_path);
        if let Some(output_path) = &job.output_path {
            let _ = std::fs::remove_file(output_path);
        }
        Ok(job)
    }
}

/// Observer that forwards encode events into the registry. Mutations on a
/// removed job return NotFound, which is deliberately ignored.
struct RegistryObserver {
    registry: Arc<JobRegistry>,
    id: Uuid,
}

impl EncodeObserver for RegistryObserver {
    fn on_progress(&self, progress: f64, speed: f64, eta_secs: f64) {
        let _ = self
            .registry
            .mutate(self.id, |job| job.record_progress(progress, speed, eta_secs));
    }

    fn on_log(&self, message: String) {
        let _ = self.registry.mutate(self.id, |job| job.push_log(message));
    }
}
