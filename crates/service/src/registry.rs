//! Concurrency-safe job registry.
//!
//! Jobs live in a map of individually locked records: the map-level lock is
//! held only to look an entry up or to insert/remove one, so concurrent
//! operations on different jobs never contend, while reads and mutations of
//! the same job serialize on that job's own lock.
//!
//! No critical section contains an await, so plain std sync primitives are
//! used; callbacks from the encode driver can mutate jobs without being
//! async themselves.

use crate::jobs::{Job, StatusReport};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use thiserror::Error;
use uuid::Uuid;

/// Error type for registry operations.
#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    /// The id is unknown to the registry.
    #[error("job not found: {0}")]
    NotFound(Uuid),
}

/// Concurrency-safe store of job records.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<Uuid, Arc<Mutex<Job>>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a job in Uploaded status and return its id.
    pub fn create(
        &self,
        input_path: PathBuf,
        original_filename: String,
        original_size: u64,
        duration: f64,
    ) -> Uuid {
        let id = Uuid::new_v4();
        let job = Job::new(id, input_path, original_filename, original_size, duration);
        let mut jobs = self
            .jobs
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        jobs.insert(id, Arc::new(Mutex::new(job)));
        id
    }

    /// Return a point-in-time copy of the job record.
    pub fn get(&self, id: Uuid) -> Result<Job, RegistryError> {
        let entry = self.entry(id)?;
        let job = lock_job(&entry);
        Ok(job.clone())
    }

    /// Apply an atomic read-modify-write under the job's exclusive lock.
    pub fn mutate<T>(&self, id: Uuid, f: impl FnOnce(&mut Job) -> T) -> Result<T, RegistryError> {
        let entry = self.entry(id)?;
        let mut job = lock_job(&entry);
        Ok(f(&mut job))
    }

    /// Remove the job record, returning its final state so the caller can
    /// release the associated file artifacts.
    pub fn remove(&self, id: Uuid) -> Result<Job, RegistryError> {
        let entry = {
            let mut jobs = self
                .jobs
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            jobs.remove(&id).ok_or(RegistryError::NotFound(id))?
        };
        // A background run may still hold a clone of the Arc; take a copy of
        // the record either way.
        let job = lock_job(&entry);
        Ok(job.clone())
    }

    /// Build the polling status report, advancing the job's log cursor as a
    /// side effect of the read.
    pub fn poll_status(&self, id: Uuid) -> Result<StatusReport, RegistryError> {
        self.mutate(id, |job| job.take_status())
    }

    /// Number of live jobs.
    pub fn len(&self) -> usize {
        self.jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entry(&self, id: Uuid) -> Result<Arc<Mutex<Job>>, RegistryError> {
        let jobs = self.jobs.read().unwrap_or_else(PoisonError::into_inner);
        jobs.get(&id).cloned().ok_or(RegistryError::NotFound(id))
    }
}

/// Lock one job record, recovering the data if a previous holder panicked.
fn lock_job(entry: &Arc<Mutex<Job>>) -> MutexGuard<'_, Job> {
    entry.lock().unwrap_or_else(PoisonError::into_inner)
}
