//! Job storage implementations.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::Utc;

use dossier_core::JobId;

use super::types::{AnalysisJob, JobState};

/// Durable job store abstraction.
///
/// `claim_next` is the queue's only cross-worker synchronization point: a job
/// is handed to exactly one caller, which owns its state transitions until it
/// writes them back with `update`.
pub trait JobStore: Send + Sync {
    /// Enqueue a new job.
    fn enqueue(&self, job: AnalysisJob) -> Result<JobId, JobStoreError>;

    /// Get a job by ID.
    fn get(&self, job_id: JobId) -> Result<Option<AnalysisJob>, JobStoreError>;

    /// Write back a job owned by the caller.
    fn update(&self, job: &AnalysisJob) -> Result<(), JobStoreError>;

    /// Atomically claim the oldest ready queued job, marking it active.
    /// Returns None if no jobs are claimable.
    fn claim_next(&self) -> Result<Option<AnalysisJob>, JobStoreError>;

    /// Remove terminal jobs past their retention window; completed and
    /// failed jobs age out independently. Returns how many were removed.
    fn sweep(
        &self,
        completed_retention: Duration,
        failed_retention: Duration,
    ) -> Result<usize, JobStoreError>;

    /// Get job counts per state.
    fn stats(&self) -> Result<JobStats, JobStoreError>;
}

/// Job store error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum JobStoreError {
    #[error("job not found: {0}")]
    NotFound(JobId),
    #[error("job already exists: {0}")]
    AlreadyExists(JobId),
    #[error("storage error: {0}")]
    Storage(String),
}

/// Job statistics.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct JobStats {
    pub queued: usize,
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
}

/// In-memory job store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<JobId, AnalysisJob>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl JobStore for InMemoryJobStore {
    fn enqueue(&self, job: AnalysisJob) -> Result<JobId, JobStoreError> {
        let mut jobs = self.jobs.write().unwrap();
        if jobs.contains_key(&job.id) {
            return Err(JobStoreError::AlreadyExists(job.id));
        }
        let id = job.id;
        jobs.insert(id, job);
        Ok(id)
    }

    fn get(&self, job_id: JobId) -> Result<Option<AnalysisJob>, JobStoreError> {
        Ok(self.jobs.read().unwrap().get(&job_id).cloned())
    }

    fn update(&self, job: &AnalysisJob) -> Result<(), JobStoreError> {
        let mut jobs = self.jobs.write().unwrap();
        if !jobs.contains_key(&job.id) {
            return Err(JobStoreError::NotFound(job.id));
        }
        jobs.insert(job.id, job.clone());
        Ok(())
    }

    fn claim_next(&self) -> Result<Option<AnalysisJob>, JobStoreError> {
        let mut jobs = self.jobs.write().unwrap();

        // Oldest ready queued job wins (FIFO by creation time).
        let next = jobs
            .values()
            .filter(|j| j.state == JobState::Queued && j.is_ready())
            .min_by_key(|j| (j.created_at, j.id))
            .map(|j| j.id);

        if let Some(job_id) = next {
            if let Some(job) = jobs.get_mut(&job_id) {
                job.mark_active();
                return Ok(Some(job.clone()));
            }
        }

        Ok(None)
    }

    fn sweep(
        &self,
        completed_retention: Duration,
        failed_retention: Duration,
    ) -> Result<usize, JobStoreError> {
        let now = Utc::now();
        let completed_cutoff =
            now - chrono::Duration::from_std(completed_retention).unwrap_or_default();
        let failed_cutoff = now - chrono::Duration::from_std(failed_retention).unwrap_or_default();

        let mut jobs = self.jobs.write().unwrap();
        let before = jobs.len();
        jobs.retain(|_, job| match job.state {
            JobState::Completed => job.updated_at > completed_cutoff,
            JobState::Failed => job.updated_at > failed_cutoff,
            JobState::Queued | JobState::Active => true,
        });
        Ok(before - jobs.len())
    }

    fn stats(&self) -> Result<JobStats, JobStoreError> {
        let jobs = self.jobs.read().unwrap();
        let mut stats = JobStats::default();
        for job in jobs.values() {
            match job.state {
                JobState::Queued => stats.queued += 1,
                JobState::Active => stats.active += 1,
                JobState::Completed => stats.completed += 1,
                JobState::Failed => stats.failed += 1,
            }
        }
        Ok(stats)
    }
}

impl<S: JobStore + ?Sized> JobStore for Arc<S> {
    fn enqueue(&self, job: AnalysisJob) -> Result<JobId, JobStoreError> {
        (**self).enqueue(job)
    }

    fn get(&self, job_id: JobId) -> Result<Option<AnalysisJob>, JobStoreError> {
        (**self).get(job_id)
    }

    fn update(&self, job: &AnalysisJob) -> Result<(), JobStoreError> {
        (**self).update(job)
    }

    fn claim_next(&self) -> Result<Option<AnalysisJob>, JobStoreError> {
        (**self).claim_next()
    }

    fn sweep(
        &self,
        completed_retention: Duration,
        failed_retention: Duration,
    ) -> Result<usize, JobStoreError> {
        (**self).sweep(completed_retention, failed_retention)
    }

    fn stats(&self) -> Result<JobStats, JobStoreError> {
        (**self).stats()
    }
}
