//! Queue orchestration: submission, worker pool, retry arbitration, cleanup.
//!
//! The queue is the sole arbiter of retry-vs-fail and the sole translator of
//! processor errors into observer-facing failure messages. Processors report
//! progress through a callback; the queue persists each report and fans it
//! out on the notification hub, clamped so one job id never shows a
//! percentage decrease, even across retried attempts.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;

use dossier_analysis::ProcessorRegistry;
use dossier_core::{AnalysisRequest, DomainError, JobId, JobType};
use dossier_events::{JobEvent, JobEventHub};

use super::store::{JobStore, JobStoreError};
use super::types::{AnalysisJob, JobSnapshot, RetryPolicy};

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Number of concurrent workers pulling from the store.
    pub workers: usize,
    /// How often an idle worker polls for new jobs.
    pub poll_interval: Duration,
    /// Retry policy stamped onto every submitted job.
    pub retry_policy: RetryPolicy,
    /// When set, overrides the per-type timeout tiers (tests, constrained
    /// deployments).
    pub attempt_timeout: Option<Duration>,
    /// How often the cleanup sweep runs.
    pub cleanup_interval: Duration,
    /// How long completed jobs are kept after their terminal transition.
    pub completed_retention: Duration,
    /// How long failed jobs are kept; longer by default, for diagnosis.
    pub failed_retention: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            poll_interval: Duration::from_millis(100),
            retry_policy: RetryPolicy::default(),
            attempt_timeout: None,
            cleanup_interval: Duration::from_secs(3600),
            completed_retention: Duration::from_secs(3600),
            failed_retention: Duration::from_secs(24 * 3600),
        }
    }
}

impl QueueConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn with_attempt_timeout(mut self, attempt_timeout: Duration) -> Self {
        self.attempt_timeout = Some(attempt_timeout);
        self
    }

    pub fn with_retention(mut self, completed: Duration, failed: Duration) -> Self {
        self.completed_retention = completed;
        self.failed_retention = failed;
        self
    }
}

/// Synchronous submission failure; no job is created for any of these.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Validation(#[from] DomainError),
    #[error("no processor registered for analysis type: {0}")]
    UnknownJobType(JobType),
    #[error(transparent)]
    Store(#[from] JobStoreError),
}

/// Queue runtime statistics.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct QueueStats {
    pub attempts_run: u64,
    pub jobs_succeeded: u64,
    pub jobs_failed: u64,
    pub attempts_retried: u64,
    pub jobs_swept: u64,
}

/// The analysis job queue.
///
/// Built once at startup from an explicit registry and hub; shared as
/// `Arc<JobQueue<_>>` between the API surface and its workers.
pub struct JobQueue<S: JobStore> {
    store: S,
    registry: Arc<ProcessorRegistry>,
    hub: Arc<JobEventHub>,
    config: QueueConfig,
    stats: Mutex<QueueStats>,
}

impl<S: JobStore + 'static> JobQueue<S> {
    pub fn new(
        store: S,
        registry: Arc<ProcessorRegistry>,
        hub: Arc<JobEventHub>,
        config: QueueConfig,
    ) -> Self {
        Self {
            store,
            registry,
            hub,
            config,
            stats: Mutex::new(QueueStats::default()),
        }
    }

    pub fn hub(&self) -> &Arc<JobEventHub> {
        &self.hub
    }

    pub fn stats(&self) -> QueueStats {
        self.stats.lock().unwrap().clone()
    }

    /// Accept a submission: validate, enqueue, announce. Returns immediately;
    /// execution happens out of band on the worker pool.
    pub fn submit(
        &self,
        job_type: JobType,
        request: AnalysisRequest,
    ) -> Result<JobId, SubmitError> {
        request.validate()?;
        if !self.registry.contains(job_type) {
            return Err(SubmitError::UnknownJobType(job_type));
        }

        let job = AnalysisJob::new(job_type, request)
            .with_retry_policy(self.config.retry_policy.clone());
        let job_id = self.store.enqueue(job)?;

        tracing::info!(%job_id, %job_type, "analysis job submitted");
        self.hub.publish(job_id, JobEvent::Queued);
        Ok(job_id)
    }

    /// Current snapshot of a job, or None when unknown (or already swept).
    pub fn status(&self, job_id: JobId) -> Result<Option<JobSnapshot>, JobStoreError> {
        Ok(self.store.get(job_id)?.map(|job| job.snapshot()))
    }

    /// Run one cleanup sweep now.
    pub fn run_cleanup(&self) -> Result<usize, JobStoreError> {
        let removed = self.store.sweep(
            self.config.completed_retention,
            self.config.failed_retention,
        )?;
        if removed > 0 {
            tracing::info!(removed, "swept terminal analysis jobs");
            self.stats.lock().unwrap().jobs_swept += removed as u64;
        }
        Ok(removed)
    }

    /// Spawn the worker pool and the cleanup task.
    pub fn start(self: &Arc<Self>) -> QueueHandle {
        let shutdown = Arc::new(AtomicBool::new(false));
        let mut tasks = Vec::with_capacity(self.config.workers + 1);

        for worker in 0..self.config.workers {
            let queue = Arc::clone(self);
            let flag = Arc::clone(&shutdown);
            tasks.push(tokio::spawn(async move {
                queue.worker_loop(worker, flag).await;
            }));
        }

        let queue = Arc::clone(self);
        let flag = Arc::clone(&shutdown);
        tasks.push(tokio::spawn(async move {
            queue.cleanup_loop(flag).await;
        }));

        QueueHandle { shutdown, tasks }
    }

    async fn worker_loop(&self, worker: usize, shutdown: Arc<AtomicBool>) {
        tracing::info!(worker, "analysis worker started");

        while !shutdown.load(Ordering::Relaxed) {
            match self.store.claim_next() {
                Ok(Some(job)) => self.run_attempt(job).await,
                Ok(None) => tokio::time::sleep(self.config.poll_interval).await,
                Err(e) => {
                    tracing::error!(worker, error = %e, "failed to claim job");
                    tokio::time::sleep(self.config.poll_interval).await;
                }
            }
        }

        tracing::info!(worker, "analysis worker stopped");
    }

    async fn cleanup_loop(&self, shutdown: Arc<AtomicBool>) {
        let tick = Duration::from_millis(500).min(self.config.cleanup_interval);
        let mut since_sweep = Duration::ZERO;

        while !shutdown.load(Ordering::Relaxed) {
            tokio::time::sleep(tick).await;
            since_sweep += tick;
            if since_sweep >= self.config.cleanup_interval {
                since_sweep = Duration::ZERO;
                if let Err(e) = self.run_cleanup() {
                    tracing::error!(error = %e, "cleanup sweep failed");
                }
            }
        }
    }

    /// Execute one attempt of a claimed job and arbitrate its outcome.
    async fn run_attempt(&self, mut job: AnalysisJob) {
        let job_id = job.id;
        let started = Utc::now();
        let config = job.job_type.config();
        let deadline = self
            .config
            .attempt_timeout
            .unwrap_or_else(|| config.timeout_for(job.request.extended));

        tracing::debug!(
            %job_id,
            job_type = %job.job_type,
            attempt = job.attempt,
            timeout_secs = deadline.as_secs(),
            "running analysis attempt"
        );

        // High-water progress across attempts; reports below it are clamped
        // so observers never see a decrease for this job id.
        let high_water = AtomicU8::new(job.progress);
        let on_progress = |percent: u8, message: &str| {
            let clamped = high_water
                .load(Ordering::SeqCst)
                .max(percent.min(100));
            high_water.store(clamped, Ordering::SeqCst);

            if let Ok(Some(mut current)) = self.store.get(job_id) {
                current.record_progress(clamped, message);
                let _ = self.store.update(&current);
            }
            self.hub.publish(
                job_id,
                JobEvent::Progress {
                    percent: clamped,
                    message: message.to_string(),
                },
            );
        };

        let outcome = tokio::time::timeout(
            deadline,
            self.registry
                .process(job.job_type, &job.request, &on_progress),
        )
        .await;

        job.progress = job.progress.max(high_water.load(Ordering::SeqCst));
        self.stats.lock().unwrap().attempts_run += 1;

        match outcome {
            Ok(Ok(result)) => {
                job.mark_completed(result.clone(), started);
                if let Err(e) = self.store.update(&job) {
                    tracing::error!(%job_id, error = %e, "failed to persist completion");
                }
                self.stats.lock().unwrap().jobs_succeeded += 1;
                tracing::info!(%job_id, attempt = job.attempt, "analysis job completed");
                self.hub.publish(job_id, JobEvent::Completed { result });
            }
            Ok(Err(error)) if !error.is_retryable() => {
                let message = error.to_string();
                job.fail_fast(message.clone(), started);
                if let Err(e) = self.store.update(&job) {
                    tracing::error!(%job_id, error = %e, "failed to persist failure");
                }
                self.stats.lock().unwrap().jobs_failed += 1;
                tracing::warn!(%job_id, error = %message, "analysis job failed fast");
                self.hub.publish(job_id, JobEvent::Failed { error: message });
            }
            Ok(Err(error)) => {
                self.finish_transient_failure(job, error.to_string(), started);
            }
            Err(_elapsed) => {
                let message = format!("analysis timed out after {}s", deadline.as_secs());
                self.finish_transient_failure(job, message, started);
            }
        }
    }

    /// A transient failure consumes the attempt: reschedule with backoff
    /// while attempts remain, otherwise go terminal with the last message.
    fn finish_transient_failure(
        &self,
        mut job: AnalysisJob,
        message: String,
        started: chrono::DateTime<Utc>,
    ) {
        let job_id = job.id;
        job.mark_failed(message.clone(), started);
        if let Err(e) = self.store.update(&job) {
            tracing::error!(%job_id, error = %e, "failed to persist attempt failure");
        }

        if job.state.is_terminal() {
            self.stats.lock().unwrap().jobs_failed += 1;
            tracing::warn!(
                %job_id,
                attempts = job.attempt,
                error = %message,
                "analysis job failed, attempts exhausted"
            );
            self.hub.publish(job_id, JobEvent::Failed { error: message });
        } else {
            self.stats.lock().unwrap().attempts_retried += 1;
            tracing::debug!(
                %job_id,
                attempt = job.attempt,
                error = %message,
                "analysis attempt failed, rescheduled with backoff"
            );
        }
    }
}

/// Handle to a running queue: owns the shutdown flag and the spawned tasks.
pub struct QueueHandle {
    shutdown: Arc<AtomicBool>,
    tasks: Vec<tokio::task::JoinHandle<()>>,
}

impl QueueHandle {
    /// Request graceful shutdown and wait for every task to stop.
    ///
    /// In-flight attempts finish first; queued jobs stay in the store.
    pub async fn shutdown(self) {
        self.shutdown.store(true, Ordering::Relaxed);
        for task in self.tasks {
            let _ = task.await;
        }
    }
}
