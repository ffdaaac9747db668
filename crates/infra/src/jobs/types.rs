//! Core job record and retry policy.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use dossier_core::{AnalysisRequest, JobId, JobType};

/// Job execution state.
///
/// `Queued → Active` on claim; `Active → Queued` only via the retry path;
/// `Completed` and `Failed` are terminal and never regress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Waiting to be claimed (including waiting out a retry backoff).
    Queued,
    /// Claimed and executing on exactly one worker.
    Active,
    /// Finished successfully; `result` is set.
    Completed,
    /// Attempts exhausted or failed fast; `error` is set.
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

/// Retry policy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts (not retries: 3 means try three times).
    pub max_attempts: u32,
    /// Base delay before the first retry; doubles each attempt.
    pub base_delay: Duration,
    /// Cap on the computed delay.
    pub max_delay: Duration,
    /// Jitter factor (0.0-1.0) to add spread between competing retries.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(60),
            jitter: 0.1,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Create an exponential policy without jitter.
    pub fn exponential(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
            jitter: 0.0,
        }
    }

    /// Calculate the backoff delay after a given attempt number (1-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base_ms = self.base_delay.as_millis() as f64;
        let max_ms = self.max_delay.as_millis() as f64;
        let exp = 2_f64.powi((attempt - 1).min(16) as i32);
        let delay_ms = (base_ms * exp).min(max_ms);

        // Deterministic "jitter" derived from the attempt number; no RNG so
        // the schedule stays reproducible.
        let jitter_range = delay_ms * self.jitter;
        let jitter = if jitter_range > 0.0 {
            let pseudo_random = ((attempt as f64 * 17.0) % 100.0) / 100.0;
            jitter_range * (pseudo_random - 0.5) * 2.0
        } else {
            0.0
        };

        Duration::from_millis((delay_ms + jitter).max(0.0) as u64)
    }

    /// Check whether another attempt is allowed after `attempt` attempts.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

/// Record of a single execution attempt, retained for diagnosis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobAttemptRecord {
    pub attempt: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub success: bool,
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// A queued analysis job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisJob {
    /// Unique, immutable job id.
    pub id: JobId,
    pub job_type: JobType,
    /// The caller's request, echoed back in status responses.
    pub request: AnalysisRequest,
    pub state: JobState,
    /// High-water progress in [0, 100]; never decreases for one job id.
    pub progress: u8,
    pub progress_message: Option<String>,
    pub retry_policy: RetryPolicy,
    /// Attempts started so far.
    pub attempt: u32,
    /// Terminal success payload.
    pub result: Option<serde_json::Value>,
    /// Terminal failure message (message text only, never internals).
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// When the job becomes claimable again (retry backoff).
    pub scheduled_at: Option<DateTime<Utc>>,
    /// Errors from previous attempts.
    pub history: Vec<JobAttemptRecord>,
}

impl AnalysisJob {
    pub fn new(job_type: JobType, request: AnalysisRequest) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            job_type,
            request,
            state: JobState::Queued,
            progress: 0,
            progress_message: None,
            retry_policy: RetryPolicy::default(),
            attempt: 0,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
            scheduled_at: None,
            history: Vec::new(),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Check whether the job may be claimed now (backoff elapsed).
    pub fn is_ready(&self) -> bool {
        match self.scheduled_at {
            Some(at) => Utc::now() >= at,
            None => true,
        }
    }

    /// Mark the job claimed by a worker; starts a new attempt.
    pub fn mark_active(&mut self) {
        self.state = JobState::Active;
        self.attempt += 1;
        self.scheduled_at = None;
        self.updated_at = Utc::now();
    }

    /// Record a progress report, clamped non-decreasing.
    pub fn record_progress(&mut self, percent: u8, message: &str) {
        self.progress = self.progress.max(percent.min(100));
        self.progress_message = Some(message.to_string());
        self.updated_at = Utc::now();
    }

    /// Mark the job completed with its result payload.
    pub fn mark_completed(&mut self, result: serde_json::Value, started_at: DateTime<Utc>) {
        let now = Utc::now();
        self.state = JobState::Completed;
        self.progress = 100;
        self.progress_message = None;
        self.result = Some(result);
        self.error = None;
        self.updated_at = now;
        self.history.push(JobAttemptRecord {
            attempt: self.attempt,
            started_at,
            finished_at: now,
            success: true,
            error: None,
            duration_ms: (now - started_at).num_milliseconds().max(0) as u64,
        });
    }

    /// Record a failed attempt; reschedules with backoff while attempts
    /// remain, otherwise the job goes terminal with the last error message.
    pub fn mark_failed(&mut self, error: String, started_at: DateTime<Utc>) {
        let now = Utc::now();
        self.updated_at = now;
        self.history.push(JobAttemptRecord {
            attempt: self.attempt,
            started_at,
            finished_at: now,
            success: false,
            error: Some(error.clone()),
            duration_ms: (now - started_at).num_milliseconds().max(0) as u64,
        });

        if self.retry_policy.should_retry(self.attempt) {
            let delay = self.retry_policy.delay_for_attempt(self.attempt);
            self.scheduled_at =
                Some(now + chrono::Duration::from_std(delay).unwrap_or_default());
            self.state = JobState::Queued;
        } else {
            self.state = JobState::Failed;
            self.error = Some(error);
        }
    }

    /// Fail immediately without consulting the retry policy.
    ///
    /// Used for dispatch/validation errors, which signal misconfiguration
    /// rather than a transient condition.
    pub fn fail_fast(&mut self, error: String, started_at: DateTime<Utc>) {
        let now = Utc::now();
        self.updated_at = now;
        self.history.push(JobAttemptRecord {
            attempt: self.attempt,
            started_at,
            finished_at: now,
            success: false,
            error: Some(error.clone()),
            duration_ms: (now - started_at).num_milliseconds().max(0) as u64,
        });
        self.state = JobState::Failed;
        self.error = Some(error);
    }

    /// Point-in-time view for status queries.
    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            id: self.id,
            job_type: self.job_type,
            state: self.state,
            progress: self.progress,
            progress_message: self.progress_message.clone(),
            request: self.request.clone(),
            result: self.result.clone(),
            error: self.error.clone(),
            attempt: self.attempt,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// What a status query returns: current state, progress, the echoed request,
/// and the terminal result or error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub id: JobId,
    pub job_type: JobType,
    pub state: JobState,
    pub progress: u8,
    pub progress_message: Option<String>,
    pub request: AnalysisRequest,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub attempt: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
