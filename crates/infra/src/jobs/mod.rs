//! Durable, retrying, timeout-bound job queue.
//!
//! Submission is non-blocking: `submit` validates, enqueues, and returns a
//! job id. Workers pull claimed jobs out of band, dispatch them through the
//! processor registry, and arbitrate retry-vs-fail; every progress report and
//! terminal transition fans out on the notification hub.

pub mod queue;
pub mod store;
pub mod types;

pub use queue::{JobQueue, QueueConfig, QueueHandle, QueueStats, SubmitError};
pub use store::{InMemoryJobStore, JobStats, JobStore, JobStoreError};
pub use types::{AnalysisJob, JobAttemptRecord, JobSnapshot, JobState, RetryPolicy};
