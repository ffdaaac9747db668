//! `dossier-infra` — queue infrastructure and concrete collaborators.
//!
//! Hosts the job queue (store abstraction, worker pool, retry/timeout
//! arbitration, cleanup sweep), the in-memory record store, and the HTTP
//! enrichment-provider client.

pub mod jobs;
pub mod memory;
pub mod provider_http;

pub use jobs::{
    AnalysisJob, InMemoryJobStore, JobQueue, JobSnapshot, JobState, JobStore, JobStoreError,
    QueueConfig, QueueHandle, QueueStats, RetryPolicy, SubmitError,
};
pub use memory::InMemoryRecordStore;
pub use provider_http::HttpEnrichmentProvider;

#[cfg(test)]
mod integration_tests;
