//! Processor error taxonomy.

use thiserror::Error;

use dossier_core::JobType;

use crate::provider::ProviderError;
use crate::store::StoreError;

/// Everything that can go wrong inside processor dispatch and execution.
///
/// The queue uses [`is_retryable`](ProcessorError::is_retryable) as its sole
/// retry-vs-fail signal: dependency failures consume an attempt and
/// reschedule, while dispatch and validation errors surface immediately
/// since they signal misconfiguration, not transient conditions.
#[derive(Debug, Error)]
pub enum ProcessorError {
    /// No processor registered for the job's type. Fail-fast, never retried.
    #[error("no processor registered for analysis type: {0}")]
    UnknownJobType(JobType),

    /// The request itself is unusable. Never retried.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The enrichment provider failed outright.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Too little structure could be salvaged from the provider's text.
    #[error("response recovery failed: {0}")]
    Recovery(String),

    /// The record store rejected a read or write.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ProcessorError {
    pub fn is_retryable(&self) -> bool {
        match self {
            ProcessorError::Provider(_)
            | ProcessorError::Recovery(_)
            | ProcessorError::Store(_) => true,
            ProcessorError::UnknownJobType(_) | ProcessorError::InvalidRequest(_) => false,
        }
    }
}
