//! Processor registry / dispatch.
//!
//! The registry maps each member of the closed type set to its strategy. It
//! is built once during startup and handed to the queue explicitly; there is
//! no process-wide registry state. After construction the map is never
//! mutated, so lookups need no synchronization beyond `Arc`.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use dossier_core::{AnalysisRequest, JobType};

use crate::error::ProcessorError;

use super::{AnalysisProcessor, ProgressFn};

pub struct ProcessorRegistry {
    processors: HashMap<JobType, Arc<dyn AnalysisProcessor>>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self {
            processors: HashMap::new(),
        }
    }

    /// Register a processor for its declared type.
    ///
    /// # Panics
    /// Panics if a processor for this type is already registered: duplicate
    /// registration is a startup configuration bug, not a runtime condition.
    pub fn register(&mut self, processor: Arc<dyn AnalysisProcessor>) {
        let job_type = processor.job_type();
        if self
            .processors
            .insert(job_type, processor)
            .is_some()
        {
            panic!("processor for analysis type {job_type} is already registered");
        }
    }

    pub fn contains(&self, job_type: JobType) -> bool {
        self.processors.contains_key(&job_type)
    }

    pub fn get(&self, job_type: JobType) -> Option<&Arc<dyn AnalysisProcessor>> {
        self.processors.get(&job_type)
    }

    pub fn job_types(&self) -> Vec<JobType> {
        self.processors.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// Dispatch a request to the processor for `job_type`.
    ///
    /// An unregistered type surfaces as [`ProcessorError::UnknownJobType`],
    /// distinct from every transient failure, and is never retried.
    pub async fn process(
        &self,
        job_type: JobType,
        request: &AnalysisRequest,
        progress: ProgressFn<'_>,
    ) -> Result<Value, ProcessorError> {
        let processor = self
            .get(job_type)
            .ok_or(ProcessorError::UnknownJobType(job_type))?;
        tracing::debug!(processor = processor.name(), %job_type, "dispatching analysis");
        processor.process(request, progress).await
    }
}

impl Default for ProcessorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::json;

    use dossier_core::{AccountId, ProfileId};

    use super::*;

    struct StubProcessor {
        job_type: JobType,
    }

    #[async_trait]
    impl AnalysisProcessor for StubProcessor {
        fn job_type(&self) -> JobType {
            self.job_type
        }

        fn name(&self) -> &'static str {
            "StubProcessor"
        }

        async fn process(
            &self,
            _request: &AnalysisRequest,
            progress: ProgressFn<'_>,
        ) -> Result<Value, ProcessorError> {
            progress(100, "complete");
            Ok(json!({"ok": true}))
        }
    }

    fn request() -> AnalysisRequest {
        AnalysisRequest::new(AccountId::new(), ProfileId::new(), "Acme")
    }

    #[test]
    fn register_and_contains() {
        let mut registry = ProcessorRegistry::new();
        assert!(registry.is_empty());

        registry.register(Arc::new(StubProcessor {
            job_type: JobType::Profile,
        }));

        assert!(registry.contains(JobType::Profile));
        assert!(!registry.contains(JobType::Industry));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn duplicate_registration_panics() {
        let mut registry = ProcessorRegistry::new();
        registry.register(Arc::new(StubProcessor {
            job_type: JobType::Profile,
        }));
        registry.register(Arc::new(StubProcessor {
            job_type: JobType::Profile,
        }));
    }

    #[tokio::test]
    async fn dispatch_reaches_the_registered_processor() {
        let mut registry = ProcessorRegistry::new();
        registry.register(Arc::new(StubProcessor {
            job_type: JobType::Industry,
        }));

        let result = registry
            .process(JobType::Industry, &request(), &|_, _| {})
            .await
            .unwrap();
        assert_eq!(result, json!({"ok": true}));
    }

    #[tokio::test]
    async fn unknown_type_is_a_distinct_non_retryable_error() {
        let registry = ProcessorRegistry::new();
        let err = registry
            .process(JobType::Competitors, &request(), &|_, _| {})
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessorError::UnknownJobType(JobType::Competitors)));
        assert!(!err.is_retryable());
    }
}
