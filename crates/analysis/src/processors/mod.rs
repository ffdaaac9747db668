//! Type-specific analysis strategies.
//!
//! One processor per [`JobType`]. Every strategy follows the same skeleton
//! (short-circuit on an existing record, build an instruction, query the
//! provider, salvage fields, persist, report checkpoints along the way) but
//! each owns its instruction, expected-field list, minimum requirements, and
//! persistence shape.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use dossier_core::{AnalysisRequest, JobType, JobTypeConfig};

use crate::error::ProcessorError;
use crate::recovery::RecoveredFields;

pub mod competitors;
pub mod industry;
pub mod profile;
pub mod registry;

pub use competitors::CompetitorsProcessor;
pub use industry::IndustryProcessor;
pub use profile::ProfileProcessor;
pub use registry::ProcessorRegistry;

use crate::provider::EnrichmentProvider;
use crate::store::RecordStore;

/// Progress sink handed to a processor for one invocation.
///
/// May be invoked zero or more times; percentages are non-decreasing across
/// calls within one invocation.
pub type ProgressFn<'a> = &'a (dyn Fn(u8, &str) + Send + Sync);

/// A strategy that executes one analysis type end to end.
#[async_trait]
pub trait AnalysisProcessor: Send + Sync {
    /// The type this processor handles.
    fn job_type(&self) -> JobType;

    /// Processor name for logging.
    fn name(&self) -> &'static str;

    /// Run the analysis and return the persistence-ready result payload.
    async fn process(
        &self,
        request: &AnalysisRequest,
        progress: ProgressFn<'_>,
    ) -> Result<Value, ProcessorError>;
}

/// Build the full registry over the closed type set.
pub fn build_registry(
    provider: Arc<dyn EnrichmentProvider>,
    store: Arc<dyn RecordStore>,
) -> ProcessorRegistry {
    let mut registry = ProcessorRegistry::new();
    registry.register(Arc::new(ProfileProcessor::new(
        provider.clone(),
        store.clone(),
    )));
    registry.register(Arc::new(IndustryProcessor::new(
        provider.clone(),
        store.clone(),
    )));
    registry.register(Arc::new(CompetitorsProcessor::new(provider, store)));
    registry
}

/// Report the named checkpoint from the type's config, if it exists.
pub(crate) fn report(progress: ProgressFn<'_>, config: &JobTypeConfig, stage: &str) {
    if let Some(checkpoint) = config.checkpoint(stage) {
        progress(checkpoint.percent, checkpoint.name);
    }
}

/// Reject an empty salvage, then verify the type's minimum field set.
pub(crate) fn check_recovered(
    recovered: &RecoveredFields,
    required: &[&str],
) -> Result<(), ProcessorError> {
    if recovered.is_empty() {
        return Err(ProcessorError::Recovery(
            "no fields could be recovered from the provider response".into(),
        ));
    }
    for &field in required {
        if !recovered.contains_key(field) {
            return Err(ProcessorError::Recovery(format!(
                "required field `{field}` missing from recovered response"
            )));
        }
    }
    Ok(())
}

/// Reshape recovered fields into the record's full field set, defaulting
/// absent optional fields to null; missing optional fields are never an
/// error.
pub(crate) fn shape_fields(mut recovered: RecoveredFields, expected: &[&str]) -> Value {
    let mut fields = serde_json::Map::with_capacity(expected.len());
    for &name in expected {
        fields.insert(
            name.to_string(),
            recovered.remove(name).unwrap_or(Value::Null),
        );
    }
    Value::Object(fields)
}
