//! Company profile analysis.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use dossier_core::job_type::{
    STAGE_COMPLETE, STAGE_PERSISTING, STAGE_QUERYING, STAGE_STARTED, STAGE_STRUCTURING,
};
use dossier_core::{AnalysisRequest, JobType};

use crate::error::ProcessorError;
use crate::provider::{EnrichmentProvider, ResponseBudget};
use crate::recovery;
use crate::store::{RecordKind, RecordStore, StoredRecord};

use super::{check_recovered, report, shape_fields, AnalysisProcessor, ProgressFn};

/// Fields the provider is asked to emit for a profile.
pub const EXPECTED_FIELDS: &[&str] = &[
    "company_name",
    "summary",
    "founded_year",
    "headquarters",
    "employee_count",
    "website",
    "key_products",
    "leadership",
];

/// The minimum a profile record needs to be worth persisting.
const REQUIRED_FIELDS: &[&str] = &["company_name", "summary"];

pub struct ProfileProcessor {
    provider: Arc<dyn EnrichmentProvider>,
    store: Arc<dyn RecordStore>,
}

impl ProfileProcessor {
    pub fn new(provider: Arc<dyn EnrichmentProvider>, store: Arc<dyn RecordStore>) -> Self {
        Self { provider, store }
    }

    fn build_instruction(&self, request: &AnalysisRequest) -> String {
        format!(
            "Research the company described below and respond with a single JSON \
             object containing exactly these fields: {fields}. Use null for anything \
             you cannot determine. `key_products` is an array of strings and \
             `leadership` is an object mapping role to name. Do not include any \
             text outside the JSON object.\n\nCompany: {description}",
            fields = EXPECTED_FIELDS.join(", "),
            description = request.description.trim(),
        )
    }
}

#[async_trait]
impl AnalysisProcessor for ProfileProcessor {
    fn job_type(&self) -> JobType {
        JobType::Profile
    }

    fn name(&self) -> &'static str {
        "ProfileProcessor"
    }

    async fn process(
        &self,
        request: &AnalysisRequest,
        progress: ProgressFn<'_>,
    ) -> Result<Value, ProcessorError> {
        let config = self.job_type().config();
        let owner = request.owner_key();
        report(progress, config, STAGE_STARTED);

        if !request.force_regenerate {
            if let Some(existing) = self.store.get(owner, RecordKind::CompanyProfile).await? {
                tracing::debug!(%owner, "profile already stored, skipping provider query");
                report(progress, config, STAGE_COMPLETE);
                return Ok(serde_json::to_value(&existing).unwrap_or(Value::Null));
            }
        }

        report(progress, config, STAGE_QUERYING);
        let instruction = self.build_instruction(request);
        let response = self
            .provider
            .query(&instruction, ResponseBudget::for_request(request.extended))
            .await?;

        report(progress, config, STAGE_STRUCTURING);
        let recovered = recovery::recover_fields(&response.text, EXPECTED_FIELDS);
        check_recovered(&recovered, REQUIRED_FIELDS)?;

        let record = StoredRecord::new(
            owner,
            RecordKind::CompanyProfile,
            shape_fields(recovered, EXPECTED_FIELDS),
            response.citations,
        );

        report(progress, config, STAGE_PERSISTING);
        self.store.upsert(record.clone()).await?;

        report(progress, config, STAGE_COMPLETE);
        Ok(serde_json::to_value(&record).unwrap_or(Value::Null))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;

    use dossier_core::{AccountId, ProfileId};

    use super::super::testing::{MapRecordStore, ScriptedProvider};
    use super::*;

    fn request() -> AnalysisRequest {
        AnalysisRequest::new(AccountId::new(), ProfileId::new(), "Acme Corp, Ohio")
    }

    fn full_response() -> String {
        json!({
            "company_name": "Acme Corp",
            "summary": "Packaging manufacturer",
            "founded_year": 1987,
            "headquarters": "Columbus, OH",
            "employee_count": 1_200,
            "website": "https://acme.example",
            "key_products": ["boxes", "mailers"],
            "leadership": {"ceo": "J. Doe"}
        })
        .to_string()
    }

    #[tokio::test]
    async fn persists_and_returns_the_profile() {
        let provider = Arc::new(ScriptedProvider::always(&full_response()));
        let store = Arc::new(MapRecordStore::new());
        let processor = ProfileProcessor::new(provider, store.clone());
        let request = request();

        let result = processor.process(&request, &|_, _| {}).await.unwrap();

        assert_eq!(result["fields"]["company_name"], json!("Acme Corp"));
        let stored = store
            .get(request.owner_key(), RecordKind::CompanyProfile)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.fields["summary"], json!("Packaging manufacturer"));
    }

    #[tokio::test]
    async fn truncated_response_defaults_missing_optionals_to_null() {
        // Complete through `summary`, cut inside `founded_year`.
        let truncated =
            r#"{"company_name": "Acme Corp", "summary": "Packaging manufacturer", "founded_"#;
        let provider = Arc::new(ScriptedProvider::always(truncated));
        let store = Arc::new(MapRecordStore::new());
        let processor = ProfileProcessor::new(provider, store.clone());
        let request = request();

        let result = processor.process(&request, &|_, _| {}).await.unwrap();

        assert_eq!(result["fields"]["company_name"], json!("Acme Corp"));
        assert_eq!(result["fields"]["founded_year"], Value::Null);
        assert_eq!(result["fields"]["website"], Value::Null);
    }

    #[tokio::test]
    async fn missing_required_field_is_a_recovery_error() {
        let provider = Arc::new(ScriptedProvider::always(r#"{"founded_year": 1987}"#));
        let store = Arc::new(MapRecordStore::new());
        let processor = ProfileProcessor::new(provider, store);

        let err = processor.process(&request(), &|_, _| {}).await.unwrap_err();
        assert!(matches!(err, ProcessorError::Recovery(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn existing_record_short_circuits_unless_forced() {
        let provider = Arc::new(ScriptedProvider::always(&full_response()));
        let store = Arc::new(MapRecordStore::new());
        let processor = ProfileProcessor::new(provider.clone(), store.clone());
        let request = request();

        processor.process(&request, &|_, _| {}).await.unwrap();
        assert_eq!(provider.call_count(), 1);

        // Second run without force_regenerate: no provider call.
        processor.process(&request, &|_, _| {}).await.unwrap();
        assert_eq!(provider.call_count(), 1);

        // Forced run queries again but still leaves exactly one record.
        let forced = request.clone().force_regenerate();
        processor.process(&forced, &|_, _| {}).await.unwrap();
        assert_eq!(provider.call_count(), 2);
        assert_eq!(
            store.count(request.owner_key(), RecordKind::CompanyProfile),
            1
        );
    }

    #[tokio::test]
    async fn progress_follows_the_checkpoint_table() {
        let provider = Arc::new(ScriptedProvider::always(&full_response()));
        let store = Arc::new(MapRecordStore::new());
        let processor = ProfileProcessor::new(provider, store);

        let seen: Mutex<Vec<u8>> = Mutex::new(Vec::new());
        let on_progress = |percent: u8, _message: &str| {
            seen.lock().unwrap().push(percent);
        };
        processor.process(&request(), &on_progress).await.unwrap();

        let seen = seen.into_inner().unwrap();
        assert_eq!(seen, vec![5, 20, 60, 85, 100]);
    }
}
