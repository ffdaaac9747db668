//! Competitor landscape analysis.
//!
//! Unlike the singleton record types, competitors persist as an owner-scoped
//! collection: each run replaces the whole set, so a retried or regenerated
//! job always leaves exactly the latest batch.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use dossier_core::job_type::{
    STAGE_COMPLETE, STAGE_PERSISTING, STAGE_QUERYING, STAGE_STARTED, STAGE_STRUCTURING,
};
use dossier_core::{AnalysisRequest, JobType};

use crate::error::ProcessorError;
use crate::provider::{EnrichmentProvider, ResponseBudget};
use crate::recovery;
use crate::store::{RecordKind, RecordStore, StoredRecord};

use super::{check_recovered, report, AnalysisProcessor, ProgressFn};

/// Fields the provider is asked to emit.
pub const EXPECTED_FIELDS: &[&str] = &["competitors", "market_overview"];

/// The competitor array is the whole point; the overview is optional.
const REQUIRED_FIELDS: &[&str] = &["competitors"];

pub struct CompetitorsProcessor {
    provider: Arc<dyn EnrichmentProvider>,
    store: Arc<dyn RecordStore>,
}

impl CompetitorsProcessor {
    pub fn new(provider: Arc<dyn EnrichmentProvider>, store: Arc<dyn RecordStore>) -> Self {
        Self { provider, store }
    }

    fn build_instruction(&self, request: &AnalysisRequest) -> String {
        format!(
            "Identify the main competitors of the company described below and respond \
             with a single JSON object containing exactly these fields: {fields}. \
             `competitors` is an array of objects, each with `name`, `website`, \
             `strengths` (array of strings) and `differentiator`; `market_overview` \
             is a short paragraph. Use null for anything you cannot determine. Do \
             not include any text outside the JSON object.\n\nCompany: {description}",
            fields = EXPECTED_FIELDS.join(", "),
            description = request.description.trim(),
        )
    }
}

#[async_trait]
impl AnalysisProcessor for CompetitorsProcessor {
    fn job_type(&self) -> JobType {
        JobType::Competitors
    }

    fn name(&self) -> &'static str {
        "CompetitorsProcessor"
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
            let existing = self.store.collection(owner, RecordKind::Competitor).await?;
            if !existing.is_empty() {
                tracing::debug!(%owner, count = existing.len(), "competitors already stored");
                report(progress, config, STAGE_COMPLETE);
                return Ok(collection_payload(&existing, Value::Null));
            }
        }

        report(progress, config, STAGE_QUERYING);
        let instruction = self.build_instruction(request);
        let response = self
            .provider
            .query(&instruction, ResponseBudget::for_request(request.extended))
            .await?;

        report(progress, config, STAGE_STRUCTURING);
        let mut recovered = recovery::recover_fields(&response.text, EXPECTED_FIELDS);
        check_recovered(&recovered, REQUIRED_FIELDS)?;

        // Keep only object-shaped entries; a malformed element never sinks
        // the rest of the batch.
        let entries: Vec<Value> = recovered
            .remove("competitors")
            .and_then(|v| v.as_array().cloned())
            .unwrap_or_default()
            .into_iter()
            .filter(Value::is_object)
            .collect();
        if entries.is_empty() {
            return Err(ProcessorError::Recovery(
                "competitor list recovered empty".into(),
            ));
        }
        let overview = recovered.remove("market_overview").unwrap_or(Value::Null);

        let records: Vec<StoredRecord> = entries
            .into_iter()
            .map(|fields| {
                StoredRecord::new(
                    owner,
                    RecordKind::Competitor,
                    fields,
                    response.citations.clone(),
                )
            })
            .collect();

        report(progress, config, STAGE_PERSISTING);
        self.store
            .replace_collection(owner, RecordKind::Competitor, records.clone())
            .await?;

        report(progress, config, STAGE_COMPLETE);
        Ok(collection_payload(&records, overview))
    }
}

fn collection_payload(records: &[StoredRecord], market_overview: Value) -> Value {
    json!({
        "kind": RecordKind::Competitor,
        "count": records.len(),
        "competitors": records.iter().map(|r| r.fields.clone()).collect::<Vec<_>>(),
        "market_overview": market_overview,
    })
}

#[cfg(test)]
mod tests {
    use super::super::testing::{MapRecordStore, ScriptedProvider};
    use super::*;

    use dossier_core::{AccountId, ProfileId};

    fn request() -> AnalysisRequest {
        AnalysisRequest::new(AccountId::new(), ProfileId::new(), "Acme Corp, packaging")
    }

    fn batch(names: &[&str]) -> String {
        json!({
            "competitors": names
                .iter()
                .map(|n| json!({"name": n, "website": null, "strengths": [], "differentiator": null}))
                .collect::<Vec<_>>(),
            "market_overview": "Crowded regional market."
        })
        .to_string()
    }

    #[tokio::test]
    async fn persists_one_record_per_competitor() {
        let provider = Arc::new(ScriptedProvider::always(&batch(&["BoxCo", "PakMax"])));
        let store = Arc::new(MapRecordStore::new());
        let processor = CompetitorsProcessor::new(provider, store.clone());
        let request = request();

        let result = processor.process(&request, &|_, _| {}).await.unwrap();

        assert_eq!(result["count"], json!(2));
        assert_eq!(store.count(request.owner_key(), RecordKind::Competitor), 2);
    }

    #[tokio::test]
    async fn regeneration_replaces_the_whole_batch() {
        let provider = Arc::new(ScriptedProvider::new([
            Ok(crate::provider::ProviderResponse::text_only(batch(&[
                "BoxCo", "PakMax", "CartonWorks",
            ]))),
            Ok(crate::provider::ProviderResponse::text_only(batch(&[
                "BoxCo",
            ]))),
        ]));
        let store = Arc::new(MapRecordStore::new());
        let processor = CompetitorsProcessor::new(provider, store.clone());
        let request = request().force_regenerate();

        processor.process(&request, &|_, _| {}).await.unwrap();
        assert_eq!(store.count(request.owner_key(), RecordKind::Competitor), 3);

        processor.process(&request, &|_, _| {}).await.unwrap();
        // Latest batch only; nothing accumulates across runs.
        assert_eq!(store.count(request.owner_key(), RecordKind::Competitor), 1);
    }

    #[tokio::test]
    async fn existing_collection_short_circuits_without_force() {
        let provider = Arc::new(ScriptedProvider::always(&batch(&["BoxCo"])));
        let store = Arc::new(MapRecordStore::new());
        let processor = CompetitorsProcessor::new(provider.clone(), store);
        let request = request();

        processor.process(&request, &|_, _| {}).await.unwrap();
        let result = processor.process(&request, &|_, _| {}).await.unwrap();

        assert_eq!(provider.call_count(), 1);
        assert_eq!(result["count"], json!(1));
    }

    #[tokio::test]
    async fn malformed_elements_are_skipped_not_fatal() {
        let raw = r#"{"competitors": [{"name": "BoxCo"}, "not-an-object", 42], "market_overview": null}"#;
        let provider = Arc::new(ScriptedProvider::always(raw));
        let store = Arc::new(MapRecordStore::new());
        let processor = CompetitorsProcessor::new(provider, store.clone());
        let request = request();

        let result = processor.process(&request, &|_, _| {}).await.unwrap();
        assert_eq!(result["count"], json!(1));
    }

    #[tokio::test]
    async fn empty_competitor_list_is_a_recovery_error() {
        let provider =
            Arc::new(ScriptedProvider::always(r#"{"competitors": [], "market_overview": "x"}"#));
        let store = Arc::new(MapRecordStore::new());
        let processor = CompetitorsProcessor::new(provider, store);

        let err = processor.process(&request(), &|_, _| {}).await.unwrap_err();
        assert!(matches!(err, ProcessorError::Recovery(_)));
    }
}
