//! Industry analysis.

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

/// Fields the provider is asked to emit for an industry analysis.
pub const EXPECTED_FIELDS: &[&str] = &[
    "industry_name",
    "market_size",
    "growth_rate",
    "trends",
    "challenges",
    "opportunities",
    "key_players",
];

/// The minimum an industry record needs to be worth persisting.
const REQUIRED_FIELDS: &[&str] = &["industry_name", "market_size"];

pub struct IndustryProcessor {
    provider: Arc<dyn EnrichmentProvider>,
    store: Arc<dyn RecordStore>,
}

impl IndustryProcessor {
    pub fn new(provider: Arc<dyn EnrichmentProvider>, store: Arc<dyn RecordStore>) -> Self {
        Self { provider, store }
    }

    fn build_instruction(&self, request: &AnalysisRequest) -> String {
        format!(
            "Analyze the industry of the company described below and respond with a \
             single JSON object containing exactly these fields: {fields}. \
             `market_size` is a number in USD, `growth_rate` an annual percentage, \
             and `trends`, `challenges`, `opportunities`, `key_players` are arrays \
             of strings. Use null for anything you cannot determine. Do not include \
             any text outside the JSON object.\n\nCompany: {description}",
            fields = EXPECTED_FIELDS.join(", "),
            description = request.description.trim(),
        )
    }
}

#[async_trait]
impl AnalysisProcessor for IndustryProcessor {
    fn job_type(&self) -> JobType {
        JobType::Industry
    }

    fn name(&self) -> &'static str {
        "IndustryProcessor"
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
            if let Some(existing) = self.store.get(owner, RecordKind::IndustryAnalysis).await? {
                tracing::debug!(%owner, "industry analysis already stored, skipping provider query");
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
            RecordKind::IndustryAnalysis,
            shape_fields(recovered, EXPECTED_FIELDS),
            response.citations,
        );

        report(progress, config, STAGE_PERSISTING);
        self.store.upsert(record.clone()).await?;

        report(progress, config, STAGE_COMPLETE);
        Ok(serde_json::to_value(&record).unwrap_or(Value::Null))
    }
}
