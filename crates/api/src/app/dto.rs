//! Request/response DTOs and mapping to/from domain types.

use serde::{Deserialize, Serialize};

use dossier_core::{AccountId, AnalysisRequest, JobId, JobType, ProfileId};

/// Body of `POST /analyses`.
#[derive(Debug, Deserialize)]
pub struct SubmitAnalysisRequest {
    #[serde(rename = "type")]
    pub job_type: JobType,
    pub account_id: AccountId,
    pub profile_id: ProfileId,
    pub description: String,
    #[serde(default)]
    pub extended: bool,
    #[serde(default)]
    pub force_regenerate: bool,
}

impl SubmitAnalysisRequest {
    pub fn into_parts(self) -> (JobType, AnalysisRequest) {
        let mut request =
            AnalysisRequest::new(self.account_id, self.profile_id, self.description);
        request.extended = self.extended;
        request.force_regenerate = self.force_regenerate;
        (self.job_type, request)
    }
}

/// Response of `POST /analyses`.
#[derive(Debug, Serialize)]
pub struct SubmitAnalysisResponse {
    pub job_id: JobId,
    /// Path to open a WebSocket on for live updates.
    pub subscribe: String,
}
