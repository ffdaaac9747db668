//! Submission and status-query endpoints.

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use dossier_core::JobId;

use crate::app::dto::{SubmitAnalysisRequest, SubmitAnalysisResponse};
use crate::app::{errors, AppState};

pub fn router() -> Router {
    Router::new()
        .route("/analyses", post(submit_analysis))
        .route("/analyses/:id", get(analysis_status))
}

/// POST /analyses
///
/// Synchronous and fail-fast: an invalid request or unknown type is rejected
/// here and no job is created. Everything after 202 is observed
/// asynchronously via the status endpoint or the event stream.
async fn submit_analysis(
    Extension(state): Extension<AppState>,
    Json(body): Json<SubmitAnalysisRequest>,
) -> axum::response::Response {
    let (job_type, request) = body.into_parts();
    match state.queue.submit(job_type, request) {
        Ok(job_id) => (
            StatusCode::ACCEPTED,
            Json(SubmitAnalysisResponse {
                job_id,
                subscribe: format!("/analyses/{job_id}/events"),
            }),
        )
            .into_response(),
        Err(e) => errors::submit_error_to_response(e),
    }
}

/// GET /analyses/:id
async fn analysis_status(
    Extension(state): Extension<AppState>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let job_id: JobId = match id.parse() {
        Ok(parsed) => parsed,
        Err(e) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_job_id", e.to_string())
        }
    };

    match state.queue.status(job_id) {
        Ok(Some(snapshot)) => Json(snapshot).into_response(),
        Ok(None) => errors::json_error(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("no analysis job {job_id}"),
        ),
        Err(e) => errors::json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "store_error",
            e.to_string(),
        ),
    }
}
