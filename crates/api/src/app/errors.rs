//! Mapping of queue/store errors to JSON problem responses.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use dossier_infra::SubmitError;

pub fn submit_error_to_response(err: SubmitError) -> axum::response::Response {
    match err {
        SubmitError::Validation(e) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string())
        }
        SubmitError::UnknownJobType(job_type) => json_error(
            StatusCode::BAD_REQUEST,
            "unknown_analysis_type",
            format!("no processor registered for analysis type: {job_type}"),
        ),
        SubmitError::Store(e) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "store_error",
            e.to_string(),
        ),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
