use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use assetbook_accounting::JournalError;
use assetbook_depreciation::DepreciationError;
use assetbook_infra::{PostingError, RunError, StoreError};

pub fn store_error_to_response(err: StoreError) -> axum::response::Response {
    match err {
        StoreError::NotFound(msg) => json_error(StatusCode::NOT_FOUND, "not_found", msg),
        StoreError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        StoreError::Storage(msg) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", msg)
        }
    }
}

pub fn run_error_to_response(err: RunError) -> axum::response::Response {
    let code = run_error_code(&err);
    match err {
        RunError::Store(e) => store_error_to_response(e),
        RunError::Depreciation(e) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, code, e.to_string())
        }
        RunError::NotScheduled => json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            code,
            RunError::NotScheduled.to_string(),
        ),
        RunError::Aborted(msg) => json_error(StatusCode::INTERNAL_SERVER_ERROR, code, msg),
    }
}

pub fn posting_error_to_response(err: PostingError) -> axum::response::Response {
    match err {
        PostingError::Store(e) => store_error_to_response(e),
        PostingError::Journal(JournalError::Unavailable(msg)) => {
            json_error(StatusCode::BAD_GATEWAY, "journal_unavailable", msg)
        }
        PostingError::Journal(e) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "journal_rejected", e.to_string())
        }
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

/// Stable machine-readable code for a per-asset failure inside a batch result.
pub fn run_error_code(err: &RunError) -> &'static str {
    match err {
        RunError::Depreciation(DepreciationError::MissingStartDate(_)) => "missing_start_date",
        RunError::Depreciation(DepreciationError::InvalidUsage { .. }) => "invalid_usage",
        RunError::Depreciation(DepreciationError::InvalidParameters { .. }) => "invalid_parameters",
        RunError::Depreciation(DepreciationError::InconsistentState { .. }) => "inconsistent_state",
        RunError::Store(StoreError::NotFound(_)) => "not_found",
        RunError::Store(StoreError::Conflict(_)) => "conflict",
        RunError::Store(StoreError::Storage(_)) => "persistence_failure",
        RunError::NotScheduled => "not_scheduled",
        RunError::Aborted(_) => "aborted",
    }
}
