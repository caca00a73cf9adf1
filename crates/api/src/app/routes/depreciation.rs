use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use assetbook_infra::LedgerStore;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

/// Run one batch. Per-asset failures are part of a 200 response.
pub async fn run_batch(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::RunBatchRequest>,
) -> axum::response::Response {
    let request = match body.into_batch_request() {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    match services.runner.run_batch(request).await {
        Ok(result) => (StatusCode::OK, Json(dto::batch_result_to_json(&result))).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn list_records(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let asset_id = match dto::parse_asset_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let asset = match services.store.get_asset(asset_id).await {
        Ok(a) => a,
        Err(e) => return errors::store_error_to_response(e),
    };
    let records = match services.store.list_records(asset_id).await {
        Ok(r) => r,
        Err(e) => return errors::store_error_to_response(e),
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "asset_id": asset.id.to_string(),
            "asset_code": asset.code,
            "accumulated_depreciation": asset.accumulated_depreciation.to_string(),
            "current_book_value": asset.current_book_value.to_string(),
            "items": records.iter().map(dto::record_to_json).collect::<Vec<_>>(),
        })),
    )
        .into_response()
}

pub async fn preview(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Query(query): Query<dto::PreviewQuery>,
) -> axum::response::Response {
    let asset_id = match dto::parse_asset_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let target = match dto::parse_date(&query.target) {
        Ok(d) => d,
        Err(resp) => return resp,
    };
    let usage = match query.usage.as_deref().map(dto::parse_usage).transpose() {
        Ok(u) => u,
        Err(resp) => return resp,
    };

    match services.runner.preview(asset_id, target, usage).await {
        Ok(p) => (StatusCode::OK, Json(dto::preview_to_json(&p))).into_response(),
        Err(e) => errors::run_error_to_response(e),
    }
}

pub async fn post_journal(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let asset_id = match dto::parse_asset_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.posting.post_unlinked(asset_id).await {
        Ok(report) => (StatusCode::OK, Json(dto::posting_report_to_json(&report))).into_response(),
        Err(e) => errors::posting_error_to_response(e),
    }
}
