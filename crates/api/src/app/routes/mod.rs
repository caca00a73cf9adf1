use axum::{
    routing::{get, post},
    Router,
};

pub mod depreciation;
pub mod system;

/// Router for all depreciation endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/depreciation/runs", post(depreciation::run_batch))
        .route("/assets/:id/depreciation", get(depreciation::list_records))
        .route("/assets/:id/depreciation/preview", get(depreciation::preview))
        .route("/assets/:id/depreciation/journal", post(depreciation::post_journal))
}
