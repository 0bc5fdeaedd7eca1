//! Route table

use crate::handlers::{index_handler, run_all_handler, run_one_handler, AppState};
use axum::{routing::get, Router};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Build the reporting router
pub fn build_router(state: Arc<AppState>, request_timeout: Duration) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/checks/", get(run_all_handler))
        .route("/checks/:name", get(run_one_handler))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
