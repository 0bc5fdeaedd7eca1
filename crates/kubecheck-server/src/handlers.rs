//! HTTP handlers for the reporting server

use crate::models::{Index, IndexEntry, Report, ReportEntry};
use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use kubecheck_core::Healthcheck;
use kubecheck_runtime::{Runner, ShutdownSignal};
use serde_json::json;
use std::sync::Arc;
use url::Url;

/// Shared application state
#[derive(Debug, Clone)]
pub struct AppState {
    checks: Vec<Arc<dyn Healthcheck>>,
    runner: Runner,
    debug: bool,
    shutdown: ShutdownSignal,
}

impl AppState {
    /// Create a new application state
    pub fn new(checks: Vec<Arc<dyn Healthcheck>>, runner: Runner) -> Self {
        Self {
            checks,
            runner,
            debug: false,
            shutdown: ShutdownSignal::new(),
        }
    }

    /// Show input and output of passed checks
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Cancel in-flight runs when `shutdown` triggers
    pub fn with_shutdown(mut self, shutdown: ShutdownSignal) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Configured checks
    pub fn checks(&self) -> &[Arc<dyn Healthcheck>] {
        &self.checks
    }

    async fn report(&self, checks: &[Arc<dyn Healthcheck>]) -> Report {
        let cancel = self.shutdown.token();

        self.runner
            .run_cancellable(
                checks,
                |description, result| ReportEntry::new(description, result, self.debug),
                &cancel,
            )
            .await
            .into_iter()
            .collect()
    }
}

/// List every check with a link running it alone
/// GET /
pub async fn index_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Json<Index> {
    let proto = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("http");
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");

    let checks = state
        .checks
        .iter()
        .map(|check| {
            let description = check.describe();
            IndexEntry {
                url: format!("{proto}://{host}{}", check_path(&description.name)),
                name: description.name,
                description: description.description,
            }
        })
        .collect();

    Json(Index { checks })
}

/// Path running only `name`, the name percent-encoded as a single segment
fn check_path(name: &str) -> String {
    let Ok(mut url) = Url::parse("http://localhost/checks/") else {
        return format!("/checks/{name}");
    };
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.pop_if_empty().push(name);
    }
    url.path().to_string()
}

/// Run every configured check
/// GET /checks/
pub async fn run_all_handler(State(state): State<Arc<AppState>>) -> Report {
    state.report(&state.checks).await
}

/// Run the checks named `name`
/// GET /checks/:name
pub async fn run_one_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Response {
    let selected: Vec<_> = state
        .checks
        .iter()
        .filter(|check| check.describe().name == name)
        .cloned()
        .collect();

    if selected.is_empty() {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("Unknown check: {name}") })),
        )
            .into_response();
    }

    state.report(&selected).await.into_response()
}
