//! Report payloads

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use kubecheck_core::{CheckResult, Description};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One check in a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEntry {
    /// Check description
    pub description: String,

    /// Status, reason and, unless hidden, input and output
    #[serde(flatten)]
    pub result: CheckResult,
}

impl ReportEntry {
    /// Build an entry, hiding diagnostics of passed checks unless `debug`
    pub fn new(description: &Description, result: &CheckResult, debug: bool) -> Self {
        let result = if debug || result.is_failed() {
            result.clone()
        } else {
            result.redacted()
        };

        Self {
            description: description.description.clone(),
            result,
        }
    }
}

/// Entries keyed by check name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Report {
    /// Report entries
    pub entries: BTreeMap<String, ReportEntry>,
}

impl Report {
    /// Whether any entry failed
    pub fn is_failed(&self) -> bool {
        self.entries.values().any(|entry| entry.result.is_failed())
    }

    /// `424 Failed Dependency` if any check failed, `200 OK` otherwise
    pub fn status_code(&self) -> StatusCode {
        if self.is_failed() {
            StatusCode::FAILED_DEPENDENCY
        } else {
            StatusCode::OK
        }
    }
}

impl FromIterator<(String, ReportEntry)> for Report {
    fn from_iter<I: IntoIterator<Item = (String, ReportEntry)>>(entries: I) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }
}

impl IntoResponse for Report {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self)).into_response()
    }
}

/// Index of available checks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Index {
    /// Links to every configured check
    pub checks: Vec<IndexEntry>,
}

/// One check in the index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Check name
    pub name: String,
    /// Check description
    pub description: String,
    /// URL running only this check
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn description() -> Description {
        Description::new("http-get", "Performs a HTTP GET request")
    }

    #[test]
    fn test_passed_entry_hides_diagnostics() {
        let result = CheckResult::passed(Some(json!({"url": "x"})), Some(json!([])));

        let entry = ReportEntry::new(&description(), &result, false);
        assert_eq!(
            serde_json::to_value(&entry).unwrap(),
            json!({"description": "Performs a HTTP GET request", "status": "passed"})
        );

        let entry = ReportEntry::new(&description(), &result, true);
        assert_eq!(entry.result.input, Some(json!({"url": "x"})));
    }

    #[test]
    fn test_failed_entry_keeps_diagnostics() {
        let result = CheckResult::observation_failed("connection refused", Some(json!({"url": "x"})));

        let entry = ReportEntry::new(&description(), &result, false);
        let value = serde_json::to_value(&entry).unwrap();

        assert_eq!(value["status"], "failed");
        assert_eq!(value["reason"], "connection refused");
        assert_eq!(value["input"]["url"], "x");
    }

    #[test]
    fn test_status_code() {
        let passed = ReportEntry::new(&description(), &CheckResult::passed(None, None), false);
        let failed = ReportEntry::new(
            &description(),
            &CheckResult::failed("Expectations not met", None, None),
            false,
        );

        let report: Report = [("a".to_string(), passed.clone())].into_iter().collect();
        assert_eq!(report.status_code(), StatusCode::OK);

        let report: Report = [("a".to_string(), passed), ("b".to_string(), failed)]
            .into_iter()
            .collect();
        assert_eq!(report.status_code(), StatusCode::FAILED_DEPENDENCY);

        assert_eq!(Report::default().status_code(), StatusCode::OK);
    }
}
