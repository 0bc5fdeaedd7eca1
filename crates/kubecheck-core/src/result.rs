//! Uniform healthcheck results

use crate::types::Status;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Verdict, reason and diagnostics of one healthcheck execution
///
/// Results are always fully populated; hiding `input`/`output` for passed
/// checks is left to the reporting layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    /// Overall status
    pub status: Status,
    /// Failure reason, set only for failed results
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Snapshot of what was checked
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
    /// Snapshot of what was observed and asserted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
}

impl CheckResult {
    /// Create a passed result
    pub fn passed(input: Option<Value>, output: Option<Value>) -> Self {
        Self {
            status: Status::Passed,
            reason: None,
            input,
            output,
        }
    }

    /// Create a failed result
    pub fn failed(reason: impl Into<String>, input: Option<Value>, output: Option<Value>) -> Self {
        Self {
            status: Status::Failed,
            reason: Some(reason.into()),
            input,
            output,
        }
    }

    /// Create a failed result for a probe whose observation itself failed
    ///
    /// No assertion tree exists in that case, only the attempted input.
    pub fn observation_failed(reason: impl Into<String>, input: Option<Value>) -> Self {
        Self::failed(reason, input, None)
    }

    /// Whether the result is failed
    pub fn is_failed(&self) -> bool {
        self.status.is_failed()
    }

    /// Copy of this result with `input` and `output` removed
    pub fn redacted(&self) -> Self {
        Self {
            status: self.status,
            reason: self.reason.clone(),
            input: None,
            output: None,
        }
    }
}
