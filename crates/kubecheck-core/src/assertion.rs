//! Assertions and assertion groups
//!
//! An [`AssertionGroup`] is the unit an expectation produces: a named, ordered
//! list of boolean comparisons whose aggregate outcome is recomputed every time
//! an assertion is recorded. Assertion kinds are free-form labels so new
//! expectations never need to touch this module.

use crate::types::Status;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One named boolean comparison with its expected and actual values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assertion {
    /// Comparison label, e.g. `Equals`, `InRange`, `Min`
    #[serde(rename = "type")]
    pub kind: String,
    /// Whether the comparison held
    #[serde(rename = "result")]
    pub outcome: Status,
    /// What was expected
    pub expected: Value,
    /// What was observed
    pub actual: Value,
}

/// An aggregated collection of assertions about one subject
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssertionGroup {
    /// Group name, e.g. `HTTPStatusCode`
    pub name: String,
    /// The entity the group is about (a node name, a certificate, ...)
    #[serde(rename = "entity", default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<Value>,
    /// Aggregate outcome, failed iff any assertion failed
    #[serde(rename = "result")]
    outcome: Status,
    /// Recorded assertions in order
    assertions: Vec<Assertion>,
}

impl AssertionGroup {
    /// Create an empty, passed group without a subject
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            subject: None,
            outcome: Status::Passed,
            assertions: Vec::new(),
        }
    }

    /// Create an empty, passed group about `subject`
    ///
    /// The subject is stored as an opaque JSON snapshot. A subject that cannot
    /// be represented as JSON is dropped rather than failing the group.
    pub fn with_subject<S: Serialize>(name: impl Into<String>, subject: S) -> Self {
        let mut group = Self::new(name);
        group.subject = serde_json::to_value(subject).ok();
        group
    }

    /// Append an assertion and recompute the aggregate outcome
    pub fn record(
        &mut self,
        kind: impl Into<String>,
        condition: bool,
        expected: impl Into<Value>,
        actual: impl Into<Value>,
    ) {
        self.assertions.push(Assertion {
            kind: kind.into(),
            outcome: Status::from_condition(condition),
            expected: expected.into(),
            actual: actual.into(),
        });

        self.outcome = if self.assertions.iter().any(|a| a.outcome.is_failed()) {
            Status::Failed
        } else {
            Status::Passed
        };
    }

    /// Aggregate outcome of the group
    pub fn outcome(&self) -> Status {
        self.outcome
    }

    /// Recorded assertions in order
    pub fn assertions(&self) -> &[Assertion] {
        &self.assertions
    }

    /// Whether no assertion has been recorded yet
    pub fn is_empty(&self) -> bool {
        self.assertions.is_empty()
    }

    /// Look up the first assertion of the given kind
    pub fn assertion(&self, kind: &str) -> Option<&Assertion> {
        self.assertions.iter().find(|a| a.kind == kind)
    }
}
