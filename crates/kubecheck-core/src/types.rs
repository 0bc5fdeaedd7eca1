//! Common types used throughout kubecheck

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of an assertion, an assertion group or a whole healthcheck
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Everything that was asserted held
    Passed,
    /// The probe failed or at least one assertion did not hold
    Failed,
}

impl Status {
    /// Map a boolean condition to a status
    pub fn from_condition(condition: bool) -> Self {
        if condition {
            Status::Passed
        } else {
            Status::Failed
        }
    }

    /// Whether this status is [`Status::Failed`]
    pub fn is_failed(self) -> bool {
        self == Status::Failed
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::Passed
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passed => write!(f, "passed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Static description of a healthcheck
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Description {
    /// Unique name, used as the result key
    pub name: String,
    /// Human readable description
    pub description: String,
}

impl Description {
    /// Create a new description
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Points in a run at which lifecycle hooks are notified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifecycleEvent {
    /// Before the first check of a run
    #[serde(rename = "OnHealthcheckStarted")]
    Started,
    /// After the last check of a completed run
    #[serde(rename = "OnHealthcheckCompleted")]
    Completed,
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Started => write!(f, "OnHealthcheckStarted"),
            Self::Completed => write!(f, "OnHealthcheckCompleted"),
        }
    }
}
