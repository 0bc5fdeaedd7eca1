//! # kubecheck core
//!
//! Core types, traits, and error handling for kubecheck.
//!
//! This crate provides the foundational abstractions shared by every probe:
//! - Assertion / assertion group data model
//! - Expectation trait and the evaluation engine
//! - Healthcheck trait and uniform check results
//! - Error types

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod assertion;
pub mod check;
pub mod error;
pub mod expectation;
pub mod result;
pub mod types;

pub use assertion::{Assertion, AssertionGroup};
pub use check::{Healthcheck, DEFAULT_CHECK_TIMEOUT};
pub use error::{Error, Result};
pub use expectation::{evaluate, Evaluation, Expectation, EXPECTATIONS_NOT_MET};
pub use result::CheckResult;
pub use types::{Description, LifecycleEvent, Status};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::assertion::{Assertion, AssertionGroup};
    pub use crate::check::Healthcheck;
    pub use crate::error::{Error, Result};
    pub use crate::expectation::{evaluate, Evaluation, Expectation};
    pub use crate::result::CheckResult;
    pub use crate::types::{Description, LifecycleEvent, Status};
}
