//! The healthcheck abstraction

use crate::result::CheckResult;
use crate::types::Description;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::time::Duration;

/// Timeout applied to a check that does not configure its own
pub const DEFAULT_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// A named, independently executable probe with its expectations
///
/// Implementations are immutable once built: every execution allocates its
/// own observation, assertion groups and result, so one check can be executed
/// concurrently from several runs.
#[async_trait]
pub trait Healthcheck: Send + Sync + fmt::Debug {
    /// Variant name used in logs, e.g. `http-get`
    fn kind(&self) -> &'static str;

    /// Static name and description
    fn describe(&self) -> Description;

    /// Perform one observation and evaluate the expectations against it
    ///
    /// Never fails: observation errors are turned into failed results.
    async fn execute(&self) -> CheckResult;

    /// Snapshot of what the check is about to observe
    ///
    /// Known before execution, so a run that gives up on the check can
    /// still report it.
    fn input(&self) -> Option<Value> {
        None
    }

    /// Upper bound on one execution
    fn timeout(&self) -> Duration {
        DEFAULT_CHECK_TIMEOUT
    }
}
