//! Synthetic check failing at a configured rate
//!
//! Used to exercise the reporting and alerting path. Failures of this check
//! carry no meaning about the monitored systems.

use crate::config::CheckMeta;
use crate::probe::RandomSource;
use async_trait::async_trait;
use kubecheck_core::{
    evaluate, AssertionGroup, CheckResult, Description, Expectation, Healthcheck,
    DEFAULT_CHECK_TIMEOUT,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

/// One draw of the synthetic check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Draw {
    /// Configured failure rate
    pub fail_rate: u32,
    /// Drawn number, 0 when the rate never fails
    pub number: u32,
}

impl Draw {
    /// Draw a number for `fail_rate`: 0 never fails, 1 always fails and any
    /// larger N fails with probability 1/N
    pub fn take(fail_rate: u32, random: &dyn RandomSource) -> Self {
        let number = match fail_rate {
            0 => 0,
            1 => 1,
            n => random.draw(n),
        };
        Self { fail_rate, number }
    }

    /// Whether the failure number was drawn
    pub fn is_hit(&self) -> bool {
        self.number > 0 && self.number == self.fail_rate
    }

    /// Reason reported when the draw fails the check
    pub fn failure_reason(&self) -> &'static str {
        match self.fail_rate {
            1 => "Always failing",
            _ => "Randomly failing",
        }
    }

    fn mode(&self) -> &'static str {
        match self.fail_rate {
            0 => "never failing",
            1 => "always failing",
            _ => "randomly failing",
        }
    }
}

/// The draw must not hit the failure number
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoFailureDrawnExpectation {}

impl NoFailureDrawnExpectation {
    fn verify(&self, draw: &Draw) -> Vec<AssertionGroup> {
        let mut group = AssertionGroup::with_subject("RandomFail", draw.mode());
        group.record(
            "NotEquals",
            !draw.is_hit(),
            format!("!={}", draw.fail_rate),
            draw.number,
        );
        vec![group]
    }
}

/// Expectations a random failure check can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "expect", rename_all = "snake_case")]
pub enum RandomExpectation {
    /// The draw must not hit the failure number
    NoFailureDrawn(NoFailureDrawnExpectation),
}

impl Expectation<Draw> for RandomExpectation {
    fn verify(&self, draw: &Draw) -> Vec<AssertionGroup> {
        match self {
            Self::NoFailureDrawn(e) => e.verify(draw),
        }
    }
}

/// Configuration of a random failure check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomFailCheckConfig {
    /// Name, description and timeout
    #[serde(flatten)]
    pub meta: CheckMeta,
    /// 0 = never, 1 = always, N = with probability 1/N
    pub fail_rate: u32,
}

/// Randomly failing check
#[derive(Debug, Clone)]
pub struct RandomFailCheck {
    name: String,
    description: String,
    fail_rate: u32,
    timeout: Duration,
    expectations: Vec<RandomExpectation>,
    random: Arc<dyn RandomSource>,
}

impl RandomFailCheck {
    /// Create a check failing at `fail_rate`
    pub fn new(name: impl Into<String>, fail_rate: u32, random: Arc<dyn RandomSource>) -> Self {
        Self {
            name: name.into(),
            description: "Randomly fails at the given failure rate. Usually used for debugging alarms. Failures may be ignored!".to_string(),
            fail_rate,
            timeout: DEFAULT_CHECK_TIMEOUT,
            expectations: vec![RandomExpectation::NoFailureDrawn(
                NoFailureDrawnExpectation::default(),
            )],
            random,
        }
    }

    /// Build a check from its configuration
    pub fn from_config(config: &RandomFailCheckConfig, random: Arc<dyn RandomSource>) -> Self {
        let mut check = Self::new(&config.meta.name, config.fail_rate, random);
        config.meta.apply(&mut check.description, &mut check.timeout);
        check
    }

    /// Append expectations
    pub fn with_expectations<I>(mut self, expectations: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<RandomExpectation>,
    {
        self.expectations
            .extend(expectations.into_iter().map(Into::into));
        self
    }
}

impl From<NoFailureDrawnExpectation> for RandomExpectation {
    fn from(e: NoFailureDrawnExpectation) -> Self {
        Self::NoFailureDrawn(e)
    }
}

#[async_trait]
impl Healthcheck for RandomFailCheck {
    fn kind(&self) -> &'static str {
        "random-fail"
    }

    fn describe(&self) -> Description {
        Description::new(&self.name, &self.description)
    }

    async fn execute(&self) -> CheckResult {
        let input = json!({ "failRate": self.fail_rate });
        let draw = Draw::take(self.fail_rate, self.random.as_ref());

        let mut result = evaluate(&input, &self.expectations, |e| e.verify(&draw));
        if result.is_failed() && draw.is_hit() {
            result.reason = Some(draw.failure_reason().to_string());
        }
        result
    }

    fn input(&self) -> Option<Value> {
        Some(json!({ "failRate": self.fail_rate }))
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FixedDraw;
    use kubecheck_core::Status;

    fn check(fail_rate: u32, drawn: u32) -> RandomFailCheck {
        RandomFailCheck::new("random-failure", fail_rate, Arc::new(FixedDraw(drawn)))
    }

    #[tokio::test]
    async fn test_rate_zero_never_fails() {
        let result = check(0, 0).execute().await;
        assert_eq!(result.status, Status::Passed);
        assert_eq!(result.input, Some(json!({"failRate": 0})));
    }

    #[tokio::test]
    async fn test_rate_one_always_fails() {
        let result = check(1, 0).execute().await;
        assert_eq!(result.status, Status::Failed);
        assert_eq!(result.reason.as_deref(), Some("Always failing"));
        let output = result.output.unwrap();
        assert_eq!(output[0]["entity"], json!("always failing"));
        assert_eq!(output[0]["assertions"][0]["actual"], json!(1));
    }

    #[tokio::test]
    async fn test_rate_n_fails_only_on_n() {
        let result = check(10, 10).execute().await;
        assert_eq!(result.status, Status::Failed);
        assert_eq!(result.reason.as_deref(), Some("Randomly failing"));

        let result = check(10, 3).execute().await;
        assert_eq!(result.status, Status::Passed);
        assert!(result.reason.is_none());
        assert_eq!(check(10, 1).execute().await.status, Status::Passed);
    }

    #[test]
    fn test_draw_uses_source_only_for_random_rates() {
        assert_eq!(Draw::take(0, &FixedDraw(7)).number, 0);
        assert_eq!(Draw::take(1, &FixedDraw(7)).number, 1);
        assert_eq!(Draw::take(8, &FixedDraw(7)).number, 7);
    }
}
