//! Expectations and the evaluation engine
//!
//! Every probe family defines a context type (what it observed) and a closed
//! enum of expectations implementing [`Expectation`] for that context. The
//! engine below is the only place where assertion groups are folded into a
//! pass/fail verdict.

use crate::assertion::AssertionGroup;
use crate::result::CheckResult;
use crate::types::Status;
use serde::Serialize;
use serde_json::Value;

/// Reason attached to results whose expectations failed
pub const EXPECTATIONS_NOT_MET: &str = "one or more expectations were not met";

/// A configured rule turning an observation context into assertion groups
///
/// Implementations must be pure: the same context always yields the same
/// groups, and nothing is remembered between calls.
pub trait Expectation<C: ?Sized> {
    /// Verify the expectation against an observation
    fn verify(&self, context: &C) -> Vec<AssertionGroup>;
}

/// Merged assertion groups of one evaluation and their derived status
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    groups: Vec<AssertionGroup>,
    status: Status,
}

impl Evaluation {
    /// Run `verifier` for each expectation in order and merge the groups
    ///
    /// An expectation that yields no groups counts as vacuously passed.
    pub fn run<E, F>(expectations: &[E], mut verifier: F) -> Self
    where
        F: FnMut(&E) -> Vec<AssertionGroup>,
    {
        let groups: Vec<AssertionGroup> = expectations
            .iter()
            .flat_map(|expectation| verifier(expectation))
            .collect();

        let failed = groups
            .iter()
            .flat_map(|group| group.assertions())
            .any(|assertion| assertion.outcome.is_failed());

        Self {
            groups,
            status: Status::from_condition(!failed),
        }
    }

    /// Derived status
    pub fn status(&self) -> Status {
        self.status
    }

    /// Merged groups in expectation order
    pub fn groups(&self) -> &[AssertionGroup] {
        &self.groups
    }

    /// Fold the evaluation into a result carrying `input` and the assertion tree
    pub fn into_result(self, input: Option<Value>) -> CheckResult {
        let output = serde_json::to_value(&self.groups).ok();
        match self.status {
            Status::Passed => CheckResult::passed(input, output),
            Status::Failed => CheckResult::failed(EXPECTATIONS_NOT_MET, input, output),
        }
    }
}

/// Evaluate `expectations` against one observation and build the result
///
/// `input` is the diagnostic snapshot of what was checked; the output of the
/// result is the full assertion tree.
pub fn evaluate<I, E, F>(input: &I, expectations: &[E], verifier: F) -> CheckResult
where
    I: Serialize + ?Sized,
    F: FnMut(&E) -> Vec<AssertionGroup>,
{
    Evaluation::run(expectations, verifier).into_result(serde_json::to_value(input).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Threshold(u32);

    impl Expectation<u32> for Threshold {
        fn verify(&self, context: &u32) -> Vec<AssertionGroup> {
            let mut group = AssertionGroup::new("Threshold");
            group.record("Min", *context >= self.0, self.0, *context);
            vec![group]
        }
    }

    struct Silent;

    impl Expectation<u32> for Silent {
        fn verify(&self, _context: &u32) -> Vec<AssertionGroup> {
            Vec::new()
        }
    }

    #[test]
    fn test_all_expectations_met() {
        let expectations = vec![Threshold(1), Threshold(2)];
        let result = evaluate(&json!({"n": 3}), &expectations, |e| e.verify(&3));

        assert_eq!(result.status, Status::Passed);
        assert!(result.reason.is_none());
        assert_eq!(result.input, Some(json!({"n": 3})));
        assert_eq!(result.output.unwrap().as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_any_failed_assertion_fails_result() {
        let expectations = vec![Threshold(1), Threshold(5)];
        let result = evaluate(&(), &expectations, |e| e.verify(&3));

        assert_eq!(result.status, Status::Failed);
        assert_eq!(result.reason.as_deref(), Some(EXPECTATIONS_NOT_MET));
        assert_eq!(result.output.unwrap()[1]["result"], json!("failed"));
    }

    #[test]
    fn test_expectation_without_groups_is_vacuously_passed() {
        let evaluation = Evaluation::run(&[Silent], |e| e.verify(&0));
        assert_eq!(evaluation.status(), Status::Passed);
        assert!(evaluation.groups().is_empty());
    }

    #[test]
    fn test_no_expectations_passes() {
        let expectations: Vec<Threshold> = Vec::new();
        let result = evaluate(&(), &expectations, |e| e.verify(&0));
        assert_eq!(result.status, Status::Passed);
        assert_eq!(result.output, Some(json!([])));
    }

    #[test]
    fn test_groups_keep_expectation_order() {
        let expectations = vec![Threshold(7), Threshold(1)];
        let evaluation = Evaluation::run(&expectations, |e| e.verify(&4));
        let expected: Vec<_> = evaluation
            .groups()
            .iter()
            .map(|g| g.assertions()[0].expected.clone())
            .collect();
        assert_eq!(expected, vec![json!(7), json!(1)]);
    }

    #[test]
    fn test_reevaluation_is_idempotent() {
        let expectations = vec![Threshold(2), Threshold(9)];
        let first = Evaluation::run(&expectations, |e| e.verify(&5));
        let second = Evaluation::run(&expectations, |e| e.verify(&5));
        assert_eq!(first, second);
    }
}
