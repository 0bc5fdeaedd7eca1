//! Check runner
//!
//! Executes a batch of checks with bounded concurrency and collects one
//! mapped entry per check name.

use crate::hooks::Hooks;
use futures::stream::{self, StreamExt};
use kubecheck_config::RunnerConfig;
use kubecheck_core::{CheckResult, Description, Error, Healthcheck, LifecycleEvent};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Runs healthchecks and reports lifecycle events
#[derive(Debug, Clone)]
pub struct Runner {
    max_concurrency: usize,
    hooks: Hooks,
}

impl Runner {
    /// Create a runner executing at most `max_concurrency` checks at once
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            max_concurrency: max_concurrency.max(1),
            hooks: Hooks::new(),
        }
    }

    /// Create a runner from configuration
    pub fn from_config(config: &RunnerConfig) -> Self {
        Self::new(config.max_concurrency)
    }

    /// Notify `hooks` on lifecycle events
    pub fn with_hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Registered hooks
    pub fn hooks(&self) -> &Hooks {
        &self.hooks
    }

    /// Run every check and map each result under the check's name
    ///
    /// Later checks overwrite earlier ones sharing a name.
    pub async fn run<R, F>(&self, checks: &[Arc<dyn Healthcheck>], mapper: F) -> HashMap<String, R>
    where
        F: Fn(&Description, &CheckResult) -> R,
    {
        self.run_cancellable(checks, mapper, &CancellationToken::new())
            .await
    }

    /// Like [`Runner::run`], stopping early once `cancel` fires
    ///
    /// Checks still in flight at cancellation are dropped and missing from
    /// the returned mapping. A cancelled run does not fire
    /// [`LifecycleEvent::Completed`].
    pub async fn run_cancellable<R, F>(
        &self,
        checks: &[Arc<dyn Healthcheck>],
        mapper: F,
        cancel: &CancellationToken,
    ) -> HashMap<String, R>
    where
        F: Fn(&Description, &CheckResult) -> R,
    {
        let mut results = HashMap::with_capacity(checks.len());

        self.hooks.notify(LifecycleEvent::Started);

        let mut executions = stream::iter(checks.iter().cloned().enumerate())
            .map(|(index, check)| async move { (index, execute(check).await) })
            .buffer_unordered(self.max_concurrency)
            // Type-erased so rustc can prove the enclosing future `Send`
            .boxed();

        // Completion order is arbitrary, insertion follows check order so
        // duplicate names resolve deterministically.
        let mut completed: Vec<Option<(Description, CheckResult)>> = vec![None; checks.len()];

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    info!(
                        completed = completed.iter().flatten().count(),
                        total = checks.len(),
                        "Healthcheck run cancelled"
                    );
                    for (description, result) in completed.iter().flatten() {
                        results.insert(description.name.clone(), mapper(description, result));
                    }
                    return results;
                }

                next = executions.next() => match next {
                    Some((index, outcome)) => completed[index] = Some(outcome),
                    None => break,
                },
            }
        }

        for (description, result) in completed.iter().flatten() {
            results.insert(description.name.clone(), mapper(description, result));
        }

        self.hooks.notify(LifecycleEvent::Completed);

        results
    }
}

async fn execute(check: Arc<dyn Healthcheck>) -> (Description, CheckResult) {
    let kind = check.kind();
    let description = check.describe();
    let limit = check.timeout();

    let result = match timeout(limit, check.execute()).await {
        Ok(result) => result,
        Err(_) => {
            CheckResult::observation_failed(Error::Timeout(limit).to_string(), check.input())
        }
    };

    if result.is_failed() {
        warn!(
            kind = kind,
            name = %description.name,
            description = %description.description,
            status = %result.status,
            reason = result.reason.as_deref().unwrap_or_default(),
            input = ?result.input,
            output = ?result.output,
            "Healthcheck failed"
        );
    } else {
        debug!(
            kind = kind,
            name = %description.name,
            description = %description.description,
            status = %result.status,
            input = ?result.input,
            output = ?result.output,
            "Healthcheck passed"
        );
    }

    (description, result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::LifecycleHook;
    use async_trait::async_trait;
    use kubecheck_core::{Result, Status};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Debug, Default)]
    struct Gauge {
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    #[derive(Debug)]
    struct SleepyCheck {
        name: String,
        delay: Duration,
        timeout: Duration,
        pass: bool,
        gauge: Option<Arc<Gauge>>,
    }

    impl SleepyCheck {
        fn new(name: &str, delay: Duration) -> Self {
            Self {
                name: name.to_string(),
                delay,
                timeout: Duration::from_secs(120),
                pass: true,
                gauge: None,
            }
        }

        fn failing(mut self) -> Self {
            self.pass = false;
            self
        }

        fn timeout(mut self, timeout: Duration) -> Self {
            self.timeout = timeout;
            self
        }

        fn gauge(mut self, gauge: Arc<Gauge>) -> Self {
            self.gauge = Some(gauge);
            self
        }

        fn boxed(self) -> Arc<dyn Healthcheck> {
            Arc::new(self)
        }
    }

    #[async_trait]
    impl Healthcheck for SleepyCheck {
        fn kind(&self) -> &'static str {
            "sleepy"
        }

        fn describe(&self) -> Description {
            Description::new(&self.name, format!("Sleeps for {:?}", self.delay))
        }

        async fn execute(&self) -> CheckResult {
            if let Some(gauge) = &self.gauge {
                let now = gauge.current.fetch_add(1, Ordering::SeqCst) + 1;
                gauge.peak.fetch_max(now, Ordering::SeqCst);
            }

            tokio::time::sleep(self.delay).await;

            if let Some(gauge) = &self.gauge {
                gauge.current.fetch_sub(1, Ordering::SeqCst);
            }

            if self.pass {
                CheckResult::passed(None, None)
            } else {
                CheckResult::failed("Expectations not met", None, None)
            }
        }

        fn input(&self) -> Option<Value> {
            Some(json!({ "name": self.name, "delay": format!("{:?}", self.delay) }))
        }

        fn timeout(&self) -> Duration {
            self.timeout
        }
    }

    #[derive(Debug, Default)]
    struct RecordingHook {
        events: Mutex<Vec<LifecycleEvent>>,
    }

    impl RecordingHook {
        fn events(&self) -> Vec<LifecycleEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LifecycleHook for RecordingHook {
        fn name(&self) -> &str {
            "recording"
        }

        fn subscribes_to(&self, _event: LifecycleEvent) -> bool {
            true
        }

        async fn notify(&self, event: LifecycleEvent) -> Result<()> {
            self.events.lock().unwrap().push(event);
            Ok(())
        }
    }

    fn status(description: &Description, result: &CheckResult) -> (String, Status) {
        (description.description.clone(), result.status)
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_entry_per_check() {
        let checks = vec![
            SleepyCheck::new("a", Duration::from_millis(30)).boxed(),
            SleepyCheck::new("b", Duration::from_millis(10)).failing().boxed(),
            SleepyCheck::new("c", Duration::from_millis(20)).boxed(),
        ];

        let results = Runner::new(8).run(&checks, status).await;

        assert_eq!(results.len(), 3);
        assert_eq!(results["a"].1, Status::Passed);
        assert_eq!(results["b"].1, Status::Failed);
        assert_eq!(results["c"].1, Status::Passed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_names_keep_last() {
        let checks = vec![
            SleepyCheck::new("dup", Duration::from_millis(50)).boxed(),
            SleepyCheck::new("dup", Duration::from_millis(5)).failing().boxed(),
        ];

        let results = Runner::new(8).run(&checks, status).await;

        assert_eq!(results.len(), 1);
        assert_eq!(results["dup"].1, Status::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_batch() {
        let results = Runner::new(1).run(&[], status).await;
        assert!(results.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_a_failed_result() {
        let checks = vec![SleepyCheck::new("slow", Duration::from_secs(60))
            .timeout(Duration::from_secs(1))
            .boxed()];

        let results = Runner::new(8)
            .run(&checks, |_, result| result.clone())
            .await;

        let result = &results["slow"];
        assert_eq!(result.status, Status::Failed);
        assert_eq!(result.reason.as_deref(), Some("healthcheck timed out after 1s"));
        assert_eq!(result.input, Some(json!({"name": "slow", "delay": "60s"})));
        assert!(result.output.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_without_input() {
        #[derive(Debug)]
        struct Stuck;

        #[async_trait]
        impl Healthcheck for Stuck {
            fn kind(&self) -> &'static str {
                "stuck"
            }

            fn describe(&self) -> Description {
                Description::new("stuck", "Never finishes")
            }

            async fn execute(&self) -> CheckResult {
                std::future::pending().await
            }

            fn timeout(&self) -> Duration {
                Duration::from_millis(500)
            }
        }

        let checks: Vec<Arc<dyn Healthcheck>> = vec![Arc::new(Stuck)];
        let results = Runner::new(1).run(&checks, |_, result| result.clone()).await;

        let result = &results["stuck"];
        assert!(result.is_failed());
        assert_eq!(result.reason.as_deref(), Some("healthcheck timed out after 500ms"));
        assert!(result.input.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_is_bounded() {
        let gauge = Arc::new(Gauge::default());
        let checks: Vec<_> = (0..6)
            .map(|i| {
                SleepyCheck::new(&format!("check-{i}"), Duration::from_millis(10))
                    .gauge(Arc::clone(&gauge))
                    .boxed()
            })
            .collect();

        let results = Runner::new(2).run(&checks, status).await;

        assert_eq!(results.len(), 6);
        assert_eq!(gauge.peak.load(Ordering::SeqCst), 2);
        assert_eq!(gauge.current.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lifecycle_events_in_order() {
        let hook = Arc::new(RecordingHook::default());
        let runner = Runner::new(4).with_hooks(Hooks::new().register(hook.clone()));
        let checks = vec![SleepyCheck::new("a", Duration::from_millis(10)).boxed()];

        runner.run(&checks, status).await;
        runner.hooks().drain().await;

        assert_eq!(
            hook.events(),
            vec![LifecycleEvent::Started, LifecycleEvent::Completed]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_run_omits_in_flight_checks() {
        let hook = Arc::new(RecordingHook::default());
        let runner = Runner::new(4).with_hooks(Hooks::new().register(hook.clone()));
        let checks = vec![
            SleepyCheck::new("fast", Duration::from_millis(10)).boxed(),
            SleepyCheck::new("stuck", Duration::from_secs(60)).boxed(),
        ];
        let cancel = CancellationToken::new();

        let (results, ()) = tokio::join!(
            runner.run_cancellable(&checks, status, &cancel),
            async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                cancel.cancel();
            }
        );
        runner.hooks().drain().await;

        assert_eq!(results.len(), 1);
        assert!(results.contains_key("fast"));
        assert_eq!(hook.events(), vec![LifecycleEvent::Started]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_cancelled_run_is_empty() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let checks = vec![SleepyCheck::new("a", Duration::from_millis(10)).boxed()];

        let results = Runner::new(4).run_cancellable(&checks, status, &cancel).await;
        assert!(results.is_empty());
    }
}
