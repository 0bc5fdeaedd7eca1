//! Pod conditions and container health in a namespace

use super::past_grace_period;
use crate::config::CheckMeta;
use crate::probe::ClusterClient;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kubecheck_core::{
    evaluate, AssertionGroup, CheckResult, Description, Expectation, Healthcheck,
    DEFAULT_CHECK_TIMEOUT,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Which pods of a namespace are checked
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodSelection {
    /// Namespace to list pods in
    pub namespace: String,

    /// Pods younger than this are skipped
    #[serde(default, with = "humantime_serde")]
    pub grace_period: Duration,

    /// Pods whose name starts with one of these prefixes are skipped
    #[serde(default)]
    pub exclude_pods: Vec<String>,
}

impl PodSelection {
    fn includes(&self, pod: &Pod, now: DateTime<Utc>) -> bool {
        if !past_grace_period(&pod.metadata, self.grace_period, now) {
            return false;
        }

        let name = pod.metadata.name.as_deref().unwrap_or_default();
        !self.exclude_pods.iter().any(|prefix| name.starts_with(prefix.as_str()))
    }
}

/// What pod expectations are verified against
#[derive(Debug, Clone)]
pub struct PodContext {
    /// Pods that passed the selection
    pub pods: Vec<Pod>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PodSubject<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    container_name: Option<&'a str>,
    pod_name: Option<&'a str>,
    namespace: Option<&'a str>,
    created: Option<&'a Time>,
    labels: Option<&'a BTreeMap<String, String>>,
    annotations: Option<&'a BTreeMap<String, String>>,
}

impl<'a> PodSubject<'a> {
    fn of(pod: &'a Pod) -> Self {
        Self {
            container_name: None,
            pod_name: pod.metadata.name.as_deref(),
            namespace: pod.metadata.namespace.as_deref(),
            created: pod.metadata.creation_timestamp.as_ref(),
            labels: pod.metadata.labels.as_ref(),
            annotations: pod.metadata.annotations.as_ref(),
        }
    }
}

/// Every pod condition must be `True`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodStatusExpectation {}

impl PodStatusExpectation {
    fn verify(&self, context: &PodContext) -> Vec<AssertionGroup> {
        context
            .pods
            .iter()
            .map(|pod| {
                let mut group = AssertionGroup::with_subject("PodStatus", PodSubject::of(pod));
                let conditions = pod
                    .status
                    .as_ref()
                    .and_then(|status| status.conditions.as_deref())
                    .unwrap_or_default();

                for condition in conditions {
                    group.record(
                        condition.type_.as_str(),
                        condition.status == "True",
                        "True",
                        condition.status.as_str(),
                    );
                }

                group
            })
            .collect()
    }
}

/// Every container must be ready and below a restart ceiling
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerExpectation {
    /// Most accepted restarts per container, unchecked when unset
    #[serde(default)]
    pub max_restarts: Option<i32>,
}

impl ContainerExpectation {
    fn verify(&self, context: &PodContext) -> Vec<AssertionGroup> {
        let mut groups = Vec::new();

        for pod in &context.pods {
            let statuses = pod
                .status
                .as_ref()
                .and_then(|status| status.container_statuses.as_deref())
                .unwrap_or_default();

            for container in statuses {
                let subject = PodSubject {
                    container_name: Some(container.name.as_str()),
                    ..PodSubject::of(pod)
                };
                let mut group = AssertionGroup::with_subject("ContainerStatus", subject);

                group.record("Ready", container.ready, true, container.ready);

                if let Some(max) = self.max_restarts.filter(|max| *max >= 0) {
                    group.record(
                        "RestartCount",
                        container.restart_count <= max,
                        format!("<={max}"),
                        container.restart_count,
                    );
                }

                groups.push(group);
            }
        }

        groups
    }
}

/// Expectations a pod check can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "expect", rename_all = "snake_case")]
pub enum PodExpectation {
    /// Pod conditions
    Status(PodStatusExpectation),
    /// Container readiness and restarts
    Containers(ContainerExpectation),
}

impl Expectation<PodContext> for PodExpectation {
    fn verify(&self, context: &PodContext) -> Vec<AssertionGroup> {
        match self {
            Self::Status(e) => e.verify(context),
            Self::Containers(e) => e.verify(context),
        }
    }
}

impl From<PodStatusExpectation> for PodExpectation {
    fn from(e: PodStatusExpectation) -> Self {
        Self::Status(e)
    }
}

impl From<ContainerExpectation> for PodExpectation {
    fn from(e: ContainerExpectation) -> Self {
        Self::Containers(e)
    }
}

/// Expect every pod condition to be `True`
pub fn expect_pod_status_ok() -> PodStatusExpectation {
    PodStatusExpectation {}
}

/// Expect ready containers restarted at most `max` times
pub fn expect_pod_max_container_restarts(max: i32) -> ContainerExpectation {
    ContainerExpectation {
        max_restarts: Some(max),
    }
}

/// Configuration of a pod check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodCheckConfig {
    /// Name, description and timeout
    #[serde(flatten)]
    pub meta: CheckMeta,
    /// Which pods are checked
    #[serde(flatten)]
    pub selection: PodSelection,
    /// Expectations on the selected pods
    #[serde(default)]
    pub expectations: Vec<PodExpectation>,
}

/// Lists the pods of a namespace and verifies their health
#[derive(Debug, Clone)]
pub struct PodCheck {
    name: String,
    description: String,
    selection: PodSelection,
    timeout: Duration,
    expectations: Vec<PodExpectation>,
    cluster: Arc<dyn ClusterClient>,
}

impl PodCheck {
    /// Create a check without expectations
    pub fn new(
        name: impl Into<String>,
        selection: PodSelection,
        cluster: Arc<dyn ClusterClient>,
    ) -> Self {
        Self {
            name: name.into(),
            description: "Performs pod healthchecks".to_string(),
            selection,
            timeout: DEFAULT_CHECK_TIMEOUT,
            expectations: Vec::new(),
            cluster,
        }
    }

    /// Build a check from its configuration
    pub fn from_config(config: &PodCheckConfig, cluster: Arc<dyn ClusterClient>) -> Self {
        let mut check = Self::new(&config.meta.name, config.selection.clone(), cluster)
            .with_expectations(config.expectations.iter().copied());
        config.meta.apply(&mut check.description, &mut check.timeout);
        check
    }

    /// Append expectations
    pub fn with_expectations<I>(mut self, expectations: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<PodExpectation>,
    {
        self.expectations
            .extend(expectations.into_iter().map(Into::into));
        self
    }
}

#[async_trait]
impl Healthcheck for PodCheck {
    fn kind(&self) -> &'static str {
        "kubernetes-pod"
    }

    fn describe(&self) -> Description {
        Description::new(&self.name, &self.description)
    }

    async fn execute(&self) -> CheckResult {
        let input = &self.selection;

        let pods = match self.cluster.list_pods(Some(&self.selection.namespace)).await {
            Ok(pods) => pods,
            Err(e) => {
                return CheckResult::observation_failed(
                    e.to_string(),
                    serde_json::to_value(input).ok(),
                )
            }
        };

        let now = Utc::now();
        let listed = pods.len();
        let pods: Vec<Pod> = pods
            .into_iter()
            .filter(|pod| self.selection.includes(pod, now))
            .collect();

        debug!(
            namespace = %self.selection.namespace,
            listed,
            selected = pods.len(),
            "Selected pods"
        );

        let context = PodContext { pods };
        evaluate(input, &self.expectations, |e| e.verify(&context))
    }

    fn input(&self) -> Option<Value> {
        serde_json::to_value(&self.selection).ok()
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}
