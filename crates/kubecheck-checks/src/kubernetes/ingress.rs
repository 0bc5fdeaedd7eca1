//! Ingress controller infrastructure
//!
//! The ingress controller runs as a daemon set behind a service. Once both are
//! older than the grace period, the daemon set must be fully rolled out and
//! every endpoint of the service must answer its ping path.

use super::past_grace_period;
use crate::config::CheckMeta;
use crate::probe::{ClusterClient, HttpProbe};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use k8s_openapi::api::apps::v1::DaemonSet;
use k8s_openapi::api::core::v1::{Endpoints, Service};
use kubecheck_core::{
    evaluate, AssertionGroup, CheckResult, Description, Expectation, Healthcheck,
    DEFAULT_CHECK_TIMEOUT,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error};

const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(10 * 60);
const DEFAULT_MIN_REPLICAS: i32 = 2;
const DEFAULT_MIN_HEALTHY: u32 = 2;
const DEFAULT_MAX_AVERAGE_RESPONSE: Duration = Duration::from_millis(100);

fn default_grace_period() -> Duration {
    DEFAULT_GRACE_PERIOD
}

fn default_ping_path() -> String {
    "/ping".to_string()
}

fn default_min_replicas() -> i32 {
    DEFAULT_MIN_REPLICAS
}

fn default_min_healthy() -> u32 {
    DEFAULT_MIN_HEALTHY
}

fn default_max_average_response() -> Duration {
    DEFAULT_MAX_AVERAGE_RESPONSE
}

/// The daemon set and service making up the ingress controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressTarget {
    /// Namespace of the daemon set and service
    pub namespace: String,

    /// Daemon set name
    pub daemon_set: String,

    /// Service name, also the name of its endpoints
    pub service: String,

    /// Name of the endpoint port to ping
    pub service_port: String,

    /// Objects younger than this are not checked
    #[serde(default = "default_grace_period", with = "humantime_serde")]
    pub grace_period: Duration,

    /// Path requested on every endpoint
    #[serde(default = "default_ping_path")]
    pub ping_path: String,
}

impl IngressTarget {
    /// Target with the default grace period and ping path
    pub fn new(
        namespace: impl Into<String>,
        daemon_set: impl Into<String>,
        service: impl Into<String>,
        service_port: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            daemon_set: daemon_set.into(),
            service: service.into(),
            service_port: service_port.into(),
            grace_period: DEFAULT_GRACE_PERIOD,
            ping_path: default_ping_path(),
        }
    }

    /// Base URLs of every endpoint address exposing the service port
    ///
    /// Stops at the first subset lacking the port.
    pub fn endpoint_urls(&self, endpoints: &Endpoints) -> Vec<String> {
        let mut urls = Vec::new();

        for subset in endpoints.subsets.as_deref().unwrap_or_default() {
            let port = subset
                .ports
                .as_deref()
                .unwrap_or_default()
                .iter()
                .find(|p| p.name.as_deref() == Some(self.service_port.as_str()))
                .map(|p| p.port);

            let addresses = subset.addresses.as_deref().unwrap_or_default();

            let Some(port) = port else {
                let addrs: Vec<_> = addresses
                    .iter()
                    .map(|a| json!({ "ip": a.ip, "hostname": a.hostname }))
                    .collect();
                error!(
                    port = %self.service_port,
                    addresses = %serde_json::Value::from(addrs),
                    "Failed to locate service port in the endpoint subset"
                );
                break;
            };

            let scheme = if port == 443 || self.service_port.starts_with("https") {
                "https"
            } else {
                "http"
            };

            urls.extend(
                addresses
                    .iter()
                    .map(|a| format!("{scheme}://{}:{port}", a.ip)),
            );
        }

        urls
    }
}

/// Outcome of pinging one endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ping {
    /// Endpoint host
    pub host: String,
    /// Endpoint port
    pub port: u16,
    /// Response status, 0 when the request failed
    pub status: u16,
    /// Time until the response arrived
    pub elapsed: Duration,
}

impl Ping {
    /// Whether the endpoint answered 200
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// What ingress expectations are verified against
#[derive(Debug, Clone)]
pub struct IngressContext {
    /// Checked target
    pub target: IngressTarget,
    /// The controller daemon set
    pub daemon_set: DaemonSet,
    /// The controller service
    pub service: Service,
    /// Endpoint pings, absent while the service is in its grace period
    pub pings: Option<Vec<Ping>>,
    /// When the objects were fetched
    pub observed_at: DateTime<Utc>,
}

/// The daemon set must be fully rolled out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonSetExpectation {
    /// Floor for the desired, ready and available counters
    #[serde(default = "default_min_replicas")]
    pub min_replicas: i32,
}

impl Default for DaemonSetExpectation {
    fn default() -> Self {
        Self {
            min_replicas: DEFAULT_MIN_REPLICAS,
        }
    }
}

impl DaemonSetExpectation {
    fn verify(&self, context: &IngressContext) -> Vec<AssertionGroup> {
        let daemon_set = &context.daemon_set;
        let mut group = AssertionGroup::with_subject("DaemonSet", &daemon_set.metadata.name);

        if !past_grace_period(&daemon_set.metadata, context.target.grace_period, context.observed_at) {
            return vec![group];
        }

        let status = daemon_set.status.clone().unwrap_or_default();
        let desired = status.desired_number_scheduled;
        let floor = self.min_replicas;
        let at_least = format!(">={floor}");

        group.record(
            "CurrentNumberScheduled",
            status.current_number_scheduled == desired,
            desired,
            status.current_number_scheduled,
        );
        group.record(
            "NumberMisscheduled",
            status.number_misscheduled == 0,
            0,
            status.number_misscheduled,
        );
        group.record(
            "DesiredNumberScheduled",
            desired >= floor,
            at_least.as_str(),
            desired,
        );
        group.record(
            "NumberReady",
            status.number_ready >= floor,
            at_least.as_str(),
            status.number_ready,
        );

        let available = status.number_available.unwrap_or(0);
        group.record("NumberAvailable", available >= floor, at_least.as_str(), available);

        let unavailable = status.number_unavailable.unwrap_or(0);
        group.record("NumberUnavailable", unavailable == 0, 0, unavailable);

        let updated = status.updated_number_scheduled.unwrap_or(0);
        group.record("UpdatedNumberScheduled", updated == desired, desired, updated);

        vec![group]
    }
}

/// The service endpoints must answer quickly enough
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointsExpectation {
    /// Fewest accepted healthy endpoints
    #[serde(default = "default_min_healthy")]
    pub min_healthy: u32,

    /// Longest accepted average ping time of the healthy endpoints
    #[serde(default = "default_max_average_response", with = "humantime_serde")]
    pub max_average_response: Duration,
}

impl Default for EndpointsExpectation {
    fn default() -> Self {
        Self {
            min_healthy: DEFAULT_MIN_HEALTHY,
            max_average_response: DEFAULT_MAX_AVERAGE_RESPONSE,
        }
    }
}

impl EndpointsExpectation {
    fn verify(&self, context: &IngressContext) -> Vec<AssertionGroup> {
        let mut group = AssertionGroup::with_subject("ServiceEndpoints", &context.service.metadata.name);

        let Some(pings) = &context.pings else {
            return vec![group];
        };

        for ping in pings {
            group.record(
                format!("PingOK_{}:{}", ping.host, ping.port),
                ping.is_ok(),
                200,
                ping.status,
            );
        }

        let healthy: Vec<&Ping> = pings.iter().filter(|p| p.is_ok()).collect();
        let healthy_count = u32::try_from(healthy.len()).unwrap_or(u32::MAX);
        group.record(
            "Reachable",
            healthy_count >= self.min_healthy,
            format!(">={}", self.min_healthy),
            healthy_count,
        );

        let total: Duration = healthy.iter().map(|p| p.elapsed).sum();
        if healthy_count > 0 && !total.is_zero() {
            let average = total / healthy_count;
            group.record(
                "PingAverageResponseTime",
                average <= self.max_average_response,
                format!("<={:?}", self.max_average_response),
                format!("{average:?}"),
            );
        }

        vec![group]
    }
}

/// Expectations an ingress check can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "expect", rename_all = "snake_case")]
pub enum IngressExpectation {
    /// Daemon set rollout
    DaemonSet(DaemonSetExpectation),
    /// Endpoint reachability
    Endpoints(EndpointsExpectation),
}

impl IngressExpectation {
    /// Both expectations with their default thresholds
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::DaemonSet(DaemonSetExpectation::default()),
            Self::Endpoints(EndpointsExpectation::default()),
        ]
    }
}

impl Expectation<IngressContext> for IngressExpectation {
    fn verify(&self, context: &IngressContext) -> Vec<AssertionGroup> {
        match self {
            Self::DaemonSet(e) => e.verify(context),
            Self::Endpoints(e) => e.verify(context),
        }
    }
}

impl From<DaemonSetExpectation> for IngressExpectation {
    fn from(e: DaemonSetExpectation) -> Self {
        Self::DaemonSet(e)
    }
}

impl From<EndpointsExpectation> for IngressExpectation {
    fn from(e: EndpointsExpectation) -> Self {
        Self::Endpoints(e)
    }
}

/// Configuration of an ingress check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngressCheckConfig {
    /// Name, description and timeout
    #[serde(flatten)]
    pub meta: CheckMeta,
    /// Daemon set and service to check
    #[serde(flatten)]
    pub target: IngressTarget,
    /// Expectations, both defaults when omitted
    #[serde(default = "IngressExpectation::defaults")]
    pub expectations: Vec<IngressExpectation>,
}

/// Verifies the ingress controller daemon set and pings its endpoints
#[derive(Debug, Clone)]
pub struct IngressCheck {
    name: String,
    description: String,
    target: IngressTarget,
    timeout: Duration,
    expectations: Vec<IngressExpectation>,
    // Still carrying the defaults set by `new`
    default_expectations: bool,
    cluster: Arc<dyn ClusterClient>,
    http: Arc<dyn HttpProbe>,
}

impl IngressCheck {
    /// Create a check carrying the default expectations
    pub fn new(
        name: impl Into<String>,
        target: IngressTarget,
        cluster: Arc<dyn ClusterClient>,
        http: Arc<dyn HttpProbe>,
    ) -> Self {
        Self {
            name: name.into(),
            description: "Performs ingress controller healthchecks".to_string(),
            target,
            timeout: DEFAULT_CHECK_TIMEOUT,
            expectations: IngressExpectation::defaults(),
            default_expectations: true,
            cluster,
            http,
        }
    }

    /// Build a check from its configuration
    pub fn from_config(
        config: &IngressCheckConfig,
        cluster: Arc<dyn ClusterClient>,
        http: Arc<dyn HttpProbe>,
    ) -> Self {
        let mut check = Self::new(&config.meta.name, config.target.clone(), cluster, http);
        check.expectations = config.expectations.clone();
        check.default_expectations = false;
        config.meta.apply(&mut check.description, &mut check.timeout);
        check
    }

    /// Append expectations
    ///
    /// The first call replaces the defaults carried by [`IngressCheck::new`].
    pub fn with_expectations<I>(mut self, expectations: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<IngressExpectation>,
    {
        if std::mem::take(&mut self.default_expectations) {
            self.expectations.clear();
        }
        self.expectations
            .extend(expectations.into_iter().map(Into::into));
        self
    }

    /// Configured expectations
    pub fn expectations(&self) -> &[IngressExpectation] {
        &self.expectations
    }

    async fn ping(&self, base: String) -> Ping {
        let (host, port) = url::Url::parse(&base)
            .map(|u| {
                (
                    u.host_str().unwrap_or_default().to_string(),
                    u.port_or_known_default().unwrap_or_default(),
                )
            })
            .unwrap_or_default();

        let start = Instant::now();
        let status = match self.http.get(&format!("{base}{}", self.target.ping_path)).await {
            Ok(response) => response.status,
            Err(e) => {
                debug!(endpoint = %base, error = %e, "Ping failed");
                0
            }
        };

        Ping {
            host,
            port,
            status,
            elapsed: start.elapsed(),
        }
    }
}

#[async_trait]
impl Healthcheck for IngressCheck {
    fn kind(&self) -> &'static str {
        "kubernetes-ingress"
    }

    fn describe(&self) -> Description {
        Description::new(&self.name, &self.description)
    }

    async fn execute(&self) -> CheckResult {
        let target = &self.target;
        let observation_failed = |e: kubecheck_core::Error| {
            CheckResult::observation_failed(e.to_string(), serde_json::to_value(target).ok())
        };

        let daemon_set = match self
            .cluster
            .get_daemon_set(&target.namespace, &target.daemon_set)
            .await
        {
            Ok(daemon_set) => daemon_set,
            Err(e) => return observation_failed(e),
        };

        let service = match self.cluster.get_service(&target.namespace, &target.service).await {
            Ok(service) => service,
            Err(e) => return observation_failed(e),
        };

        let endpoints = match self.cluster.get_endpoints(&target.namespace, &target.service).await {
            Ok(endpoints) => endpoints,
            Err(e) => return observation_failed(e),
        };

        let observed_at = Utc::now();
        let pings = if past_grace_period(&service.metadata, target.grace_period, observed_at) {
            let urls = target.endpoint_urls(&endpoints);
            debug!(service = %target.service, endpoints = urls.len(), "Pinging endpoints");
            Some(join_all(urls.into_iter().map(|url| self.ping(url))).await)
        } else {
            None
        };

        let context = IngressContext {
            target: target.clone(),
            daemon_set,
            service,
            pings,
            observed_at,
        };

        evaluate(target, &self.expectations, |e| e.verify(&context))
    }

    fn input(&self) -> Option<Value> {
        serde_json::to_value(&self.target).ok()
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}
