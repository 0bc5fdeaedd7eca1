//! Cluster node count and readiness

use super::past_grace_period;
use crate::config::CheckMeta;
use crate::probe::ClusterClient;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::Node;
use kubecheck_core::{
    AssertionGroup, CheckResult, Description, Evaluation, Expectation, Healthcheck,
    DEFAULT_CHECK_TIMEOUT,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// What node expectations are verified against
#[derive(Debug, Clone)]
pub struct NodeContext {
    /// Every node of the cluster
    pub nodes: Vec<Node>,
    /// When the nodes were listed
    pub observed_at: DateTime<Utc>,
}

/// Bounds on the number of nodes
///
/// Equal bounds require an exact count, a single bound is a floor or a
/// ceiling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeCountExpectation {
    /// Fewest accepted nodes
    #[serde(default)]
    pub min: Option<u32>,
    /// Most accepted nodes
    #[serde(default)]
    pub max: Option<u32>,
}

impl NodeCountExpectation {
    /// Exactly `count` nodes
    pub fn exact(count: u32) -> Self {
        Self::range(count, count)
    }

    /// Between `min` and `max` nodes, inclusive
    pub fn range(min: u32, max: u32) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    /// At least `min` nodes
    pub fn at_least(min: u32) -> Self {
        Self {
            min: Some(min),
            max: None,
        }
    }

    /// At most `max` nodes
    pub fn at_most(max: u32) -> Self {
        Self {
            min: None,
            max: Some(max),
        }
    }

    /// Whether the bounds describe a non-empty range
    pub fn is_consistent(&self) -> bool {
        match (self.min, self.max) {
            (Some(min), Some(max)) => min <= max,
            _ => true,
        }
    }

    fn verify(&self, context: &NodeContext) -> Vec<AssertionGroup> {
        let mut group = AssertionGroup::new("NodeCount");
        let count = u32::try_from(context.nodes.len()).unwrap_or(u32::MAX);

        match (self.min, self.max) {
            (Some(min), Some(max)) if min == max => {
                group.record("Equals", count == min, min, count);
            }
            (Some(min), Some(max)) => {
                group.record(
                    "InRange",
                    (min..=max).contains(&count),
                    format!("min={min} max={max}"),
                    count,
                );
            }
            (None, Some(max)) => {
                group.record("Max", count <= max, format!("<={max}"), count);
            }
            (min, None) => {
                let min = min.unwrap_or(0);
                group.record("Min", count >= min, format!(">={min}"), count);
            }
        }

        vec![group]
    }
}

/// Readiness of every node older than the grace period
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStatusExpectation {
    /// Nodes younger than this are not checked
    #[serde(default, with = "humantime_serde")]
    pub grace_period: Duration,
}

impl NodeStatusExpectation {
    fn verify(&self, context: &NodeContext) -> Vec<AssertionGroup> {
        context
            .nodes
            .iter()
            .filter(|node| past_grace_period(&node.metadata, self.grace_period, context.observed_at))
            .map(|node| {
                let mut group = AssertionGroup::with_subject("NodeStatus", &node.metadata.name);
                let conditions = node
                    .status
                    .as_ref()
                    .and_then(|status| status.conditions.as_deref())
                    .unwrap_or_default();

                for condition in conditions {
                    let expected = if condition.type_ == "Ready" { "True" } else { "False" };
                    group.record(
                        condition.type_.as_str(),
                        condition.status == expected,
                        expected,
                        condition.status.as_str(),
                    );
                }

                group
            })
            .collect()
    }
}

/// Expectations a node check can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "expect", rename_all = "snake_case")]
pub enum NodeExpectation {
    /// Node count bounds
    Count(NodeCountExpectation),
    /// Node readiness
    Status(NodeStatusExpectation),
}

impl Expectation<NodeContext> for NodeExpectation {
    fn verify(&self, context: &NodeContext) -> Vec<AssertionGroup> {
        match self {
            Self::Count(e) => e.verify(context),
            Self::Status(e) => e.verify(context),
        }
    }
}

impl From<NodeCountExpectation> for NodeExpectation {
    fn from(e: NodeCountExpectation) -> Self {
        Self::Count(e)
    }
}

impl From<NodeStatusExpectation> for NodeExpectation {
    fn from(e: NodeStatusExpectation) -> Self {
        Self::Status(e)
    }
}

/// Expect exactly `count` nodes
pub fn expect_node_count(count: u32) -> NodeCountExpectation {
    NodeCountExpectation::exact(count)
}

/// Expect between `min` and `max` nodes
pub fn expect_node_count_range(min: u32, max: u32) -> NodeCountExpectation {
    NodeCountExpectation::range(min, max)
}

/// Expect at least `min` nodes
pub fn expect_node_count_min(min: u32) -> NodeCountExpectation {
    NodeCountExpectation::at_least(min)
}

/// Expect at most `max` nodes
pub fn expect_node_count_max(max: u32) -> NodeCountExpectation {
    NodeCountExpectation::at_most(max)
}

/// Expect every node older than `grace_period` to be ready
pub fn expect_node_status_ok(grace_period: Duration) -> NodeStatusExpectation {
    NodeStatusExpectation { grace_period }
}

/// Configuration of a node check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeCheckConfig {
    /// Name, description and timeout
    #[serde(flatten)]
    pub meta: CheckMeta,
    /// Expectations on the node list
    #[serde(default)]
    pub expectations: Vec<NodeExpectation>,
}

/// Lists the cluster nodes and verifies their count and readiness
#[derive(Debug, Clone)]
pub struct NodeCheck {
    name: String,
    description: String,
    timeout: Duration,
    expectations: Vec<NodeExpectation>,
    cluster: Arc<dyn ClusterClient>,
}

impl NodeCheck {
    /// Create a check without expectations
    pub fn new(name: impl Into<String>, cluster: Arc<dyn ClusterClient>) -> Self {
        Self {
            name: name.into(),
            description: "Performs Kubernetes node healthchecks".to_string(),
            timeout: DEFAULT_CHECK_TIMEOUT,
            expectations: Vec::new(),
            cluster,
        }
    }

    /// Build a check from its configuration
    pub fn from_config(config: &NodeCheckConfig, cluster: Arc<dyn ClusterClient>) -> Self {
        let mut check =
            Self::new(&config.meta.name, cluster).with_expectations(config.expectations.iter().copied());
        config.meta.apply(&mut check.description, &mut check.timeout);
        check
    }

    /// Append expectations
    pub fn with_expectations<I>(mut self, expectations: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<NodeExpectation>,
    {
        self.expectations
            .extend(expectations.into_iter().map(Into::into));
        self
    }
}

#[async_trait]
impl Healthcheck for NodeCheck {
    fn kind(&self) -> &'static str {
        "kubernetes-node"
    }

    fn describe(&self) -> Description {
        Description::new(&self.name, &self.description)
    }

    async fn execute(&self) -> CheckResult {
        let nodes = match self.cluster.list_nodes().await {
            Ok(nodes) => nodes,
            Err(e) => return CheckResult::observation_failed(e.to_string(), None),
        };

        let context = NodeContext {
            nodes,
            observed_at: Utc::now(),
        };

        Evaluation::run(&self.expectations, |e| e.verify(&context)).into_result(None)
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}
