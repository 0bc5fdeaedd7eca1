//! Spread of replicated deployments across nodes
//!
//! A deployment with two or more desired replicas whose pods all landed on
//! the same node loses every replica with that node. Pods are matched to their
//! deployment by the `<deployment>-` name prefix within its namespace.

use crate::config::CheckMeta;
use crate::probe::ClusterClient;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Pod;
use kubecheck_core::{
    evaluate, AssertionGroup, CheckResult, Description, Expectation, Healthcheck,
    DEFAULT_CHECK_TIMEOUT,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Deployments with fewer desired replicas are not checked
const MIN_REPLICAS: i32 = 2;

/// Deployments and pods to check the spread of
#[derive(Debug, Clone)]
pub struct NodeSpreadContext {
    /// Deployments left after exclusion
    pub deployments: Vec<Deployment>,
    /// Pods of every namespace
    pub pods: Vec<Pod>,
}

/// Pod placement of one deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentSpread {
    /// Human-readable summary
    pub description: String,
    /// Deployment name
    pub deployment: String,
    /// Deployment namespace
    pub namespace: String,
    /// Matched pods and their nodes
    pub pods: Vec<PodPlacement>,
    /// Number of distinct nodes hosting the pods
    pub node_spread: u32,
}

/// Node a pod is scheduled on
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PodPlacement {
    /// Pod name
    pub name: String,
    /// Node name, absent for unscheduled pods
    pub node_name: Option<String>,
}

impl DeploymentSpread {
    /// Compute the placement of `deployment` from the pods of the cluster
    pub fn of(deployment: &Deployment, pods: &[Pod]) -> Self {
        let name = deployment.metadata.name.clone().unwrap_or_default();
        let namespace = deployment.metadata.namespace.clone().unwrap_or_default();
        let prefix = format!("{name}-");

        let placements: Vec<PodPlacement> = pods
            .iter()
            .filter(|pod| pod.metadata.namespace.as_deref() == Some(namespace.as_str()))
            .filter_map(|pod| {
                let pod_name = pod.metadata.name.as_deref()?;
                pod_name.starts_with(&prefix).then(|| PodPlacement {
                    name: pod_name.to_string(),
                    node_name: pod.spec.as_ref().and_then(|spec| spec.node_name.clone()),
                })
            })
            .collect();

        let nodes: BTreeSet<&str> = placements
            .iter()
            .filter_map(|p| p.node_name.as_deref())
            .collect();
        let node_spread = u32::try_from(nodes.len()).unwrap_or(u32::MAX);

        Self {
            description: format!(
                "{} pod(s) are spread across {} node(s).",
                placements.len(),
                node_spread
            ),
            deployment: name,
            namespace,
            pods: placements,
            node_spread,
        }
    }
}

fn desired_replicas(deployment: &Deployment) -> i32 {
    deployment
        .spec
        .as_ref()
        .and_then(|spec| spec.replicas)
        .unwrap_or(1)
}

/// Minimum number of distinct nodes per replicated deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSpreadMinExpectation {
    /// Fewest accepted distinct nodes
    pub min: u32,
}

impl NodeSpreadMinExpectation {
    fn verify(&self, context: &NodeSpreadContext) -> Vec<AssertionGroup> {
        let mut groups = Vec::new();

        for deployment in &context.deployments {
            let replicas = desired_replicas(deployment);
            if replicas < MIN_REPLICAS {
                continue;
            }

            let spread = DeploymentSpread::of(deployment, &context.pods);
            let passed = spread.node_spread >= self.min;

            debug!(
                namespace = %spread.namespace,
                deployment = %spread.deployment,
                replicas,
                passed,
                "{}",
                spread.description
            );

            let node_spread = spread.node_spread;
            let mut group = AssertionGroup::with_subject("NodeSpread", spread);
            group.record("Min", passed, self.min, node_spread);
            groups.push(group);
        }

        groups
    }
}

/// Expectations a node spread check can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "expect", rename_all = "snake_case")]
pub enum NodeSpreadExpectation {
    /// Minimum distinct nodes per deployment
    Min(NodeSpreadMinExpectation),
}

impl Expectation<NodeSpreadContext> for NodeSpreadExpectation {
    fn verify(&self, context: &NodeSpreadContext) -> Vec<AssertionGroup> {
        match self {
            Self::Min(e) => e.verify(context),
        }
    }
}

impl From<NodeSpreadMinExpectation> for NodeSpreadExpectation {
    fn from(e: NodeSpreadMinExpectation) -> Self {
        Self::Min(e)
    }
}

/// Expect every replicated deployment on at least `min` nodes
pub fn expect_node_spread(min: u32) -> NodeSpreadMinExpectation {
    NodeSpreadMinExpectation { min }
}

/// Deployments left out of the check
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpreadExclusions {
    /// Namespaces whose deployments are skipped
    #[serde(default)]
    pub exclude_namespaces: Vec<String>,
    /// Deployment names that are skipped
    #[serde(default)]
    pub exclude_deployments: Vec<String>,
}

impl SpreadExclusions {
    fn excludes(&self, deployment: &Deployment) -> bool {
        let namespace = deployment.metadata.namespace.as_deref().unwrap_or_default();
        let name = deployment.metadata.name.as_deref().unwrap_or_default();

        self.exclude_namespaces.iter().any(|ns| ns == namespace)
            || self.exclude_deployments.iter().any(|d| d == name)
    }
}

/// Configuration of a node spread check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpreadCheckConfig {
    /// Name, description and timeout
    #[serde(flatten)]
    pub meta: CheckMeta,
    /// Deployments left out of the check
    #[serde(flatten)]
    pub exclusions: SpreadExclusions,
    /// Expectations on each deployment
    #[serde(default)]
    pub expectations: Vec<NodeSpreadExpectation>,
}

/// Verifies that replicated deployments run on several nodes
#[derive(Debug, Clone)]
pub struct NodeSpreadCheck {
    name: String,
    description: String,
    exclusions: SpreadExclusions,
    timeout: Duration,
    expectations: Vec<NodeSpreadExpectation>,
    cluster: Arc<dyn ClusterClient>,
}

impl NodeSpreadCheck {
    /// Create a check without exclusions or expectations
    pub fn new(name: impl Into<String>, cluster: Arc<dyn ClusterClient>) -> Self {
        Self {
            name: name.into(),
            description: "Verifies that deployment replicas are spread across nodes".to_string(),
            exclusions: SpreadExclusions::default(),
            timeout: DEFAULT_CHECK_TIMEOUT,
            expectations: Vec::new(),
            cluster,
        }
    }

    /// Build a check from its configuration
    pub fn from_config(config: &NodeSpreadCheckConfig, cluster: Arc<dyn ClusterClient>) -> Self {
        let mut check = Self::new(&config.meta.name, cluster)
            .with_exclusions(config.exclusions.clone())
            .with_expectations(config.expectations.iter().copied());
        config.meta.apply(&mut check.description, &mut check.timeout);
        check
    }

    /// Replace the exclusions
    pub fn with_exclusions(mut self, exclusions: SpreadExclusions) -> Self {
        self.exclusions = exclusions;
        self
    }

    /// Append expectations
    pub fn with_expectations<I>(mut self, expectations: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<NodeSpreadExpectation>,
    {
        self.expectations
            .extend(expectations.into_iter().map(Into::into));
        self
    }
}

#[async_trait]
impl Healthcheck for NodeSpreadCheck {
    fn kind(&self) -> &'static str {
        "kubernetes-node-spread"
    }

    fn describe(&self) -> Description {
        Description::new(&self.name, &self.description)
    }

    async fn execute(&self) -> CheckResult {
        let input = &self.exclusions;
        let observation_failed = |e: kubecheck_core::Error| {
            CheckResult::observation_failed(e.to_string(), serde_json::to_value(input).ok())
        };

        let deployments = match self.cluster.list_deployments().await {
            Ok(deployments) => deployments,
            Err(e) => return observation_failed(e),
        };

        let pods = match self.cluster.list_pods(None).await {
            Ok(pods) => pods,
            Err(e) => return observation_failed(e),
        };

        let context = NodeSpreadContext {
            deployments: deployments
                .into_iter()
                .filter(|d| !self.exclusions.excludes(d))
                .collect(),
            pods,
        };

        evaluate(input, &self.expectations, |e| e.verify(&context))
    }

    fn input(&self) -> Option<Value> {
        serde_json::to_value(&self.exclusions).ok()
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}
