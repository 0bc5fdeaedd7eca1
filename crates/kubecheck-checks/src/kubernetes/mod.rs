//! Kubernetes healthchecks
//!
//! All cluster checks share one [`KubeCluster`] client built at startup. The
//! checks only read from the API.

pub mod ingress;
pub mod node;
pub mod node_spread;
pub mod pod;

pub use ingress::{IngressCheck, IngressCheckConfig, IngressExpectation};
pub use node::{NodeCheck, NodeCheckConfig, NodeExpectation};
pub use node_spread::{NodeSpreadCheck, NodeSpreadCheckConfig, NodeSpreadExpectation};
pub use pod::{PodCheck, PodCheckConfig, PodExpectation};

use crate::probe::ClusterClient;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment};
use k8s_openapi::api::core::v1::{Endpoints, Node, Pod, Service};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, ListParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use kubecheck_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// How to reach the Kubernetes API
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KubernetesConnection {
    /// Use the in-cluster service account
    #[serde(default)]
    pub in_cluster: bool,

    /// Explicit kubeconfig path; the default lookup applies when unset
    #[serde(default)]
    pub kubeconfig: Option<PathBuf>,
}

/// [`ClusterClient`] backed by a `kube` client
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl std::fmt::Debug for KubeCluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeCluster")
            .field("default_namespace", &self.client.default_namespace())
            .finish()
    }
}

impl KubeCluster {
    /// Connect using the given connection settings
    pub async fn connect(connection: &KubernetesConnection) -> Result<Self> {
        let config = if connection.in_cluster {
            info!("Using in-cluster Kubernetes configuration");
            Config::incluster()
                .map_err(|e| Error::Kubernetes(format!("Failed to load in-cluster config: {e}")))?
        } else if let Some(path) = &connection.kubeconfig {
            info!(path = %path.display(), "Using kubeconfig");
            let kubeconfig = Kubeconfig::read_from(path)
                .map_err(|e| Error::Kubernetes(format!("Failed to read kubeconfig: {e}")))?;
            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .map_err(|e| Error::Kubernetes(format!("Failed to load kubeconfig: {e}")))?
        } else {
            Config::infer()
                .await
                .map_err(|e| Error::Kubernetes(format!("Failed to infer K8s config: {e}")))?
        };

        let client = Client::try_from(config)
            .map_err(|e| Error::Kubernetes(format!("Failed to create K8s client: {e}")))?;

        Ok(Self { client })
    }

    /// Wrap an existing client
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ClusterClient for KubeCluster {
    async fn list_nodes(&self) -> Result<Vec<Node>> {
        let nodes: Api<Node> = Api::all(self.client.clone());
        let list = nodes
            .list(&ListParams::default())
            .await
            .map_err(|e| Error::Kubernetes(format!("Failed to list nodes: {e}")))?;

        debug!(count = list.items.len(), "Listed nodes");
        Ok(list.items)
    }

    async fn list_pods(&self, namespace: Option<&str>) -> Result<Vec<Pod>> {
        let pods: Api<Pod> = match namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        };
        let list = pods
            .list(&ListParams::default())
            .await
            .map_err(|e| Error::Kubernetes(format!("Failed to list pods: {e}")))?;

        debug!(namespace = ?namespace, count = list.items.len(), "Listed pods");
        Ok(list.items)
    }

    async fn list_deployments(&self) -> Result<Vec<Deployment>> {
        let deployments: Api<Deployment> = Api::all(self.client.clone());
        let list = deployments
            .list(&ListParams::default())
            .await
            .map_err(|e| Error::Kubernetes(format!("Failed to list deployments: {e}")))?;

        debug!(count = list.items.len(), "Listed deployments");
        Ok(list.items)
    }

    async fn get_daemon_set(&self, namespace: &str, name: &str) -> Result<DaemonSet> {
        Api::<DaemonSet>::namespaced(self.client.clone(), namespace)
            .get(name)
            .await
            .map_err(|e| Error::Kubernetes(format!("Failed to get daemon set: {e}")))
    }

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Service> {
        Api::<Service>::namespaced(self.client.clone(), namespace)
            .get(name)
            .await
            .map_err(|e| Error::Kubernetes(format!("Failed to get service: {e}")))
    }

    async fn get_endpoints(&self, namespace: &str, name: &str) -> Result<Endpoints> {
        Api::<Endpoints>::namespaced(self.client.clone(), namespace)
            .get(name)
            .await
            .map_err(|e| Error::Kubernetes(format!("Failed to get endpoints: {e}")))
    }
}

/// Whether an object is older than `grace` at `now`
///
/// Objects without a creation timestamp count as old.
pub(crate) fn past_grace_period(meta: &ObjectMeta, grace: Duration, now: DateTime<Utc>) -> bool {
    let Some(created) = &meta.creation_timestamp else {
        return true;
    };

    chrono::Duration::from_std(grace)
        .ok()
        .and_then(|grace| created.0.checked_add_signed(grace))
        .map_or(false, |end| now > end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::meta;

    #[test]
    fn test_grace_period() {
        let now = Utc::now();
        let young = meta("young", None, now - chrono::Duration::minutes(2));
        let old = meta("old", None, now - chrono::Duration::minutes(20));
        let grace = Duration::from_secs(600);

        assert!(!past_grace_period(&young, grace, now));
        assert!(past_grace_period(&old, grace, now));
        assert!(past_grace_period(&young, Duration::ZERO, now));
    }

    #[test]
    fn test_missing_creation_timestamp_counts_as_old() {
        assert!(past_grace_period(&ObjectMeta::default(), Duration::from_secs(600), Utc::now()));
    }

    #[test]
    fn test_connection_defaults() {
        let connection = KubernetesConnection::default();
        assert!(!connection.in_cluster);
        assert!(connection.kubeconfig.is_none());
    }
}
