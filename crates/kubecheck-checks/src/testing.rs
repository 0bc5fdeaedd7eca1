//! Fake probe collaborators and Kubernetes object builders for tests

use crate::probe::{ClusterClient, HttpProbe, HttpResponse, RandomSource, Resolver};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    ContainerStatus, Endpoints, Node, NodeCondition, NodeStatus, Pod, PodCondition, PodSpec,
    PodStatus, Service,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use kubecheck_core::{Error, Result};
use std::collections::HashMap;

pub(crate) fn meta(name: &str, namespace: Option<&str>, created: DateTime<Utc>) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: namespace.map(str::to_string),
        creation_timestamp: Some(Time(created)),
        ..Default::default()
    }
}

pub(crate) fn node(name: &str, created: DateTime<Utc>, conditions: &[(&str, &str)]) -> Node {
    Node {
        metadata: meta(name, None, created),
        status: Some(NodeStatus {
            conditions: Some(
                conditions
                    .iter()
                    .map(|(type_, status)| NodeCondition {
                        type_: type_.to_string(),
                        status: status.to_string(),
                        ..Default::default()
                    })
                    .collect(),
            ),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub(crate) fn pod(name: &str, namespace: &str, node_name: Option<&str>, created: DateTime<Utc>) -> Pod {
    Pod {
        metadata: meta(name, Some(namespace), created),
        spec: Some(PodSpec {
            node_name: node_name.map(str::to_string),
            ..Default::default()
        }),
        status: Some(PodStatus::default()),
    }
}

pub(crate) fn with_pod_conditions(mut pod: Pod, conditions: &[(&str, &str)]) -> Pod {
    let status = pod.status.get_or_insert_with(Default::default);
    status.conditions = Some(
        conditions
            .iter()
            .map(|(type_, status)| PodCondition {
                type_: type_.to_string(),
                status: status.to_string(),
                ..Default::default()
            })
            .collect(),
    );
    pod
}

pub(crate) fn with_container(mut pod: Pod, name: &str, ready: bool, restarts: i32) -> Pod {
    let status = pod.status.get_or_insert_with(Default::default);
    status
        .container_statuses
        .get_or_insert_with(Vec::new)
        .push(ContainerStatus {
            name: name.to_string(),
            ready,
            restart_count: restarts,
            ..Default::default()
        });
    pod
}

pub(crate) fn deployment(name: &str, namespace: &str, replicas: i32) -> Deployment {
    Deployment {
        metadata: meta(name, Some(namespace), Utc::now()),
        spec: Some(DeploymentSpec {
            replicas: Some(replicas),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// HTTP probe answering from a fixed table keyed by URL
#[derive(Debug, Default)]
pub(crate) struct FakeHttp {
    responses: HashMap<String, std::result::Result<HttpResponse, String>>,
}

impl FakeHttp {
    pub(crate) fn respond(mut self, url: &str, response: HttpResponse) -> Self {
        self.responses.insert(url.to_string(), Ok(response));
        self
    }

    pub(crate) fn fail(mut self, url: &str, error: &str) -> Self {
        self.responses.insert(url.to_string(), Err(error.to_string()));
        self
    }
}

#[async_trait]
impl HttpProbe for FakeHttp {
    async fn get(&self, url: &str) -> Result<HttpResponse> {
        match self.responses.get(url) {
            Some(Ok(response)) => Ok(response.clone()),
            Some(Err(error)) => Err(Error::Http(error.clone())),
            None => Err(Error::Http(format!("connection refused: {url}"))),
        }
    }
}

/// Resolver answering from a fixed table keyed by host
#[derive(Debug, Default)]
pub(crate) struct FakeResolver {
    hosts: HashMap<String, Vec<String>>,
}

impl FakeResolver {
    pub(crate) fn host(mut self, host: &str, addrs: &[&str]) -> Self {
        self.hosts
            .insert(host.to_string(), addrs.iter().map(|a| a.to_string()).collect());
        self
    }
}

#[async_trait]
impl Resolver for FakeResolver {
    async fn lookup_host(&self, host: &str) -> Result<Vec<String>> {
        self.hosts
            .get(host)
            .cloned()
            .ok_or_else(|| Error::Dns(format!("lookup {host}: no such host")))
    }
}

/// In-memory cluster
#[derive(Debug, Default)]
pub(crate) struct FakeCluster {
    pub(crate) nodes: Vec<Node>,
    pub(crate) pods: Vec<Pod>,
    pub(crate) deployments: Vec<Deployment>,
    pub(crate) daemon_set: Option<DaemonSet>,
    pub(crate) service: Option<Service>,
    pub(crate) endpoints: Option<Endpoints>,
    pub(crate) error: Option<String>,
}

impl FakeCluster {
    fn check(&self) -> Result<()> {
        match &self.error {
            Some(error) => Err(Error::Kubernetes(error.clone())),
            None => Ok(()),
        }
    }

    fn found<T: Clone>(item: &Option<T>, kind: &str, name: &str) -> Result<T> {
        item.clone()
            .ok_or_else(|| Error::Kubernetes(format!("{kind} \"{name}\" not found")))
    }
}

#[async_trait]
impl ClusterClient for FakeCluster {
    async fn list_nodes(&self) -> Result<Vec<Node>> {
        self.check()?;
        Ok(self.nodes.clone())
    }

    async fn list_pods(&self, namespace: Option<&str>) -> Result<Vec<Pod>> {
        self.check()?;
        Ok(self
            .pods
            .iter()
            .filter(|p| namespace.is_none() || p.metadata.namespace.as_deref() == namespace)
            .cloned()
            .collect())
    }

    async fn list_deployments(&self) -> Result<Vec<Deployment>> {
        self.check()?;
        Ok(self.deployments.clone())
    }

    async fn get_daemon_set(&self, _namespace: &str, name: &str) -> Result<DaemonSet> {
        self.check()?;
        Self::found(&self.daemon_set, "daemonsets", name)
    }

    async fn get_service(&self, _namespace: &str, name: &str) -> Result<Service> {
        self.check()?;
        Self::found(&self.service, "services", name)
    }

    async fn get_endpoints(&self, _namespace: &str, name: &str) -> Result<Endpoints> {
        self.check()?;
        Self::found(&self.endpoints, "endpoints", name)
    }
}

/// Random source always drawing the same number
#[derive(Debug, Clone, Copy)]
pub(crate) struct FixedDraw(pub(crate) u32);

impl RandomSource for FixedDraw {
    fn draw(&self, _max: u32) -> u32 {
        self.0
    }
}
