//! Probe collaborators
//!
//! The checks never talk to the network directly. They go through these
//! traits, whose real implementations are built once at startup and shared by
//! every check (and whose fakes are used in tests).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use http::HeaderMap;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment};
use k8s_openapi::api::core::v1::{Endpoints, Node, Pod, Service};
use kubecheck_core::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// An observed HTTP response, body fully read
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    /// Status code
    pub status: u16,
    /// Response headers
    pub headers: HeaderMap,
    /// Response body, lossily decoded as UTF-8
    pub body: String,
    /// Peer certificates presented during the TLS handshake
    pub certificates: Vec<CertificateInfo>,
}

/// The parts of a peer certificate the checks care about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateInfo {
    /// Subject distinguished name
    pub subject: String,
    /// Issuer distinguished name
    pub issuer: String,
    /// End of the validity period
    pub not_after: DateTime<Utc>,
}

/// Issues HTTP GET requests
#[async_trait]
pub trait HttpProbe: Send + Sync + fmt::Debug {
    /// GET `url` and read the whole response
    async fn get(&self, url: &str) -> Result<HttpResponse>;
}

/// Resolves host names
#[async_trait]
pub trait Resolver: Send + Sync + fmt::Debug {
    /// Resolve `host` to its addresses
    async fn lookup_host(&self, host: &str) -> Result<Vec<String>>;
}

/// Read-only access to the Kubernetes API
#[async_trait]
pub trait ClusterClient: Send + Sync + fmt::Debug {
    /// List all nodes
    async fn list_nodes(&self) -> Result<Vec<Node>>;

    /// List pods in `namespace`, or in all namespaces
    async fn list_pods(&self, namespace: Option<&str>) -> Result<Vec<Pod>>;

    /// List deployments in all namespaces
    async fn list_deployments(&self) -> Result<Vec<Deployment>>;

    /// Get a daemon set
    async fn get_daemon_set(&self, namespace: &str, name: &str) -> Result<DaemonSet>;

    /// Get a service
    async fn get_service(&self, namespace: &str, name: &str) -> Result<Service>;

    /// Get the endpoints of a service
    async fn get_endpoints(&self, namespace: &str, name: &str) -> Result<Endpoints>;
}

/// Source of random draws for synthetic checks
pub trait RandomSource: Send + Sync + fmt::Debug {
    /// Draw a number uniformly from `[1, max]`
    fn draw(&self, max: u32) -> u32;
}

/// Random source backed by the thread-local generator
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn draw(&self, max: u32) -> u32 {
        use rand::Rng;
        rand::thread_rng().gen_range(1..=max.max(1))
    }
}

/// Shared probe collaborators handed to every check at construction
#[derive(Debug, Clone)]
pub struct Probes {
    /// HTTP client
    pub http: Arc<dyn HttpProbe>,
    /// Name resolver
    pub resolver: Arc<dyn Resolver>,
    /// Kubernetes client, absent when no cluster check is configured
    pub cluster: Option<Arc<dyn ClusterClient>>,
    /// Random source for synthetic checks
    pub random: Arc<dyn RandomSource>,
}
