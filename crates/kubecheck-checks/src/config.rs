//! Check configuration and the factory turning it into checks

use crate::dns::{DnsCheckConfig, DnsLookupCheck};
use crate::http::{HttpCheckConfig, HttpGetCheck};
use crate::kubernetes::{
    IngressCheck, IngressCheckConfig, NodeCheck, NodeCheckConfig, NodeSpreadCheck,
    NodeSpreadCheckConfig, PodCheck, PodCheckConfig,
};
use crate::probe::{ClusterClient, Probes};
use crate::random::{RandomFailCheck, RandomFailCheckConfig};
use kubecheck_core::{Error, Healthcheck, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Settings shared by every check
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckMeta {
    /// Unique check name
    pub name: String,

    /// Replaces the default description of the check
    #[serde(default)]
    pub description: Option<String>,

    /// Replaces the default execution timeout
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
}

impl CheckMeta {
    /// Meta with only a name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Override `description` and `timeout` with the configured values
    pub(crate) fn apply(&self, description: &mut String, timeout: &mut Duration) {
        if let Some(configured) = &self.description {
            description.clone_from(configured);
        }
        if let Some(configured) = self.timeout {
            *timeout = configured;
        }
    }
}

/// Configuration of one check, tagged by `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CheckConfig {
    /// HTTP GET
    Http(HttpCheckConfig),
    /// DNS lookup
    Dns(DnsCheckConfig),
    /// Cluster nodes
    KubernetesNode(NodeCheckConfig),
    /// Pods of a namespace
    KubernetesPod(PodCheckConfig),
    /// Deployment spread across nodes
    KubernetesNodeSpread(NodeSpreadCheckConfig),
    /// Ingress controller
    KubernetesIngress(IngressCheckConfig),
    /// Synthetic random failure
    RandomFail(RandomFailCheckConfig),
}

impl CheckConfig {
    /// Shared settings of the check
    pub fn meta(&self) -> &CheckMeta {
        match self {
            Self::Http(c) => &c.meta,
            Self::Dns(c) => &c.meta,
            Self::KubernetesNode(c) => &c.meta,
            Self::KubernetesPod(c) => &c.meta,
            Self::KubernetesNodeSpread(c) => &c.meta,
            Self::KubernetesIngress(c) => &c.meta,
            Self::RandomFail(c) => &c.meta,
        }
    }

    /// Check name
    pub fn name(&self) -> &str {
        &self.meta().name
    }

    /// Whether the check talks to the Kubernetes API
    pub fn requires_cluster(&self) -> bool {
        matches!(
            self,
            Self::KubernetesNode(_)
                | Self::KubernetesPod(_)
                | Self::KubernetesNodeSpread(_)
                | Self::KubernetesIngress(_)
        )
    }

    /// Build the check, wiring in the shared probes
    pub fn build(&self, probes: &Probes) -> Result<Arc<dyn Healthcheck>> {
        let check: Arc<dyn Healthcheck> = match self {
            Self::Http(c) => Arc::new(HttpGetCheck::from_config(c, probes.http.clone())),
            Self::Dns(c) => Arc::new(DnsLookupCheck::from_config(c, probes.resolver.clone())),
            Self::KubernetesNode(c) => Arc::new(NodeCheck::from_config(c, self.cluster(probes)?)),
            Self::KubernetesPod(c) => Arc::new(PodCheck::from_config(c, self.cluster(probes)?)),
            Self::KubernetesNodeSpread(c) => {
                Arc::new(NodeSpreadCheck::from_config(c, self.cluster(probes)?))
            }
            Self::KubernetesIngress(c) => Arc::new(IngressCheck::from_config(
                c,
                self.cluster(probes)?,
                probes.http.clone(),
            )),
            Self::RandomFail(c) => Arc::new(RandomFailCheck::from_config(c, probes.random.clone())),
        };

        Ok(check)
    }

    fn cluster(&self, probes: &Probes) -> Result<Arc<dyn ClusterClient>> {
        probes.cluster.clone().ok_or_else(|| {
            Error::Config(format!(
                "Check '{}' requires a Kubernetes client, but none is configured",
                self.name()
            ))
        })
    }
}

/// Build every configured check
pub fn build_checks(configs: &[CheckConfig], probes: &Probes) -> Result<Vec<Arc<dyn Healthcheck>>> {
    configs.iter().map(|config| config.build(probes)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpExpectation;
    use crate::testing::{FakeCluster, FakeHttp, FakeResolver, FixedDraw};

    const CHECKS: &str = r#"
- type: http
  name: google
  url: https://www.google.com/
  timeout: 5s
  expectations:
    - expect: status_code
      min: 200
      max: 200
    - expect: body
      expected: Google
- type: dns
  name: dns
  description: Resolves the cluster API
  host: kubernetes.default
- type: kubernetes_node
  name: nodes
  expectations:
    - expect: count
      min: 3
- type: kubernetes_pod
  name: pods
  namespace: kube-system
- type: kubernetes_node_spread
  name: spread
  exclude_namespaces: [kube-system]
  expectations:
    - expect: min
      min: 2
- type: kubernetes_ingress
  name: traefik
  namespace: ingress
  daemon_set: traefik
  service: traefik
  service_port: http
- type: random_fail
  name: random-failure
  fail_rate: 10
"#;

    fn probes(cluster: bool) -> Probes {
        Probes {
            http: Arc::new(FakeHttp::default()),
            resolver: Arc::new(FakeResolver::default()),
            cluster: cluster.then(|| Arc::new(FakeCluster::default()) as Arc<dyn ClusterClient>),
            random: Arc::new(FixedDraw(1)),
        }
    }

    #[test]
    fn test_parse_every_check_type() {
        let configs: Vec<CheckConfig> = serde_yaml::from_str(CHECKS).unwrap();
        assert_eq!(configs.len(), 7);

        let names: Vec<&str> = configs.iter().map(CheckConfig::name).collect();
        assert_eq!(
            names,
            vec!["google", "dns", "nodes", "pods", "spread", "traefik", "random-failure"]
        );

        match &configs[0] {
            CheckConfig::Http(c) => {
                assert_eq!(c.meta.timeout, Some(Duration::from_secs(5)));
                assert!(matches!(c.expectations[0], HttpExpectation::StatusCode(_)));
            }
            other => panic!("unexpected config: {other:?}"),
        }

        assert_eq!(
            configs[1].meta().description.as_deref(),
            Some("Resolves the cluster API")
        );
        assert!(!configs[0].requires_cluster());
        assert!(configs[2].requires_cluster());
        assert!(configs[5].requires_cluster());
        assert!(!configs[6].requires_cluster());
    }

    #[test]
    fn test_build_applies_meta() {
        let configs: Vec<CheckConfig> = serde_yaml::from_str(CHECKS).unwrap();
        let checks = build_checks(&configs, &probes(true)).unwrap();

        let kinds: Vec<&str> = checks.iter().map(|c| c.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                "http-get",
                "dns-lookup",
                "kubernetes-node",
                "kubernetes-pod",
                "kubernetes-node-spread",
                "kubernetes-ingress",
                "random-fail"
            ]
        );

        assert_eq!(checks[0].timeout(), Duration::from_secs(5));
        assert_eq!(checks[1].describe().description, "Resolves the cluster API");
        assert_eq!(checks[1].timeout(), kubecheck_core::DEFAULT_CHECK_TIMEOUT);
    }

    #[test]
    fn test_cluster_checks_need_a_client() {
        let configs: Vec<CheckConfig> = serde_yaml::from_str(CHECKS).unwrap();

        let err = configs[2].build(&probes(false)).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("'nodes'"));

        assert!(configs[0].build(&probes(false)).is_ok());
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let result: std::result::Result<Vec<CheckConfig>, _> =
            serde_yaml::from_str("- type: ftp\n  name: files\n");
        assert!(result.is_err());
    }
}
