//! Configuration builder

use crate::types::{Config, LoggingConfig, RunnerConfig, ServerConfig, WebhookConfig};
use kubecheck_checks::{CheckConfig, KubernetesConnection};
use kubecheck_core::Result;
use std::net::SocketAddr;

/// Builder for constructing configuration programmatically
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    server: ServerConfig,
    runner: RunnerConfig,
    kubernetes: KubernetesConnection,
    webhooks: Vec<WebhookConfig>,
    checks: Vec<CheckConfig>,
}

impl ConfigBuilder {
    /// Create a new configuration builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set listen address
    pub fn listen(mut self, addr: SocketAddr) -> Self {
        self.server.listen = addr;
        self
    }

    /// Show input and output of passed checks
    pub fn debug(mut self, debug: bool) -> Self {
        self.server.debug = debug;
        self
    }

    /// Set the most checks executing at once
    pub fn max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.runner.max_concurrency = max_concurrency;
        self
    }

    /// Set Kubernetes API access
    pub fn kubernetes(mut self, kubernetes: KubernetesConnection) -> Self {
        self.kubernetes = kubernetes;
        self
    }

    /// Add a webhook
    pub fn webhook(mut self, webhook: WebhookConfig) -> Self {
        self.webhooks.push(webhook);
        self
    }

    /// Add a check
    pub fn check(mut self, check: CheckConfig) -> Self {
        self.checks.push(check);
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<Config> {
        let config = Config {
            server: self.server,
            runner: self.runner,
            kubernetes: self.kubernetes,
            logging: LoggingConfig::default(),
            webhooks: self.webhooks,
            checks: self.checks,
        };

        crate::validator::validate_config(&config)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kubecheck_checks::dns::DnsCheckConfig;
    use kubecheck_checks::CheckMeta;

    fn dns() -> CheckConfig {
        CheckConfig::Dns(DnsCheckConfig {
            meta: CheckMeta::new("dns"),
            host: "example.com".to_string(),
            expectations: vec![],
        })
    }

    #[test]
    fn test_config_builder() {
        let addr: SocketAddr = "127.0.0.1:8113".parse().unwrap();

        let config = ConfigBuilder::new()
            .listen(addr)
            .debug(true)
            .check(dns())
            .build()
            .unwrap();

        assert_eq!(config.server.listen, addr);
        assert!(config.server.debug);
        assert_eq!(config.checks.len(), 1);
    }

    #[test]
    fn test_builder_without_checks() {
        let result = ConfigBuilder::new().build();
        assert!(result.is_err());
    }
}
