//! Configuration types

use kubecheck_checks::{CheckConfig, KubernetesConnection};
use kubecheck_core::LifecycleEvent;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Reporting server
    #[serde(default)]
    pub server: ServerConfig,

    /// Check runner
    #[serde(default)]
    pub runner: RunnerConfig,

    /// Kubernetes API access
    #[serde(default)]
    pub kubernetes: KubernetesConnection,

    /// Logging
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Webhooks notified on lifecycle events
    #[serde(default)]
    pub webhooks: Vec<WebhookConfig>,

    /// Healthchecks
    #[serde(default)]
    pub checks: Vec<CheckConfig>,
}

impl Config {
    /// Whether any configured check talks to the Kubernetes API
    pub fn requires_cluster(&self) -> bool {
        self.checks.iter().any(CheckConfig::requires_cluster)
    }

    /// Look up a check by name
    pub fn check(&self, name: &str) -> Option<&CheckConfig> {
        self.checks.iter().find(|c| c.name() == name)
    }
}

/// Reporting server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,

    /// Show input and output of passed checks
    #[serde(default)]
    pub debug: bool,

    /// Request timeout
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Graceful shutdown timeout (wait for in-flight requests)
    #[serde(default = "default_shutdown_timeout", with = "humantime_serde")]
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            debug: false,
            request_timeout: default_timeout(),
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

/// Check runner configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunnerConfig {
    /// Most checks executing at once
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level or filter directive
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (json, text)
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// An outbound notification on lifecycle events
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WebhookConfig {
    /// Webhook name, used in logs
    pub name: String,

    /// Target URL, may carry basic auth credentials
    pub url: String,

    /// Request body
    #[serde(default)]
    pub data: String,

    /// Events the webhook subscribes to
    #[serde(default)]
    pub events: Vec<LifecycleEvent>,
}

// Default functions
fn default_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8113))
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_max_concurrency() -> usize {
    8
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}
