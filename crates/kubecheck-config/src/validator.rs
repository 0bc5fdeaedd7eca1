//! Configuration validation

use crate::Config;
use kubecheck_checks::kubernetes::NodeExpectation;
use kubecheck_checks::CheckConfig;
use kubecheck_core::{Error, Result};
use std::collections::HashSet;
use url::Url;

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_server(config)?;
    validate_runner(config)?;
    validate_webhooks(config)?;
    validate_checks(config)?;

    Ok(())
}

fn validate_server(config: &Config) -> Result<()> {
    if config.server.request_timeout.is_zero() {
        return Err(Error::Config("request_timeout must be > 0".to_string()));
    }

    if config.server.request_timeout.as_secs() > 300 {
        tracing::warn!("request_timeout is very high (>5 minutes)");
    }

    Ok(())
}

fn validate_runner(config: &Config) -> Result<()> {
    if config.runner.max_concurrency == 0 {
        return Err(Error::Config("max_concurrency must be > 0".to_string()));
    }

    Ok(())
}

fn validate_webhooks(config: &Config) -> Result<()> {
    for webhook in &config.webhooks {
        if webhook.name.is_empty() {
            return Err(Error::Config("webhook name cannot be empty".to_string()));
        }

        Url::parse(&webhook.url).map_err(|e| {
            Error::Config(format!("Invalid URL for webhook '{}': {e}", webhook.name))
        })?;

        if webhook.events.is_empty() {
            tracing::warn!(
                webhook = %webhook.name,
                "Webhook subscribes to no events"
            );
        }
    }

    Ok(())
}

fn validate_checks(config: &Config) -> Result<()> {
    if config.checks.is_empty() {
        return Err(Error::Config("at least one check must be configured".to_string()));
    }

    let mut names = HashSet::new();

    for check in &config.checks {
        let name = check.name();

        if name.trim().is_empty() {
            return Err(Error::Config("check name cannot be empty".to_string()));
        }

        if !names.insert(name) {
            return Err(Error::Config(format!("Duplicate check name: {name}")));
        }

        if check.meta().timeout.is_some_and(|t| t.is_zero()) {
            return Err(Error::Config(format!("Check '{name}': timeout must be > 0")));
        }

        validate_check(name, check)?;
    }

    Ok(())
}

fn validate_check(name: &str, check: &CheckConfig) -> Result<()> {
    match check {
        CheckConfig::Http(c) => {
            Url::parse(&c.url)
                .map_err(|e| Error::Config(format!("Check '{name}': invalid URL: {e}")))?;
        }
        CheckConfig::Dns(c) => {
            if c.host.is_empty() {
                return Err(Error::Config(format!("Check '{name}': host cannot be empty")));
            }
        }
        CheckConfig::KubernetesNode(c) => {
            for expectation in &c.expectations {
                if let NodeExpectation::Count(count) = expectation {
                    if !count.is_consistent() {
                        return Err(Error::Config(format!(
                            "Check '{name}': node count min must not exceed max"
                        )));
                    }
                }
            }
        }
        CheckConfig::KubernetesPod(c) => {
            if c.selection.namespace.is_empty() {
                return Err(Error::Config(format!(
                    "Check '{name}': namespace cannot be empty"
                )));
            }
        }
        CheckConfig::KubernetesNodeSpread(c) => {
            if c.expectations.is_empty() {
                tracing::warn!(check = %name, "Node spread check has no expectations");
            }
        }
        CheckConfig::KubernetesIngress(c) => {
            let target = &c.target;
            if target.namespace.is_empty()
                || target.daemon_set.is_empty()
                || target.service.is_empty()
                || target.service_port.is_empty()
            {
                return Err(Error::Config(format!(
                    "Check '{name}': namespace, daemon_set, service and service_port are required"
                )));
            }
            if !target.ping_path.starts_with('/') {
                return Err(Error::Config(format!(
                    "Check '{name}': ping_path must start with '/'"
                )));
            }
        }
        CheckConfig::RandomFail(_) => {}
    }

    Ok(())
}
