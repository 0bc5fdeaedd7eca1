//! DNS lookup healthcheck

use crate::config::CheckMeta;
use crate::probe::Resolver;
use async_trait::async_trait;
use kubecheck_core::{
    evaluate, AssertionGroup, CheckResult, Description, Error, Expectation, Healthcheck, Result,
    DEFAULT_CHECK_TIMEOUT,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
use trust_dns_resolver::TokioAsyncResolver;

/// [`Resolver`] backed by trust-dns
#[derive(Debug, Clone)]
pub struct TrustDnsResolver {
    resolver: TokioAsyncResolver,
}

impl TrustDnsResolver {
    /// Create a resolver with the given upstream configuration
    pub fn new(config: ResolverConfig, opts: ResolverOpts) -> Self {
        Self {
            resolver: TokioAsyncResolver::tokio(config, opts),
        }
    }

    /// Create a resolver using the system configuration, falling back to the
    /// library defaults when it cannot be read
    pub fn from_system() -> Self {
        match TokioAsyncResolver::tokio_from_system_conf() {
            Ok(resolver) => Self { resolver },
            Err(e) => {
                debug!(error = %e, "Falling back to default resolver configuration");
                Self::new(ResolverConfig::default(), ResolverOpts::default())
            }
        }
    }
}

#[async_trait]
impl Resolver for TrustDnsResolver {
    async fn lookup_host(&self, host: &str) -> Result<Vec<String>> {
        debug!(host = %host, "Resolving DNS name");

        let response = self
            .resolver
            .lookup_ip(host)
            .await
            .map_err(|e| Error::Dns(format!("lookup {host}: {e}")))?;

        let addrs: Vec<String> = response.iter().map(|ip| ip.to_string()).collect();
        debug!(host = %host, count = addrs.len(), "Resolved addresses");

        Ok(addrs)
    }
}

/// Addresses that must be among the resolved ones
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressExpectation {
    /// Required addresses
    pub addresses: Vec<String>,
}

impl AddressExpectation {
    fn verify(&self, resolved: &[String]) -> Vec<AssertionGroup> {
        let mut group = AssertionGroup::new("DNSLookupAddr");

        for expected in &self.addresses {
            group.record(
                "Contains",
                resolved.contains(expected),
                expected.as_str(),
                resolved.to_vec(),
            );
        }

        vec![group]
    }
}

/// Expectations a DNS lookup check can carry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "expect", rename_all = "snake_case")]
pub enum DnsExpectation {
    /// Required addresses
    Addresses(AddressExpectation),
}

impl Expectation<[String]> for DnsExpectation {
    fn verify(&self, resolved: &[String]) -> Vec<AssertionGroup> {
        match self {
            Self::Addresses(e) => e.verify(resolved),
        }
    }
}

impl From<AddressExpectation> for DnsExpectation {
    fn from(e: AddressExpectation) -> Self {
        Self::Addresses(e)
    }
}

/// Expect every address in `addrs` to be resolved
pub fn expect_addrs<I, S>(addrs: I) -> AddressExpectation
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    AddressExpectation {
        addresses: addrs.into_iter().map(Into::into).collect(),
    }
}

/// Configuration of a DNS lookup check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DnsCheckConfig {
    /// Name, description and timeout
    #[serde(flatten)]
    pub meta: CheckMeta,
    /// Host name to resolve
    pub host: String,
    /// Expectations on the resolved addresses
    #[serde(default)]
    pub expectations: Vec<DnsExpectation>,
}

/// Resolves a host name and verifies the resolved addresses
#[derive(Debug, Clone)]
pub struct DnsLookupCheck {
    name: String,
    description: String,
    host: String,
    timeout: Duration,
    expectations: Vec<DnsExpectation>,
    resolver: Arc<dyn Resolver>,
}

impl DnsLookupCheck {
    /// Create a check without expectations
    pub fn new(name: impl Into<String>, host: impl Into<String>, resolver: Arc<dyn Resolver>) -> Self {
        Self {
            name: name.into(),
            description: "Performs a DNS lookup to verify that domain names can be resolved"
                .to_string(),
            host: host.into(),
            timeout: DEFAULT_CHECK_TIMEOUT,
            expectations: Vec::new(),
            resolver,
        }
    }

    /// Build a check from its configuration
    pub fn from_config(config: &DnsCheckConfig, resolver: Arc<dyn Resolver>) -> Self {
        let mut check = Self::new(&config.meta.name, &config.host, resolver)
            .with_expectations(config.expectations.iter().cloned());
        config.meta.apply(&mut check.description, &mut check.timeout);
        check
    }

    /// Append expectations
    pub fn with_expectations<I>(mut self, expectations: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<DnsExpectation>,
    {
        self.expectations
            .extend(expectations.into_iter().map(Into::into));
        self
    }
}

#[async_trait]
impl Healthcheck for DnsLookupCheck {
    fn kind(&self) -> &'static str {
        "dns-lookup"
    }

    fn describe(&self) -> Description {
        Description::new(&self.name, &self.description)
    }

    async fn execute(&self) -> CheckResult {
        let input = json!({ "host": self.host });

        let addrs = match self.resolver.lookup_host(&self.host).await {
            Ok(addrs) => addrs,
            Err(e) => return CheckResult::observation_failed(e.to_string(), Some(input)),
        };

        evaluate(&input, &self.expectations, |e| e.verify(addrs.as_slice()))
    }

    fn input(&self) -> Option<Value> {
        Some(json!({ "host": self.host }))
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}
