//! # kubecheck checks
//!
//! Concrete healthchecks and the probe collaborators they observe through.
//!
//! Each check family owns a context type, a closed enum of expectations over
//! that context and a configuration type. [`CheckConfig`] turns configuration
//! into checks, wiring in one shared set of [`Probes`].

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod client;
pub mod config;
pub mod dns;
pub mod http;
pub mod kubernetes;
pub mod probe;
pub mod random;

#[cfg(test)]
mod testing;

pub use client::{clean_url, ReqwestHttpProbe};
pub use config::{build_checks, CheckConfig, CheckMeta};
pub use dns::{DnsLookupCheck, TrustDnsResolver};
pub use http::HttpGetCheck;
pub use kubernetes::{
    IngressCheck, KubeCluster, KubernetesConnection, NodeCheck, NodeSpreadCheck, PodCheck,
};
pub use probe::{ClusterClient, HttpProbe, HttpResponse, Probes, RandomSource, Resolver, ThreadRandom};
pub use random::RandomFailCheck;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{build_checks, CheckConfig, CheckMeta};
    pub use crate::dns::{expect_addrs, DnsExpectation, DnsLookupCheck};
    pub use crate::http::{
        expect_body_contains, expect_body_equals, expect_header, expect_response_in,
        expect_status_code, expect_status_code_range, expect_status_code_success,
        expect_valid_certificate, HttpExpectation, HttpGetCheck,
    };
    pub use crate::kubernetes::ingress::{IngressCheck, IngressExpectation, IngressTarget};
    pub use crate::kubernetes::node::{
        expect_node_count, expect_node_count_max, expect_node_count_min,
        expect_node_count_range, expect_node_status_ok, NodeCheck, NodeExpectation,
    };
    pub use crate::kubernetes::node_spread::{
        expect_node_spread, NodeSpreadCheck, NodeSpreadExpectation, SpreadExclusions,
    };
    pub use crate::kubernetes::pod::{
        expect_pod_max_container_restarts, expect_pod_status_ok, PodCheck, PodExpectation,
        PodSelection,
    };
    pub use crate::probe::Probes;
    pub use crate::random::RandomFailCheck;
}
