//! # kubecheck server
//!
//! Serves healthcheck reports over HTTP. Every request runs the requested
//! checks and answers `424 Failed Dependency` when any of them failed.

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod handlers;
pub mod models;
pub mod router;
pub mod server;

pub use handlers::AppState;
pub use models::{Index, IndexEntry, Report, ReportEntry};
pub use router::build_router;
pub use server::Server;
