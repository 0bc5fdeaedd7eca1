//! # kubecheck runtime
//!
//! Executes healthchecks concurrently and tells the outside world about it:
//! - [`Runner`] fans checks out with a concurrency bound and per-check timeouts
//! - [`Hooks`] notifies lifecycle subscribers such as webhooks
//! - [`ShutdownSignal`] ties OS signals to cancellation

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod hooks;
pub mod runner;
pub mod shutdown;

pub use hooks::{Hooks, LifecycleHook, Webhook};
pub use runner::Runner;
pub use shutdown::{ShutdownSignal, SignalHandler};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::hooks::{Hooks, LifecycleHook, Webhook};
    pub use crate::runner::Runner;
    pub use crate::shutdown::{ShutdownSignal, SignalHandler};
    pub use tokio_util::sync::CancellationToken;
}
