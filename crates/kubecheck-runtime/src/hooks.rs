//! Lifecycle hooks
//!
//! Hooks are notified before the first and after the last check of a run.
//! Notification is fire-and-forget: every hook runs on its own task and its
//! failures are logged, never reported back to the run.

use async_trait::async_trait;
use kubecheck_checks::clean_url;
use kubecheck_config::WebhookConfig;
use kubecheck_core::{Error, LifecycleEvent, Result};
use std::fmt;
use std::sync::Arc;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// Subscriber to run lifecycle events
#[async_trait]
pub trait LifecycleHook: Send + Sync + fmt::Debug {
    /// Hook name, used in logs
    fn name(&self) -> &str;

    /// Whether the hook wants to be notified of `event`
    fn subscribes_to(&self, event: LifecycleEvent) -> bool;

    /// Perform the side effect for `event`
    async fn notify(&self, event: LifecycleEvent) -> Result<()>;
}

/// POSTs a fixed body to a URL
#[derive(Debug, Clone)]
pub struct Webhook {
    name: String,
    url: String,
    data: String,
    events: Vec<LifecycleEvent>,
    client: reqwest::Client,
}

impl Webhook {
    /// Create a webhook sharing `client`
    pub fn new(config: &WebhookConfig, client: reqwest::Client) -> Self {
        Self {
            name: config.name.clone(),
            url: config.url.clone(),
            data: config.data.clone(),
            events: config.events.clone(),
            client,
        }
    }
}

#[async_trait]
impl LifecycleHook for Webhook {
    fn name(&self) -> &str {
        &self.name
    }

    fn subscribes_to(&self, event: LifecycleEvent) -> bool {
        self.events.contains(&event)
    }

    async fn notify(&self, event: LifecycleEvent) -> Result<()> {
        info!(
            hook = %self.name,
            event = %event,
            url = %clean_url(&self.url),
            "Invoking webhook"
        );

        let response = self
            .client
            .post(&self.url)
            .body(self.data.clone())
            .send()
            .await
            .map_err(|e| Error::hook(&self.name, e.without_url().to_string()))?;

        response
            .error_for_status()
            .map_err(|e| Error::hook(&self.name, e.without_url().to_string()))?;

        Ok(())
    }
}

/// Registered lifecycle hooks
#[derive(Debug, Clone, Default)]
pub struct Hooks {
    hooks: Vec<Arc<dyn LifecycleHook>>,
    tracker: TaskTracker,
}

impl Hooks {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Build webhooks for every configured entry, sharing one client
    pub fn from_config(webhooks: &[WebhookConfig], client: reqwest::Client) -> Self {
        webhooks.iter().fold(Self::new(), |hooks, config| {
            hooks.register(Arc::new(Webhook::new(config, client.clone())))
        })
    }

    /// Register a hook
    pub fn register(mut self, hook: Arc<dyn LifecycleHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Number of registered hooks
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Whether no hook is registered
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    fn subscribers(&self, event: LifecycleEvent) -> impl Iterator<Item = &Arc<dyn LifecycleHook>> {
        self.hooks.iter().filter(move |hook| hook.subscribes_to(event))
    }

    /// Notify every subscribed hook on its own task and return immediately
    pub fn notify(&self, event: LifecycleEvent) {
        for hook in self.subscribers(event) {
            let hook = Arc::clone(hook);

            self.tracker.spawn(async move {
                match hook.notify(event).await {
                    Ok(()) => debug!(hook = %hook.name(), event = %event, "Hook notified"),
                    Err(e) => warn!(hook = %hook.name(), event = %event, error = %e, "Hook failed"),
                }
            });
        }
    }

    /// Notify every subscribed hook and wait for all of them
    pub async fn notify_and_wait(&self, event: LifecycleEvent) -> Vec<(String, Result<()>)> {
        let notifications = self.subscribers(event).map(|hook| async move {
            (hook.name().to_string(), hook.notify(event).await)
        });

        futures::future::join_all(notifications).await
    }

    /// Wait for notifications spawned by [`Hooks::notify`] to finish
    pub async fn drain(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }
}
