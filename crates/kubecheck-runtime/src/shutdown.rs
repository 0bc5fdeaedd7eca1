//! Graceful shutdown with signal handling

use tokio::signal;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Shutdown signal shared by the server and in-flight runs
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    token: CancellationToken,
}

impl ShutdownSignal {
    /// Create a new shutdown signal
    pub fn new() -> Self {
        Self::default()
    }

    /// Token cancelled on shutdown, handed to runs that should stop early
    pub fn token(&self) -> CancellationToken {
        self.token.child_token()
    }

    /// Resolves once shutdown was triggered
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    /// Trigger shutdown
    pub fn trigger(&self) {
        if !self.token.is_cancelled() {
            tracing::info!("Shutdown signal triggered");
        }
        self.token.cancel();
    }

    /// Check if shutdown was triggered
    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Signal handler for OS signals
#[derive(Debug)]
pub struct SignalHandler {
    signal: ShutdownSignal,
}

impl SignalHandler {
    /// Create a new signal handler
    pub fn new(signal: ShutdownSignal) -> Self {
        Self { signal }
    }

    /// Wait for SIGINT or SIGTERM, then trigger shutdown
    pub async fn run(self) {
        #[cfg(unix)]
        {
            use signal::unix::{signal, SignalKind};

            let (mut sigterm, mut sigint) =
                match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                    (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
                    (Err(e), _) | (_, Err(e)) => {
                        tracing::error!(error = %e, "Failed to install signal handlers");
                        return;
                    }
                };

            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM"),
                _ = sigint.recv() => tracing::info!("Received SIGINT"),
                _ = self.signal.cancelled() => return,
            }
        }

        #[cfg(not(unix))]
        {
            tokio::select! {
                result = signal::ctrl_c() => match result {
                    Ok(()) => tracing::info!("Received Ctrl+C"),
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                        return;
                    }
                },
                _ = self.signal.cancelled() => return,
            }
        }

        self.signal.trigger();
    }

    /// Spawn the signal handler in the background
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_shutdown_signal() {
        let signal = ShutdownSignal::new();
        assert!(!signal.is_triggered());

        let token = signal.token();
        signal.trigger();

        assert!(signal.is_triggered());
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_resolves_for_clones() {
        let signal = ShutdownSignal::new();
        let waiter = signal.clone();

        let handle = tokio::spawn(async move { waiter.cancelled().await });
        signal.trigger();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_handler_exits_on_manual_trigger() {
        let signal = ShutdownSignal::new();
        let handle = SignalHandler::new(signal.clone()).spawn();

        signal.trigger();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
