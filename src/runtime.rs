//! Runtime - shutdown signal for long-running CLI commands (`invoice --watch`).

use tokio::sync::watch;

/// Cloneable shutdown flag. Triggering is idempotent.
#[derive(Clone)]
pub struct Shutdown {
    tx: watch::Sender<bool>,
    rx: watch::Receiver<bool>,
}

impl Default for Shutdown {
    fn default() -> Self { Self::new() }
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx, rx }
    }

    pub fn trigger(&self) {
        self.tx.send_if_modified(|fired| !std::mem::replace(fired, true));
    }

    pub fn is_triggered(&self) -> bool { *self.rx.borrow() }

    /// Resolves once [`Shutdown::trigger`] has been called.
    pub async fn wait(&self) {
        let mut rx = self.rx.clone();
        // The sender lives in `self`, so this only errors if it was dropped mid-wait.
        let _ = rx.wait_for(|fired| *fired).await;
    }
}

/// Trigger `Shutdown` on SIGINT/SIGTERM (Ctrl+C elsewhere).
pub fn install_signal_handlers() -> Shutdown {
    let shutdown = Shutdown::new();
    let handle = shutdown.clone();

    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(mut sigterm), Ok(mut sigint)) => {
                    tokio::select! {
                        _ = sigterm.recv() => tracing::info!("received SIGTERM"),
                        _ = sigint.recv() => tracing::info!("received SIGINT"),
                    }
                }
                (Err(e), _) | (_, Err(e)) => {
                    tracing::warn!(error = %e, "signal handlers unavailable, falling back to ctrl_c");
                    if tokio::signal::ctrl_c().await.is_err() {
                        return;
                    }
                }
            }
        }

        #[cfg(not(unix))]
        {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "ctrl_c handler unavailable");
                return;
            }
            tracing::info!("received Ctrl+C");
        }

        handle.trigger();
    });

    shutdown
}
