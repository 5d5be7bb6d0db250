//! Graceful shutdown handling
//!
//! - Signal handling (SIGTERM, SIGINT)
//! - A watch-based shutdown signal shared with background loops

use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn};

/// Shutdown signal that can be cloned and shared
#[derive(Clone, Debug)]
pub struct ShutdownSignal {
    watch_rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Check if shutdown has been initiated
    pub fn is_shutdown(&self) -> bool {
        *self.watch_rx.borrow()
    }

    /// Wait for the shutdown signal
    ///
    /// Also returns if the coordinator is dropped.
    pub async fn wait(&mut self) {
        while !*self.watch_rx.borrow_and_update() {
            if self.watch_rx.changed().await.is_err() {
                return;
            }
        }
    }
}

/// Owner side of the shutdown signal
#[derive(Debug)]
pub struct ShutdownCoordinator {
    watch_tx: watch::Sender<bool>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        let (watch_tx, _) = watch::channel(false);
        Self { watch_tx }
    }

    /// Get a shutdown signal that can be cloned
    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            watch_rx: self.watch_tx.subscribe(),
        }
    }

    /// Initiate shutdown
    pub fn shutdown(&self) {
        if self.watch_tx.send_replace(true) {
            return;
        }
        info!("Initiating graceful shutdown...");
    }

    pub fn is_shutdown(&self) -> bool {
        *self.watch_tx.borrow()
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Wait for SIGTERM or Ctrl+C
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
