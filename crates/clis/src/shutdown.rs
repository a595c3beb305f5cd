//! Signal handling: SIGINT and SIGTERM cancel the running command.

use std::io;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Owns the root cancellation token of the process.
#[derive(Debug, Clone, Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token passed to the engine. Cancelled on shutdown.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Trigger a shutdown
    pub fn shutdown(&self) {
        info!("Shutdown triggered");
        self.token.cancel();
    }

    /// Whether a shutdown has been triggered.
    pub fn is_shutdown(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Spawn a task that triggers shutdown on the first termination signal.
pub fn install_signal_handlers() -> ShutdownCoordinator {
    let coordinator = ShutdownCoordinator::new();
    let trigger = coordinator.clone();

    tokio::spawn(async move {
        match wait_for_signal().await {
            Ok(signal) => {
                info!(signal, "Received signal, cancelling");
                trigger.shutdown();
            }
            Err(e) => warn!(error = %e, "Unable to install signal handlers"),
        }
    });

    coordinator
}

#[cfg(unix)]
async fn wait_for_signal() -> io::Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => Ok("SIGTERM"),
        _ = sigint.recv() => Ok("SIGINT"),
    }
}

#[cfg(windows)]
async fn wait_for_signal() -> io::Result<&'static str> {
    use tokio::signal::windows;

    let mut ctrl_c = windows::ctrl_c()?;
    let mut ctrl_break = windows::ctrl_break()?;

    tokio::select! {
        _ = ctrl_c.recv() => Ok("Ctrl+C"),
        _ = ctrl_break.recv() => Ok("Ctrl+Break"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shutdown_cancels_child_tokens() {
        let coordinator = ShutdownCoordinator::new();
        let child = coordinator.token().child_token();
        assert!(!coordinator.is_shutdown());

        coordinator.clone().shutdown();

        assert!(coordinator.is_shutdown());
        assert!(child.is_cancelled());
    }
}
