//! Signal handling for graceful server shutdown.
//!
//! This module provides cross-platform signal handling to allow the server
//! to shut down gracefully when receiving termination signals.

use event_bus::ShutdownState;
use tokio::signal;
use tracing::{info, warn};

/// What ended the wait in [`wait_for_shutdown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownCause {
    /// SIGINT, SIGTERM or Ctrl+C
    Signal,
    /// A component initiated shutdown itself, e.g. after a fatal handler error
    Internal,
}

/// Waits for a termination signal or for shutdown initiated elsewhere.
///
/// A received signal initiates shutdown on `shutdown_state`, so every
/// component watching the same state starts winding down.
///
/// # Platform Support
///
/// * **Unix platforms**: Handles SIGINT and SIGTERM signals
/// * **Windows**: Handles Ctrl+C signal
pub async fn wait_for_shutdown(shutdown_state: &ShutdownState) -> std::io::Result<ShutdownCause> {
    tokio::select! {
        result = wait_for_signal() => {
            result?;
            info!("📡 Received shutdown signal - initiating graceful shutdown");
            shutdown_state.initiate_shutdown();
            Ok(ShutdownCause::Signal)
        }
        _ = shutdown_state.wait_for_shutdown() => {
            warn!("🛑 Shutdown initiated internally");
            Ok(ShutdownCause::Internal)
        }
    }
}

/// Returns when the process receives a termination signal.
pub async fn wait_for_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        tokio::select! {
            _ = sigint.recv() => (),
            _ = sigterm.recv() => ()
        }
    }

    #[cfg(windows)]
    signal::ctrl_c().await?;

    Ok(())
}
