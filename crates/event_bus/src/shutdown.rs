//! Shutdown coordination for graceful server shutdown.
//!
//! This module provides shared shutdown state for coordinating graceful shutdown
//! across all server components. Shutdown happens in two phases: first no new
//! work is accepted, then queued events are drained before final cleanup.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Shared shutdown state for coordinating graceful shutdown across components.
///
/// Cloning is cheap; all clones observe the same flags.
#[derive(Debug, Clone)]
pub struct ShutdownState {
    /// Flag indicating shutdown has been initiated - no new work should be accepted
    shutdown_initiated: Arc<AtomicBool>,
    /// Flag indicating all queued events have been drained and final cleanup can begin
    shutdown_complete: Arc<AtomicBool>,
    /// Wakes tasks parked in [`ShutdownState::wait_for_shutdown`]
    notifier: Arc<watch::Sender<bool>>,
}

impl ShutdownState {
    /// Creates a new shutdown state with both flags set to false.
    pub fn new() -> Self {
        let (notifier, _) = watch::channel(false);
        Self {
            shutdown_initiated: Arc::new(AtomicBool::new(false)),
            shutdown_complete: Arc::new(AtomicBool::new(false)),
            notifier: Arc::new(notifier),
        }
    }

    /// Returns true if shutdown has been initiated.
    pub fn is_shutdown_initiated(&self) -> bool {
        self.shutdown_initiated.load(Ordering::Acquire)
    }

    /// Returns true if shutdown is complete and final cleanup can begin.
    pub fn is_shutdown_complete(&self) -> bool {
        self.shutdown_complete.load(Ordering::Acquire)
    }

    /// Initiates shutdown. Only the first call logs and wakes waiters.
    pub fn initiate_shutdown(&self) {
        if !self.shutdown_initiated.swap(true, Ordering::AcqRel) {
            info!("🛑 Shutdown initiated - no new work will be accepted");
            self.notifier.send_replace(true);
        }
    }

    /// Marks shutdown as complete - all queued events have been processed.
    pub fn complete_shutdown(&self) {
        self.shutdown_complete.store(true, Ordering::Release);
        info!("✅ All events processed - ready for final cleanup");
    }

    /// Waits until shutdown has been initiated by any clone of this state.
    pub async fn wait_for_shutdown(&self) {
        let mut receiver = self.notifier.subscribe();
        // The sender lives as long as `self`, so this only returns once the flag flips.
        let _ = receiver.wait_for(|initiated| *initiated).await;
    }
}

impl Default for ShutdownState {
    fn default() -> Self {
        Self::new()
    }
}
