//! Run-level cancellation signal
//!
//! Operator aborts (ctrl-c) are delivered to blocking waits as an explicit
//! signal instead of being intercepted inside read loops. The gate observes
//! the signal and resolves with a distinct `Cancelled` outcome.

use tokio::sync::watch;

/// Sending half, held by the run driver.
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

/// Receiving half, cloned into every blocking wait.
#[derive(Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

/// Create a connected handle/signal pair.
pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelSignal { rx })
}

impl CancelHandle {
    /// Request cancellation. Idempotent.
    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }
}

impl CancelSignal {
    /// Whether cancellation has already been requested.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Suspend until cancellation is requested. If the handle is gone
    /// without ever triggering, cancellation can no longer happen and this
    /// future stays pending.
    pub async fn cancelled(&mut self) {
        if self.rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn trigger_wakes_waiters() {
        let (handle, mut signal) = cancel_pair();
        assert!(!signal.is_cancelled());

        handle.trigger();
        tokio::time::timeout(Duration::from_secs(1), signal.cancelled())
            .await
            .expect("cancelled() should resolve after trigger");
        assert!(signal.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_handle_never_cancels() {
        let (handle, mut signal) = cancel_pair();
        drop(handle);

        let wait = tokio::time::timeout(Duration::from_secs(5), signal.cancelled()).await;
        assert!(wait.is_err(), "cancelled() must stay pending without a trigger");
    }
}
