//! Cooperative stop signal shared by a node's accept loop and its connection workers.

use std::time::Duration;

use tokio::sync::watch;

/// Cloneable stop flag. Blocking socket calls race against [`ShutdownToken::triggered`]
/// so a stop request unblocks them without closing the socket from another task.
#[derive(Debug, Clone)]
pub struct ShutdownToken {
    tx: std::sync::Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl ShutdownToken {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: std::sync::Arc::new(tx),
            rx,
        }
    }

    /// Request stop. Idempotent.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once stop has been requested (immediately if it already was).
    pub async fn triggered(&self) {
        let mut rx = self.rx.clone();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|stopped| *stopped).await;
    }

    /// Sleep for `delay` unless stop is requested first. Returns `false` if interrupted.
    pub async fn sleep(&self, delay: Duration) -> bool {
        tokio::select! {
            _ = self.triggered() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }
}

impl Default for ShutdownToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle for stopping a running node from any task.
#[derive(Debug, Clone)]
pub struct NodeHandle {
    token: ShutdownToken,
}

impl NodeHandle {
    pub(crate) fn new(token: ShutdownToken) -> Self {
        Self { token }
    }

    /// Stop the accept loop and every connection worker. Safe to call repeatedly and concurrently with `run`.
    pub fn stop(&self) {
        self.token.trigger();
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_triggered()
    }
}
