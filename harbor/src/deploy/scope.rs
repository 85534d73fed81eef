//! Cancellation scope shared by cooperating tasks

use std::sync::Arc;

use tokio::sync::watch;

/// A cloneable cancellation token.
///
/// Every clone observes the same flag. Cancelling is idempotent and
/// `cancelled()` resolves immediately once the flag is set, so it can be
/// polled at each suspension point of a loop.
#[derive(Debug, Clone)]
pub struct CancelScope {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelScope {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once the scope is cancelled
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // the sender lives as long as self, so wait_for cannot fail
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelScope {
    fn default() -> Self {
        Self::new()
    }
}
