//! Cooperative cancellation for in-flight operations

use tokio::sync::watch;

use crate::error::FsError;

/// Cancellation signal for one operation.
///
/// Passed through the recursive walk; checked between nodes and at chunk
/// boundaries inside leaf transfers. Cancellation is cooperative: the walk
/// finishes (or cleans up) the chunk it is on before stopping.
#[derive(Debug)]
pub struct OperationControl {
    cancel_tx: watch::Sender<bool>,
    cancel_rx: watch::Receiver<bool>,
}

impl OperationControl {
    pub fn new() -> Self {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        Self {
            cancel_tx,
            cancel_rx,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel_rx.borrow()
    }

    pub fn cancel(&self) {
        let _ = self.cancel_tx.send(true);
    }

    /// Get a receiver for waiting on cancellation
    pub fn subscribe_cancellation(&self) -> watch::Receiver<bool> {
        self.cancel_rx.clone()
    }

    pub fn check(&self) -> Result<(), FsError> {
        if self.is_cancelled() {
            Err(FsError::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl Default for OperationControl {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_is_sticky_and_observable() {
        let control = OperationControl::new();
        assert!(!control.is_cancelled());
        assert!(control.check().is_ok());

        control.cancel();
        assert!(control.is_cancelled());
        assert!(matches!(control.check(), Err(FsError::Cancelled)));

        // Cancelling again changes nothing
        control.cancel();
        assert!(control.is_cancelled());
    }

    #[tokio::test]
    async fn test_subscribers_see_cancellation() {
        let control = OperationControl::new();
        let mut rx = control.subscribe_cancellation();
        control.cancel();
        rx.changed().await.unwrap();
        assert!(*rx.borrow());
    }
}
