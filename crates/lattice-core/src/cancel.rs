//! Cooperative cancellation primitives.
//!
//! Cancellation is a signal, not an error: a cancelled job must still be
//! given the chance to finish its in-flight operation call and capture
//! state. [`CancelHandle`] is held by whoever may cancel (the job runner);
//! [`CancelToken`] clones are handed to the job and down into operation
//! calls that honor wait-for-completion semantics.

use std::sync::OnceLock;

use tokio::sync::watch;

/// Sender side of a cancellation signal.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Create a handle and its first token.
    pub fn new() -> (Self, CancelToken) {
        let (tx, rx) = watch::channel(false);
        (Self { tx }, CancelToken { rx })
    }

    /// Raise the cancellation signal. Idempotent.
    pub fn cancel(&self) {
        // Receivers may all have been dropped already; that is fine.
        let _ = self.tx.send(true);
    }

    /// Whether the signal has been raised.
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// A fresh token observing this handle.
    pub fn token(&self) -> CancelToken {
        CancelToken {
            rx: self.tx.subscribe(),
        }
    }
}

/// Receiver side of a cancellation signal.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    /// A token that can never be cancelled. Used by jobs run without an
    /// external canceller and by tests.
    pub fn never() -> Self {
        // One process-wide sender that is never dropped and never signalled,
        // shared by every never-token.
        static NEVER: OnceLock<watch::Sender<bool>> = OnceLock::new();
        let tx = NEVER.get_or_init(|| watch::channel(false).0);
        Self { rx: tx.subscribe() }
    }

    /// Whether cancellation has been signalled.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until cancellation is signalled.
    ///
    /// Pending forever if the handle is dropped without cancelling, so a
    /// completed job never observes a phantom signal.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                // Handle dropped without cancelling.
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_cancel_propagates() {
        let (handle, token) = CancelHandle::new();
        assert!(!token.is_cancelled());

        handle.cancel();
        assert!(token.is_cancelled());
        assert!(handle.is_cancelled());

        // Must resolve promptly once signalled.
        tokio::time::timeout(Duration::from_secs(1), token.cancelled())
            .await
            .expect("cancelled() should resolve after cancel()");
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent() {
        let (handle, token) = CancelHandle::new();
        handle.cancel();
        handle.cancel();
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_cloned_tokens_observe_signal() {
        let (handle, token) = CancelHandle::new();
        let clone = token.clone();
        let fresh = handle.token();

        handle.cancel();
        assert!(clone.is_cancelled());
        assert!(fresh.is_cancelled());
    }

    #[tokio::test]
    async fn test_never_token() {
        let token = CancelToken::never();
        assert!(!token.is_cancelled());

        let waited = tokio::time::timeout(Duration::from_millis(20), token.cancelled()).await;
        assert!(waited.is_err(), "never-token must not resolve");

        // Never-tokens share one channel; dropping some must not close it
        // for the rest.
        let survivor = CancelToken::never();
        drop(CancelToken::never());
        drop(token);
        assert!(!survivor.is_cancelled());
        let waited = tokio::time::timeout(Duration::from_millis(20), survivor.cancelled()).await;
        assert!(waited.is_err(), "shared never-channel must stay open");
    }

    #[tokio::test]
    async fn test_dropped_handle_does_not_signal() {
        let (handle, token) = CancelHandle::new();
        drop(handle);
        assert!(!token.is_cancelled());

        let waited = tokio::time::timeout(Duration::from_millis(20), token.cancelled()).await;
        assert!(waited.is_err(), "dropped handle must not look cancelled");
    }
}
