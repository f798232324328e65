//! Cooperative cancellation primitives.
//!
//! A [`CancelHandle`] is held by the task registry; pipelines and the model
//! client hold cloneable [`CancelToken`]s that they poll between stages and
//! during retry waits. In-flight model calls are never forcibly aborted;
//! their results are simply discarded once the flag is observed.

use tokio::sync::watch;

/// Sender side of a cancellation signal.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Create a fresh handle/token pair.
    pub fn new() -> (Self, CancelToken) {
        let (tx, rx) = watch::channel(false);
        (Self { tx }, CancelToken { rx })
    }

    /// Set the cancellation flag. Idempotent.
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Derive another token observing this handle.
    pub fn token(&self) -> CancelToken {
        CancelToken {
            rx: self.tx.subscribe(),
        }
    }
}

/// Receiver side of a cancellation signal. Cheap to clone.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    /// A token that can never be cancelled (for tests and fire-and-forget calls).
    pub fn never() -> Self {
        let (tx, rx) = watch::channel(false);
        // Leak the sender so the channel stays open for the token's lifetime.
        std::mem::forget(tx);
        Self { rx }
    }

    /// Non-blocking poll of the cancellation flag.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once cancellation is requested. Never resolves if the
    /// handle is dropped without cancelling.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow() {
                return;
            }
            if rx.changed().await.is_err() {
                // Handle dropped without cancelling: park forever.
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_initially_not_cancelled() {
        let (handle, token) = CancelHandle::new();
        assert!(!handle.is_cancelled());
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_cancel_observed_by_all_tokens() {
        let (handle, token) = CancelHandle::new();
        let second = handle.token();
        handle.cancel();
        assert!(token.is_cancelled());
        assert!(second.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_future_resolves() {
        let (handle, token) = CancelHandle::new();
        let waiter = tokio::spawn(async move { token.cancelled().await });
        handle.cancel();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("cancelled() should resolve promptly")
            .unwrap();
    }

    #[tokio::test]
    async fn test_never_token_does_not_resolve() {
        let token = CancelToken::never();
        assert!(!token.is_cancelled());
        let result =
            tokio::time::timeout(Duration::from_millis(50), async { token.cancelled().await })
                .await;
        assert!(result.is_err(), "never token must not resolve");
    }
}
