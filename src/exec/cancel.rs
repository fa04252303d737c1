// src/exec/cancel.rs

//! Cooperative cancellation.
//!
//! A [`CancellationSignal`] is a cheaply clonable flag shared by everything
//! taking part in a pass. Raising it never interrupts running code; nodes
//! observe it at their own checkpoints.
//!
//! Signals form a tree: a [`child`](CancellationSignal::child) is cancelled
//! whenever its parent is, while cancelling the child leaves the parent
//! alone. The scheduler uses a child of the caller's signal so it can stop
//! in-flight siblings after a failure without touching the caller's state.

use tokio_util::sync::CancellationToken;

use crate::errors::OperationError;

#[derive(Debug, Clone, Default)]
pub struct CancellationSignal {
    token: CancellationToken,
}

impl CancellationSignal {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Raise the signal. Idempotent.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Checkpoint helper for operations: `cancel.check()?` between phases.
    pub fn check(&self) -> Result<(), OperationError> {
        if self.is_cancelled() {
            Err(OperationError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Resolves once the signal is raised.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    /// New signal that is raised together with this one.
    pub fn child(&self) -> CancellationSignal {
        CancellationSignal {
            token: self.token.child_token(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn cancel_is_visible_to_clones() {
        let signal = CancellationSignal::new();
        let clone = signal.clone();
        assert!(!clone.is_cancelled());
        assert_eq!(clone.check(), Ok(()));

        signal.cancel();
        signal.cancel();
        assert!(clone.is_cancelled());
        assert_eq!(clone.check(), Err(OperationError::Cancelled));
    }

    #[test]
    fn children_follow_parents_but_not_the_reverse() {
        let parent = CancellationSignal::new();
        let child = parent.child();
        let grandchild = child.child();

        child.cancel();
        assert!(!parent.is_cancelled());
        assert!(grandchild.is_cancelled());

        let other = parent.child();
        parent.cancel();
        assert!(other.is_cancelled());
    }

    #[test]
    fn child_of_cancelled_parent_starts_cancelled() {
        let parent = CancellationSignal::new();
        parent.cancel();
        assert!(parent.child().is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_future_resolves_after_cancel() {
        let signal = CancellationSignal::new();
        let waiter = {
            let signal = signal.clone();
            tokio::spawn(async move { signal.cancelled().await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        signal.cancel();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("cancelled() did not resolve")
            .unwrap();
    }

    #[tokio::test]
    async fn parent_cancel_wakes_a_waiting_child() {
        let parent = CancellationSignal::new();
        let child = parent.child();
        let waiter = tokio::spawn(async move { child.cancelled().await });

        parent.cancel();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("child was not woken")
            .unwrap();
    }
}
