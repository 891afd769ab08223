//! Observer subscriptions for state published by the session core.
//!
//! The presentation layer subscribes on mount and drops the subscription on
//! teardown; there is no separate unsubscribe call.

use tokio::sync::watch;

/// A live view of a published value.
///
/// Only the latest value is retained: a slow observer sees the most recent
/// state, never a backlog of intermediate ones.
#[derive(Debug)]
pub struct Subscription<T> {
    inner: watch::Receiver<T>,
}

impl<T: Clone> Subscription<T> {
    pub(crate) fn new(inner: watch::Receiver<T>) -> Self {
        Self { inner }
    }

    /// The latest published value.
    pub fn current(&self) -> T {
        self.inner.borrow().clone()
    }

    /// Wait for the next change and return the new value.
    ///
    /// Returns `None` once the publisher has been dropped.
    pub async fn changed(&mut self) -> Option<T> {
        self.inner.changed().await.ok()?;
        Some(self.inner.borrow_and_update().clone())
    }

    /// Whether a change has been published since the last `changed()` call.
    pub fn has_changed(&self) -> bool {
        self.inner.has_changed().unwrap_or(false)
    }
}
