//! Cancellation token for cooperative cancellation.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::Notify;
use tracing::warn;

/// A callback type for cancellation notifications.
pub type CancelCallback = Box<dyn Fn() + Send + Sync>;

/// A token for cooperative cancellation.
///
/// Cancellation is idempotent - only the first cancellation reason is kept.
/// Async code waits on [`cancelled`](Self::cancelled); sync code can poll
/// [`is_cancelled`](Self::is_cancelled) or register a callback.
#[derive(Default)]
pub struct CancellationToken {
    /// Whether cancellation has been requested.
    cancelled: AtomicBool,
    /// The reason for cancellation (first one wins).
    reason: RwLock<Option<String>>,
    /// Callbacks to invoke on cancellation, keyed by registration id.
    callbacks: RwLock<Vec<(u64, CancelCallback)>>,
    /// Next registration id.
    next_id: AtomicU64,
    /// Wakes tasks parked in `cancelled()`.
    notify: Notify,
}

impl CancellationToken {
    /// Creates a new cancellation token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a token that is cancelled whenever `parent` is.
    ///
    /// Cancelling the child does not affect the parent. The link to the
    /// parent is removed when the returned [`ChildToken`] drops.
    #[must_use]
    pub fn child_of(parent: &Arc<Self>) -> ChildToken {
        let child = Arc::new(Self::new());
        let weak: Weak<Self> = Arc::downgrade(&child);
        let registration = parent.register(move || {
            if let Some(child) = weak.upgrade() {
                child.cancel("parent cancelled");
            }
        });
        ChildToken {
            token: child,
            parent: Arc::downgrade(parent),
            registration,
        }
    }

    /// Requests cancellation with a reason.
    ///
    /// This is idempotent - only the first reason is kept.
    /// Callbacks are invoked immediately. Panics in callbacks are logged and suppressed.
    pub fn cancel(&self, reason: impl Into<String>) {
        if self
            .cancelled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            *self.reason.write() = Some(reason.into());
            self.notify.notify_waiters();

            let callbacks = std::mem::take(&mut *self.callbacks.write());
            for (_, callback) in &callbacks {
                invoke(&**callback);
            }
        }
    }

    /// Registers a callback to be invoked on cancellation.
    ///
    /// If already cancelled, the callback is invoked immediately.
    pub fn on_cancel<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.register(callback);
    }

    /// Number of callbacks still waiting for cancellation.
    #[must_use]
    pub fn pending_callbacks(&self) -> usize {
        self.callbacks.read().len()
    }

    /// Stores `callback` and returns its id, or runs it right away and
    /// returns `None` when the token is already cancelled.
    fn register<F>(&self, callback: F) -> Option<u64>
    where
        F: Fn() + Send + Sync + 'static,
    {
        {
            let mut callbacks = self.callbacks.write();
            // `cancel` drains under this lock, so the flag cannot flip unseen.
            if !self.is_cancelled() {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                callbacks.push((id, Box::new(callback)));
                return Some(id);
            }
        }
        invoke(&callback);
        None
    }

    fn unregister(&self, id: u64) {
        self.callbacks.write().retain(|(registered, _)| *registered != id);
    }

    /// Returns whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Returns the cancellation reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        self.reason.read().clone()
    }

    /// Completes once cancellation has been requested.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

fn invoke(callback: &(dyn Fn() + Send + Sync)) {
    if let Err(e) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(callback)) {
        warn!("Cancellation callback panicked: {:?}", e);
    }
}

/// A child token linked to its parent until dropped.
#[derive(Debug)]
pub struct ChildToken {
    token: Arc<CancellationToken>,
    parent: Weak<CancellationToken>,
    registration: Option<u64>,
}

impl ChildToken {
    /// Returns the child token.
    #[must_use]
    pub fn token(&self) -> &Arc<CancellationToken> {
        &self.token
    }
}

impl std::ops::Deref for ChildToken {
    type Target = CancellationToken;

    fn deref(&self) -> &Self::Target {
        &self.token
    }
}

impl Drop for ChildToken {
    fn drop(&mut self) {
        if let (Some(id), Some(parent)) = (self.registration, self.parent.upgrade()) {
            parent.unregister(id);
        }
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .field("reason", &self.reason())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[test]
    fn test_token_default_not_cancelled() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
        assert!(token.reason().is_none());
    }

    #[test]
    fn test_token_cancel_idempotent() {
        let token = CancellationToken::new();
        token.cancel("First reason");
        token.cancel("Second reason");

        assert!(token.is_cancelled());
        assert_eq!(token.reason(), Some("First reason".to_string()));
    }

    #[test]
    fn test_on_cancel_before_and_after_cancellation() {
        let token = CancellationToken::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let before = counter.clone();
        token.on_cancel(move || {
            before.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        token.cancel("test");
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        let after = counter.clone();
        token.on_cancel(move || {
            after.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_callback_panic_suppressed() {
        let token = CancellationToken::new();
        token.on_cancel(|| panic!("Intentional panic"));

        token.cancel("test");
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_child_follows_parent() {
        let parent = Arc::new(CancellationToken::new());
        let child = CancellationToken::child_of(&parent);
        let sibling = CancellationToken::child_of(&parent);

        child.cancel("attempt timed out");
        assert!(!parent.is_cancelled());
        assert!(!sibling.is_cancelled());

        parent.cancel("shutdown");
        assert!(sibling.is_cancelled());
        assert_eq!(sibling.reason(), Some("parent cancelled".to_string()));
    }

    #[test]
    fn test_dropped_child_unlinks_from_parent() {
        let parent = Arc::new(CancellationToken::new());
        let kept = CancellationToken::child_of(&parent);
        for _ in 0..100 {
            let child = CancellationToken::child_of(&parent);
            assert!(!child.is_cancelled());
        }
        assert_eq!(parent.pending_callbacks(), 1);

        drop(kept);
        assert_eq!(parent.pending_callbacks(), 0);
    }

    #[test]
    fn test_child_of_cancelled_parent_starts_cancelled() {
        let parent = Arc::new(CancellationToken::new());
        parent.cancel("shutdown");

        let child = CancellationToken::child_of(&parent);
        assert!(child.is_cancelled());
        assert_eq!(parent.pending_callbacks(), 0);
    }

    #[test]
    fn test_on_cancel_races_with_cancel() {
        for _ in 0..200 {
            let token = Arc::new(CancellationToken::new());
            let fired = Arc::new(AtomicUsize::new(0));

            let canceller = {
                let token = token.clone();
                std::thread::spawn(move || token.cancel("race"))
            };
            let counter = fired.clone();
            token.on_cancel(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
            canceller.join().unwrap();

            assert_eq!(fired.load(Ordering::SeqCst), 1);
            assert_eq!(token.pending_callbacks(), 0);
        }
    }

    #[test]
    fn test_callback_may_register_during_cancel() {
        let token = Arc::new(CancellationToken::new());
        let fired = Arc::new(AtomicUsize::new(0));
        {
            let inner = token.clone();
            let fired = fired.clone();
            token.on_cancel(move || {
                let fired = fired.clone();
                inner.on_cancel(move || {
                    fired.fetch_add(1, Ordering::SeqCst);
                });
            });
        }

        token.cancel("nested");
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cancelled_resolves_immediately_when_already_cancelled() {
        let token = CancellationToken::new();
        token.cancel("done");
        tokio_test::block_on(token.cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_wakes_waiter() {
        let token = Arc::new(CancellationToken::new());
        let waiter = {
            let token = token.clone();
            tokio::spawn(async move { token.cancelled().await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        token.cancel("stop");
        waiter.await.unwrap();
    }
}
