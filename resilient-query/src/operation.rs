//! The operation contract wrapped by the executor.
//!
//! An operation is a deferred remote call: invoking it yields either a value
//! or a [`Failure`]. The executor may invoke it several times (once per
//! attempt) but never keeps it beyond a single `execute` call.

use crate::cancellation::CancellationToken;
use crate::errors::Failure;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

/// A remote call that can be attempted repeatedly.
#[async_trait]
pub trait Operation<T: Send>: Send + Sync {
    /// Runs one attempt.
    ///
    /// `token` is cancelled when the caller aborts the execution. For
    /// operations that report [`supports_cancellation`](Self::supports_cancellation),
    /// it is scoped to this attempt and is also cancelled when the attempt
    /// times out.
    async fn call(&self, token: Arc<CancellationToken>) -> Result<T, Failure>;

    /// Whether the operation stops its own work when `token` is cancelled.
    ///
    /// Operations returning `false` are simply dropped on timeout; anything
    /// they handed off to other tasks keeps running and its result is ignored.
    fn supports_cancellation(&self) -> bool {
        false
    }
}

#[async_trait]
impl<T: Send + 'static, O: Operation<T> + ?Sized> Operation<T> for Arc<O> {
    async fn call(&self, token: Arc<CancellationToken>) -> Result<T, Failure> {
        (**self).call(token).await
    }

    fn supports_cancellation(&self) -> bool {
        (**self).supports_cancellation()
    }
}

#[async_trait]
impl<T: Send + 'static, O: Operation<T> + ?Sized> Operation<T> for Box<O> {
    async fn call(&self, token: Arc<CancellationToken>) -> Result<T, Failure> {
        (**self).call(token).await
    }

    fn supports_cancellation(&self) -> bool {
        (**self).supports_cancellation()
    }
}

/// Operation backed by a zero-argument closure.
#[derive(Debug, Clone)]
pub struct FnOperation<F> {
    f: F,
}

/// Wraps a closure returning a future as an [`Operation`].
///
/// The closure ignores cancellation.
pub fn from_fn<F, Fut, T>(f: F) -> FnOperation<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, Failure>> + Send + 'static,
    T: Send + 'static,
{
    FnOperation { f }
}

#[async_trait]
impl<F, Fut, T> Operation<T> for FnOperation<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, Failure>> + Send + 'static,
    T: Send + 'static,
{
    async fn call(&self, _token: Arc<CancellationToken>) -> Result<T, Failure> {
        (self.f)().await
    }
}

/// Operation backed by a closure that observes its cancellation token.
#[derive(Debug, Clone)]
pub struct CancellableFnOperation<F> {
    f: F,
}

/// Wraps a token-aware closure as an [`Operation`] that supports cancellation.
pub fn cancellable_fn<F, Fut, T>(f: F) -> CancellableFnOperation<F>
where
    F: Fn(Arc<CancellationToken>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, Failure>> + Send + 'static,
    T: Send + 'static,
{
    CancellableFnOperation { f }
}

#[async_trait]
impl<F, Fut, T> Operation<T> for CancellableFnOperation<F>
where
    F: Fn(Arc<CancellationToken>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, Failure>> + Send + 'static,
    T: Send + 'static,
{
    async fn call(&self, token: Arc<CancellationToken>) -> Result<T, Failure> {
        (self.f)(token).await
    }

    fn supports_cancellation(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_from_fn_invokes_closure_each_call() {
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let op = {
            let calls = calls.clone();
            from_fn(move || {
                let n = calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                async move { Ok::<_, Failure>(n) }
            })
        };

        let token = Arc::new(CancellationToken::new());
        assert_eq!(op.call(token.clone()).await, Ok(0));
        assert_eq!(op.call(token).await, Ok(1));
        assert!(!op.supports_cancellation());
    }

    #[tokio::test]
    async fn test_cancellable_fn_sees_token() {
        let op = cancellable_fn(|token: Arc<CancellationToken>| async move {
            if token.is_cancelled() {
                Err(Failure::cancelled("seen"))
            } else {
                Ok(1)
            }
        });
        assert!(op.supports_cancellation());

        let token = Arc::new(CancellationToken::new());
        assert_eq!(op.call(token.clone()).await, Ok(1));
        token.cancel("stop");
        assert!(op.call(token).await.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn test_boxed_operations_share_a_batch() {
        let ops: Vec<Box<dyn Operation<i32>>> = vec![
            Box::new(from_fn(|| async { Ok(1) })),
            Box::new(cancellable_fn(|_token| async { Ok(2) })),
        ];

        let token = Arc::new(CancellationToken::new());
        assert_eq!(ops[0].call(token.clone()).await, Ok(1));
        assert_eq!(ops[1].call(token).await, Ok(2));
        assert!(ops[1].supports_cancellation());
    }
}
