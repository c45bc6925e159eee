//! Wall-clock bound on a single attempt.

use crate::cancellation::CancellationToken;
use crate::errors::Failure;
use crate::operation::Operation;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

/// Builds the failure reported for a cancelled token.
#[must_use]
pub fn cancelled_failure(token: &CancellationToken) -> Failure {
    Failure::cancelled(token.reason().unwrap_or_else(|| "cancelled".to_string()))
}

/// Runs one attempt of `op`, failing with a timeout failure after `timeout`.
///
/// The attempt, a timer and `token` race; the first to finish decides the
/// outcome. A panic inside the attempt becomes a [`Failure::panicked`].
///
/// On timeout the attempt future is dropped and any late result is ignored.
/// Operations that support cancellation additionally see their attempt token
/// cancelled. Operations that don't are not told: work they spawned onto
/// other tasks keeps running in the background until it completes on its own.
pub async fn with_timeout<T, O>(
    op: &O,
    timeout: Duration,
    token: &Arc<CancellationToken>,
) -> Result<T, Failure>
where
    T: Send,
    O: Operation<T> + ?Sized,
{
    if token.is_cancelled() {
        return Err(cancelled_failure(token));
    }

    // The child unlinks from `token` when this function returns.
    let child = op
        .supports_cancellation()
        .then(|| CancellationToken::child_of(token));
    let attempt_token = child
        .as_ref()
        .map_or_else(|| token.clone(), |child| child.token().clone());

    let attempt = AssertUnwindSafe(async { op.call(attempt_token.clone()).await }).catch_unwind();

    tokio::select! {
        biased;
        () = token.cancelled() => Err(cancelled_failure(token)),
        outcome = attempt => match outcome {
            Ok(result) => result,
            Err(payload) => Err(Failure::panicked(panic_message(payload.as_ref()))),
        },
        () = tokio::time::sleep(timeout) => {
            if let Some(child) = &child {
                child.cancel(format!("attempt exceeded {}ms", timeout.as_millis()));
            }
            Err(Failure::timeout(timeout))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
