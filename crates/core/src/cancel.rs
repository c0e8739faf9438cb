//! Cooperative cancellation shared by every suspension point of a run.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Cancellation flag shared between the interrupt listener and the workers.
pub type CancellationSignal = Arc<AtomicBool>;

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Marker returned when a cancellable wait was interrupted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

#[must_use]
pub fn new_signal() -> CancellationSignal {
    Arc::new(AtomicBool::new(false))
}

#[must_use]
pub fn is_cancelled(cancel: Option<&CancellationSignal>) -> bool {
    cancel.is_some_and(|token| token.load(Ordering::Acquire))
}

pub fn cancel(signal: &CancellationSignal) {
    signal.store(true, Ordering::Release);
}

/// Drives `future` to completion unless the signal fires first.
///
/// # Errors
/// Returns [`Cancelled`] if the signal was set before or while waiting.
pub async fn await_or_cancel<F>(
    future: F,
    cancellation: Option<&CancellationSignal>,
) -> Result<F::Output, Cancelled>
where
    F: Future,
{
    if cancellation.is_none() {
        return Ok(future.await);
    }

    let mut future = Box::pin(future);

    loop {
        if is_cancelled(cancellation) {
            return Err(Cancelled);
        }

        if let Ok(output) = tokio::time::timeout(CANCEL_POLL_INTERVAL, &mut future).await {
            if is_cancelled(cancellation) {
                return Err(Cancelled);
            }
            return Ok(output);
        }
    }
}

/// Sleeps for `duration`, waking early on cancellation. A zero duration only
/// checks the signal.
///
/// # Errors
/// Returns [`Cancelled`] if the signal was set.
pub async fn sleep_or_cancel(
    duration: Duration,
    cancellation: Option<&CancellationSignal>,
) -> Result<(), Cancelled> {
    if duration.is_zero() {
        return if is_cancelled(cancellation) { Err(Cancelled) } else { Ok(()) };
    }
    await_or_cancel(tokio::time::sleep(duration), cancellation).await
}
