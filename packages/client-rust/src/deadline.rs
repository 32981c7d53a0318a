//! Deadline-aware wait primitive.
//!
//! Races a future against a timer and an optional cancellation token and
//! reports which of the two interrupted it, so the caller can tell a timeout
//! from a caller-driven cancellation.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Timeout applied when the caller supplies none (or zero).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(2500);

/// What stopped a wait before the awaited future completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    DeadlineElapsed,
    Cancelled,
}

/// Resolves the per-call timeout: `requested` if set and non-zero, else `default`.
#[must_use]
pub fn effective_timeout(requested: Option<Duration>, default: Duration) -> Duration {
    match requested {
        Some(timeout) if !timeout.is_zero() => timeout,
        _ => default,
    }
}

/// Awaits `fut` until it completes, `timeout` elapses, or `cancel` fires.
///
/// Completion is checked first, so a future that is already ready wins even
/// if the token was cancelled beforehand.
///
/// # Errors
///
/// Returns the [`Interrupt`] that fired first if `fut` did not complete.
pub async fn race<F>(
    fut: F,
    cancel: Option<&CancellationToken>,
    timeout: Duration,
) -> Result<F::Output, Interrupt>
where
    F: Future,
{
    let cancelled = async {
        match cancel {
            Some(token) => token.cancelled().await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        biased;
        output = fut => Ok(output),
        () = cancelled => Err(Interrupt::Cancelled),
        () = tokio::time::sleep(timeout) => Err(Interrupt::DeadlineElapsed),
    }
}
