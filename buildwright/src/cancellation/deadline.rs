//! Per-call deadlines raced against the run's cancellation token.

use super::CancellationToken;
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

/// Why a guarded call did not complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interrupted {
    /// The deadline elapsed first.
    DeadlineExceeded(Duration),
    /// The token was cancelled first; carries the reason.
    Cancelled(String),
}

/// Runs `fut` until it completes, the deadline elapses, or `token` is cancelled.
///
/// Cancellation is checked first, so an already-cancelled token never lets the
/// future start. The future is dropped on interruption, which is what kills a
/// child process spawned with `kill_on_drop`.
pub async fn run_with_deadline<F>(
    token: &CancellationToken,
    deadline: Duration,
    fut: F,
) -> Result<F::Output, Interrupted>
where
    F: Future,
{
    tokio::select! {
        biased;
        () = token.cancelled() => Err(Interrupted::Cancelled(
            token.reason().unwrap_or_else(|| "cancelled".to_string()),
        )),
        result = timeout(deadline, fut) => result.map_err(|_| Interrupted::DeadlineExceeded(deadline)),
    }
}
