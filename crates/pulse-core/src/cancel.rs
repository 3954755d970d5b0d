//! Cancellation token for the relay's wait loops.
//!
//! The watch loop and the launcher otherwise wait forever. A token lets a
//! caller stop them cooperatively, either explicitly via `cancel()` or by
//! giving the token a deadline. The default token never fires.
//!
//! Loops call `check()` between steps; code that is parked on a single long
//! await (a child process, a socket read) races that await against
//! `cancelled()` instead.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How often `cancelled()` re-reads the shared flag.
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A cancellation token for cooperative cancellation of wait loops.
///
/// This token can be cloned and shared across tasks. When `cancel()` is called
/// on any clone, all clones will observe the cancellation.
///
/// # Example
///
/// ```
/// use pulse_core::cancel::CancellationToken;
/// use std::time::Duration;
///
/// let token = CancellationToken::new();
/// let token_clone = token.clone();
///
/// token_clone.cancel();
/// assert!(token.is_cancelled());
///
/// let bounded = CancellationToken::with_timeout(Duration::from_secs(30));
/// assert!(bounded.check().is_ok());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    deadline: Option<(Instant, Duration)>,
}

impl CancellationToken {
    /// Create a new token with no deadline.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: None,
        }
    }

    /// Create a token that reports cancellation once `timeout` has elapsed.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new().deadline_after(timeout)
    }

    /// Attach a deadline `timeout` from now, keeping the shared cancel flag.
    pub fn deadline_after(mut self, timeout: Duration) -> Self {
        self.deadline = Some((Instant::now() + timeout, timeout));
        self
    }

    /// Request cancellation.
    ///
    /// All clones of this token will observe the cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Check if cancellation has been requested or the deadline has passed.
    pub fn is_cancelled(&self) -> bool {
        self.check().is_err()
    }

    /// Time left before the deadline, if one is set.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|(at, _)| at.saturating_duration_since(Instant::now()))
    }

    /// Resolve once the token is cancelled or its deadline passes.
    ///
    /// Meant for `tokio::select!` against a long-running future; the losing
    /// branch is dropped, which is what actually stops the work.
    pub async fn cancelled(&self) -> CancelledError {
        loop {
            if let Err(e) = self.check() {
                return e;
            }
            let pause = match self.remaining() {
                Some(left) => left.min(CANCEL_POLL_INTERVAL),
                None => CANCEL_POLL_INTERVAL,
            };
            tokio::time::sleep(pause).await;
        }
    }

    /// Check cancellation and return an error if cancelled.
    ///
    /// An explicit `cancel()` takes precedence over an expired deadline.
    pub fn check(&self) -> Result<(), CancelledError> {
        if self.cancelled.load(Ordering::SeqCst) {
            return Err(CancelledError::Cancelled);
        }
        match self.deadline {
            Some((at, budget)) if Instant::now() >= at => {
                Err(CancelledError::DeadlineExceeded(budget))
            }
            _ => Ok(()),
        }
    }
}

/// Error returned when an operation is cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelledError {
    /// `cancel()` was called on the token or one of its clones.
    Cancelled,
    /// The token's deadline passed; carries the original budget.
    DeadlineExceeded(Duration),
}

impl std::fmt::Display for CancelledError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CancelledError::Cancelled => write!(f, "Operation was cancelled"),
            CancelledError::DeadlineExceeded(budget) => {
                write!(f, "Deadline exceeded after {:?}", budget)
            }
        }
    }
}

impl std::error::Error for CancelledError {}

impl From<CancelledError> for crate::error::RelayError {
    fn from(err: CancelledError) -> Self {
        match err {
            CancelledError::Cancelled => crate::error::RelayError::Cancelled,
            CancelledError::DeadlineExceeded(budget) => {
                crate::error::RelayError::DeadlineExceeded(budget)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_token_not_cancelled() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
        assert_eq!(token.remaining(), None);
    }

    #[test]
    fn test_clone_shares_state() {
        let token1 = CancellationToken::new();
        let token2 = token1.clone();

        token1.cancel();

        assert!(token1.is_cancelled());
        assert!(token2.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_resolves_at_deadline() {
        let token = CancellationToken::with_timeout(Duration::from_millis(100));
        let started = Instant::now();

        let err = token.cancelled().await;

        assert_eq!(err, CancelledError::DeadlineExceeded(Duration::from_millis(100)));
        assert!(started.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_cancelled_resolves_on_cancel_from_other_task() {
        let token = CancellationToken::new();
        let remote = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            remote.cancel();
        });

        let err = tokio::time::timeout(Duration::from_secs(2), token.cancelled())
            .await
            .unwrap();
        assert_eq!(err, CancelledError::Cancelled);
    }

    #[test]
    fn test_zero_timeout_expires_immediately() {
        let token = CancellationToken::with_timeout(Duration::ZERO);
        assert_eq!(
            token.check(),
            Err(CancelledError::DeadlineExceeded(Duration::ZERO))
        );
    }

    #[test]
    fn test_long_timeout_not_expired() {
        let token = CancellationToken::with_timeout(Duration::from_secs(3600));
        assert!(token.check().is_ok());
        assert!(token.remaining().unwrap() > Duration::from_secs(3500));
    }

    #[test]
    fn test_explicit_cancel_wins_over_deadline() {
        let token = CancellationToken::with_timeout(Duration::ZERO);
        token.cancel();
        assert_eq!(token.check(), Err(CancelledError::Cancelled));
    }

    #[test]
    fn test_cancelled_error_display() {
        assert_eq!(CancelledError::Cancelled.to_string(), "Operation was cancelled");
    }
}
