//! Cooperative cancellation for pipeline invocations.
//!
//! Every [`ExecutionContext`](crate::pipeline::ExecutionContext) carries a
//! token. Components poll it between units of work; the pipeline itself
//! checks it before entering each component.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
#[cfg(feature = "async")]
use std::time::Duration;

use thiserror::Error;

#[cfg(feature = "async")]
const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Shared cancellation flag, optionally linked to a parent.
///
/// A transport usually owns one token per connection and hands each request
/// a [`child_token`](CancellationToken::child_token): closing the connection
/// stops every request on it, while a single request can be abandoned on its
/// own.
///
/// ```
/// use ferrous_host::CancellationToken;
///
/// let connection = CancellationToken::new();
/// let first = connection.child_token();
/// let second = connection.child_token();
///
/// first.cancel();
/// assert!(!second.is_cancelled());
///
/// connection.cancel();
/// assert!(second.check().is_err());
/// ```
#[derive(Clone, Default)]
pub struct CancellationToken {
    link: Arc<Link>,
}

#[derive(Default)]
struct Link {
    requested: AtomicBool,
    parent: Option<CancellationToken>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// A token cancelled together with `self`, which can also be cancelled
    /// on its own.
    pub fn child_token(&self) -> Self {
        Self {
            link: Arc::new(Link {
                requested: AtomicBool::new(false),
                parent: Some(self.clone()),
            }),
        }
    }

    pub fn cancel(&self) {
        self.link.requested.store(true, Ordering::Release);
    }

    /// Whether this token or any ancestor was cancelled.
    pub fn is_cancelled(&self) -> bool {
        let mut current = Some(self);
        while let Some(token) = current {
            if token.link.requested.load(Ordering::Acquire) {
                return true;
            }
            current = token.link.parent.as_ref();
        }
        false
    }

    /// `Err` once cancellation has been requested.
    pub fn check(&self) -> Result<(), CancellationError> {
        match self.is_cancelled() {
            true => Err(CancellationError::new("operation was cancelled")),
            false => Ok(()),
        }
    }

    /// Resolves once the token is cancelled. Pair with `tokio::select!` to
    /// abandon long waits.
    #[cfg(feature = "async")]
    pub async fn cancelled(&self) {
        loop {
            if self.is_cancelled() {
                return;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Cancels the token once `delay` has passed. Requires a running tokio
    /// runtime.
    #[cfg(feature = "async")]
    pub fn cancel_after(&self, delay: Duration) {
        let token = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            token.cancel();
        });
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("CancellationToken")
            .field(&self.is_cancelled())
            .finish()
    }
}

/// Raised when work observes a cancelled token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cancelled: {reason}")]
pub struct CancellationError {
    reason: String,
}

impl CancellationError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_token_stops_every_request() {
        let connection = CancellationToken::new();
        let requests: Vec<_> = (0..3).map(|_| connection.child_token()).collect();
        let step = requests[1].child_token();

        assert!(requests.iter().all(|r| r.check().is_ok()));
        connection.cancel();
        assert!(requests.iter().all(CancellationToken::is_cancelled));
        assert!(step.is_cancelled());
    }

    #[test]
    fn request_token_leaves_siblings_and_parent_alone() {
        let connection = CancellationToken::new();
        let slow = connection.child_token();
        let fast = connection.child_token();

        slow.cancel();
        assert!(slow.is_cancelled());
        assert!(!fast.is_cancelled());
        assert!(!connection.is_cancelled());
    }

    #[test]
    fn check_reports_a_reason() {
        let token = CancellationToken::new();
        token.cancel();
        let err = token.check().unwrap_err();
        assert_eq!(err.reason(), "operation was cancelled");
        assert_eq!(err.to_string(), "cancelled: operation was cancelled");
    }

    #[cfg(feature = "async")]
    #[tokio::test]
    async fn deadline_cancels_request() {
        let request = CancellationToken::new();
        request.cancel_after(Duration::from_millis(10));
        assert!(!request.is_cancelled());

        tokio::time::timeout(Duration::from_secs(1), request.cancelled())
            .await
            .expect("deadline should fire");
        assert!(request.check().is_err());
    }
}
