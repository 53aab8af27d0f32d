//! Operation-scoped context for a single resolution run.
//!
//! A [`ResolveContext`] is created by the caller before loading a document
//! and passed down every recursive call, including into resource loaders.
//! It carries the cancellation signal and an optional deadline so that a
//! slow remote fetch or a very long chain can be aborted without finishing.
//!
//! # Example
//!
//! ```rust,no_run
//! use compose_extends::core::ResolveContext;
//! use std::time::Duration;
//!
//! let ctx = ResolveContext::new().with_timeout(Duration::from_secs(30));
//! assert!(ctx.checkpoint().is_ok());
//!
//! ctx.cancel();
//! assert!(ctx.checkpoint().is_err());
//! ```

use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use super::ExtendsError;

/// Context for one resolution run.
///
/// Cloning the context shares the cancellation token, so cancelling from
/// any clone (e.g. a Ctrl-C handler) is observed by the resolver.
#[derive(Debug, Clone, Default)]
pub struct ResolveContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl ResolveContext {
    /// Create a context with a fresh token and no deadline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context observing an existing cancellation token.
    #[must_use]
    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Set a deadline relative to now.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    /// Set an absolute deadline.
    #[must_use]
    pub const fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Time left before the deadline, if one is set.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline.map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Fail if the run was cancelled or the deadline has passed.
    ///
    /// Called at the top of every recursive resolution step and before every
    /// blocking loader call.
    pub fn checkpoint(&self) -> Result<(), ExtendsError> {
        if self.token.is_cancelled() {
            return Err(ExtendsError::Cancelled);
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(ExtendsError::DeadlineExceeded);
            }
        }
        Ok(())
    }
}
