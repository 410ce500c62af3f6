//! Caller-supplied cancellation and deadlines for connection and call setup.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use pin_project::pin_project;
use tokio::time::{Instant, Sleep};
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

use crate::Error;

/// Deadline and cancellation signal threaded through connection establishment and call initiation.
///
/// The core never retries and holds no timers of its own: when the context expires or is
/// canceled, the operation in flight fails with [`Error::Timeout`] or [`Error::Canceled`].
///
/// Cloning a context shares its cancellation signal. Use [`CallContext::child`] for a context
/// that can be canceled on its own but still follows its parent.
#[derive(Clone, Default)]
pub struct CallContext {
    deadline: Option<Instant>,
    token: CancellationToken,
}

impl CallContext {
    /// A context with no deadline which is only canceled explicitly.
    pub fn new() -> Self {
        Self::default()
    }

    /// A context which expires after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// A context which expires at `deadline`.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            token: CancellationToken::new(),
        }
    }

    /// A context canceled by an existing token.
    pub fn with_cancellation(token: CancellationToken) -> Self {
        Self {
            deadline: None,
            token,
        }
    }

    /// Shorten this context's deadline to at most `timeout` from now.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        self.deadline = Some(self.deadline.map_or(deadline, |d| d.min(deadline)));
        self
    }

    /// Derive a context with the same deadline which is canceled when this one is.
    ///
    /// Canceling the child does not cancel the parent.
    pub fn child(&self) -> Self {
        Self {
            deadline: self.deadline,
            token: self.token.child_token(),
        }
    }

    /// Cancel this context and every child derived from it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns `true` once the context has been canceled.
    pub fn is_canceled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The deadline, if one was set.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline. `None` means no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// The cancellation token backing this context.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Fail fast if the context is already done.
    pub(crate) fn check(&self) -> Result<(), Error> {
        if self.is_canceled() {
            return Err(Error::Canceled);
        }

        if self.remaining() == Some(Duration::ZERO) {
            return Err(Error::Timeout);
        }

        Ok(())
    }

    /// Bound `future` by this context's cancellation and deadline.
    pub(crate) fn bound<F>(&self, future: F) -> Bounded<F> {
        Bounded {
            future,
            canceled: self.token.clone().cancelled_owned(),
            sleep: self.deadline.map(tokio::time::sleep_until),
        }
    }
}

impl fmt::Debug for CallContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallContext")
            .field("deadline", &self.deadline)
            .field("canceled", &self.is_canceled())
            .finish()
    }
}

/// Future returned by [`CallContext::bound`].
#[pin_project]
pub(crate) struct Bounded<F> {
    #[pin]
    future: F,
    #[pin]
    canceled: WaitForCancellationFutureOwned,
    #[pin]
    sleep: Option<Sleep>,
}

impl<F> fmt::Debug for Bounded<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bounded")
            .field("deadline", &self.sleep.as_ref().map(|s| s.deadline()))
            .finish_non_exhaustive()
    }
}

impl<F, T> Future for Bounded<F>
where
    F: Future<Output = Result<T, Error>>,
{
    type Output = Result<T, Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();

        if this.canceled.poll(cx).is_ready() {
            tracing::trace!("context canceled");
            return Poll::Ready(Err(Error::Canceled));
        }

        if let Some(sleep) = this.sleep.as_pin_mut() {
            if sleep.poll(cx).is_ready() {
                tracing::trace!("context deadline exceeded");
                return Poll::Ready(Err(Error::Timeout));
            }
        }

        this.future.poll(cx)
    }
}
