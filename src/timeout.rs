use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;

use crate::translate::DispatchFailure;

/// Which deadline governs a single call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeoutStrategy {
    /// Dispatch on the client whose own timeout is the configured default.
    UseClientDefault,
    /// Dispatch on the unbounded client under a call-scoped deadline.
    PerCallOverride(Duration),
}

impl TimeoutStrategy {
    pub fn select(per_call: Option<Duration>, client_default: Duration) -> Self {
        match per_call {
            Some(timeout) if !timeout.is_zero() && timeout != client_default => {
                Self::PerCallOverride(timeout)
            }
            _ => Self::UseClientDefault,
        }
    }
}

/// Cancellation scope of one call: the caller's token, optionally OR'ed with a deadline.
///
/// For a per-call override the scope owns a child of the caller token which the
/// deadline cancels when it elapses. The child is cancelled and released when
/// the scope is dropped.
#[derive(Debug)]
pub struct CallCancellation {
    caller: CancellationToken,
    linked: CancellationToken,
    deadline: Option<Instant>,
}

impl CallCancellation {
    pub fn new(strategy: TimeoutStrategy, caller: CancellationToken) -> Self {
        let linked = caller.child_token();
        let deadline = match strategy {
            TimeoutStrategy::UseClientDefault => None,
            TimeoutStrategy::PerCallOverride(timeout) => Some(Instant::now() + timeout),
        };
        Self {
            caller,
            linked,
            deadline,
        }
    }

    pub fn caller_cancelled(&self) -> bool {
        self.caller.is_cancelled()
    }

    /// True once either the caller or the deadline has fired.
    pub fn is_cancelled(&self) -> bool {
        self.linked.is_cancelled()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.linked
    }

    /// Drives `dispatch` until it completes or the scope is cancelled.
    pub async fn run<F, T>(&self, dispatch: F) -> Result<T, DispatchFailure>
    where
        F: Future<Output = Result<T, DispatchFailure>>,
    {
        if self.linked.is_cancelled() {
            return Err(DispatchFailure::Cancelled);
        }

        let deadline = async {
            match self.deadline {
                Some(deadline) => {
                    sleep_until(deadline).await;
                    self.linked.cancel();
                }
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.linked.cancelled() => Err(DispatchFailure::Cancelled),
            _ = deadline => Err(DispatchFailure::Cancelled),
            result = dispatch => result,
        }
    }
}

impl Drop for CallCancellation {
    fn drop(&mut self) {
        self.linked.cancel();
    }
}
