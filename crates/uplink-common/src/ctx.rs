//! Collection context — deadline plus cancellation handle.
//!
//! Every external interaction (probe, RPC, HTTP call, process spawn) is
//! bounded by a `Ctx`. Cancellation uses the watch-channel shutdown idiom:
//! the agent flips a `watch::Sender<bool>` on SIGINT and every in-flight
//! collect aborts at its next suspension point.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use crate::error::{CollectorError, Result};

#[derive(Debug, Clone)]
pub struct Ctx {
    deadline: Option<Instant>,
    cancel: Option<watch::Receiver<bool>>,
}

impl Ctx {
    /// A context with no deadline and no cancellation — tests and one-shot tools.
    pub fn background() -> Self {
        Ctx {
            deadline: None,
            cancel: None,
        }
    }

    /// A context that expires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Ctx {
            deadline: Some(Instant::now() + timeout),
            cancel: None,
        }
    }

    /// Attach a cancellation flag. The context counts as cancelled once the
    /// watched value becomes `true`.
    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Derive a child context whose deadline is the sooner of the parent
    /// deadline and `timeout` from now. Used for per-transport sub-deadlines.
    pub fn child(&self, timeout: Duration) -> Ctx {
        let sub = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(parent) => Some(parent.min(sub)),
            None => Some(sub),
        };
        Ctx {
            deadline,
            cancel: self.cancel.clone(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Time left until the deadline. `None` means unbounded;
    /// `Some(Duration::ZERO)` means already expired.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    pub fn deadline_expired(&self) -> bool {
        self.remaining() == Some(Duration::ZERO)
    }

    /// Fail fast when the context is already dead. Call before starting work.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(CollectorError::Cancelled);
        }
        if self.deadline_expired() {
            return Err(CollectorError::Timeout(Duration::ZERO));
        }
        Ok(())
    }

    /// Resolves when the cancellation flag flips. Pends forever when the
    /// context carries no cancel handle.
    pub async fn cancelled(&self) {
        match self.cancel.clone() {
            Some(mut rx) => {
                if *rx.borrow() {
                    return;
                }
                // Channel closure counts as cancellation: the sender is gone.
                while rx.changed().await.is_ok() {
                    if *rx.borrow() {
                        return;
                    }
                }
            }
            None => std::future::pending::<()>().await,
        }
    }

    /// Run `fut` bounded by this context. Returns `Cancelled` or `Timeout`
    /// when the context dies first.
    pub async fn run<F, T>(&self, fut: F) -> Result<T>
    where
        F: std::future::Future<Output = T>,
    {
        self.check()?;
        let budget = self.remaining();
        tokio::select! {
            out = fut => Ok(out),
            _ = self.cancelled() => Err(CollectorError::Cancelled),
            _ = sleep_until_opt(budget) => {
                Err(CollectorError::Timeout(budget.unwrap_or_default()))
            }
        }
    }
}

async fn sleep_until_opt(budget: Option<Duration>) {
    match budget {
        Some(d) => tokio::time::sleep(d).await,
        None => std::future::pending::<()>().await,
    }
}
