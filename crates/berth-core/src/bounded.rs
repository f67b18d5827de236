//! Timeout and cancellation guard for remote calls.
//!
//! Every request to the registry or the orchestrator goes through
//! [`bounded`]. A cancelled token wins over a not-yet-started call, so an
//! aborted workflow never issues a request. A timed-out call says nothing
//! about whether the remote side applied it.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::{Error, Step};

/// Why a bounded call did not produce an output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupted {
    TimedOut(Duration),
    Cancelled,
}

impl Interrupted {
    /// Map into the error taxonomy. Timeouts are transient.
    pub fn into_error(self, step: Step, target: &str) -> Error {
        match self {
            Interrupted::TimedOut(after) => Error::Transient {
                step,
                target: target.to_string(),
                message: format!("timed out after {after:?}"),
            },
            Interrupted::Cancelled => Error::Cancelled {
                step,
                target: target.to_string(),
            },
        }
    }
}

/// Run `fut` until it completes, `timeout` elapses, or `cancel` fires.
pub async fn bounded<F>(
    timeout: Duration,
    cancel: &CancellationToken,
    fut: F,
) -> std::result::Result<F::Output, Interrupted>
where
    F: Future,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Interrupted::Cancelled),
        res = tokio::time::timeout(timeout, fut) => res.map_err(|_| Interrupted::TimedOut(timeout)),
    }
}
