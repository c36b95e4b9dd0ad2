//! Collector error taxonomy.
//!
//! Every transport failure is folded into one of these kinds before it
//! crosses a module boundary. `SynthesizedData` is deliberately loud: a
//! record built from placeholder values always travels together with this
//! error so callers cannot mistake it for a real reading.

use std::time::Duration;

pub type Result<T> = std::result::Result<T, CollectorError>;

#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    /// The caller cancelled the context. Never retried.
    #[error("collection cancelled")]
    Cancelled,

    /// The outer deadline expired.
    #[error("collection timed out after {0:?}")]
    Timeout(Duration),

    /// No path to the endpoint — every transport candidate was exhausted.
    #[error("transport unavailable: {0}")]
    TransportUnavailable(String),

    /// The response decoded but is inconsistent or missing mandatory fields.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Placeholder metrics were returned in place of real readings.
    /// The accompanying record carries a `synthesized` provenance marker.
    #[error("synthesized placeholder data: {0}")]
    SynthesizedData(String),

    /// Link preconditions not met (empty name/iface, class mismatch).
    #[error("invalid link: {0}")]
    Validation(String),

    /// An external command exited non-zero or could not be spawned.
    #[error("command `{command}` failed (exit {code:?}): {stderr}")]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
}

impl CollectorError {
    /// Whether the retrying runner may try again after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CollectorError::CommandFailed { .. })
    }
}
