//! Async queue bridging push-based producers to a pull-based consumer
//!
//! Producers hand values to [`AsyncQueue::push`] from any thread. A single
//! consumer pulls them with [`AsyncQueue::next`] or through the
//! [`Sequence`] stream, suspending while the buffer is empty. Closing the
//! queue lets buffered values drain; firing the cancellation token ends the
//! sequence immediately.

pub mod async_queue;
pub mod sequence;

use std::fmt;

use serde::Serialize;

pub use async_queue::{AsyncQueue, PushRejected, QueueOptions};
pub use sequence::Sequence;

/// Cancellation signal observed by a queue. The queue never fires it.
pub type CancellationToken = tokio_util::sync::CancellationToken;

/// Queue errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    /// A second consumer tried to wait while one is already pending
    #[error("another consumer is already waiting on this queue")]
    ConcurrentConsumption,

    /// The cancellation token fired
    #[error("queue was cancelled")]
    Cancelled,

    /// The queue was closed with `end()`
    #[error("queue is closed")]
    Closed,
}

/// Lifecycle state of a queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueState {
    /// Accepting pushes
    Open,
    /// Closed, buffered values remain
    Draining,
    /// Closed and empty
    Completed,
    /// The cancellation token fired
    Cancelled,
}

impl QueueState {
    /// Whether no further transitions can happen
    pub fn is_terminal(self) -> bool {
        matches!(self, QueueState::Completed | QueueState::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QueueState::Open => "open",
            QueueState::Draining => "draining",
            QueueState::Completed => "completed",
            QueueState::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for QueueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!QueueState::Open.is_terminal());
        assert!(!QueueState::Draining.is_terminal());
        assert!(QueueState::Completed.is_terminal());
        assert!(QueueState::Cancelled.is_terminal());
    }

    #[test]
    fn test_state_serializes_snake_case() {
        let value = serde_json::to_value(QueueState::Draining).unwrap();
        assert_eq!(value, "draining");
        assert_eq!(QueueState::Completed.to_string(), "completed");
    }
}
