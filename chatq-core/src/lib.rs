//! Async chat event queue
//!
//! This crate bridges synchronous, push-based producers of chat events to
//! an asynchronous, pull-based consumer that iterates them one at a time.
//! It also carries the configuration, logging and pump helpers used around
//! the queue.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod pump;
pub mod queue;

pub use error::{Error, Result};
pub use events::{ChatEvent, ChatEventKind};
pub use pump::{EventPump, EventSource, PumpReport};
pub use queue::{
    AsyncQueue, CancellationToken, PushRejected, QueueError, QueueOptions, QueueState, Sequence,
};
