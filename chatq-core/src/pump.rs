//! Producer-side pump with watermark throttling
//!
//! The queue itself never limits its buffer. The pump is the collaborator
//! that reads the watermark and stops pulling from its source while the
//! consumer is behind.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::schema::BackpressureConfig;
use crate::queue::{AsyncQueue, CancellationToken};

/// Something that yields events to be queued
#[async_trait]
pub trait EventSource<T: Send>: Send {
    /// Source name used in logs
    fn name(&self) -> &str;

    /// Next event, or `None` once the source is exhausted
    async fn next_event(&mut self) -> Option<T>;
}

#[async_trait]
impl<T: Send> EventSource<T> for mpsc::Receiver<T> {
    fn name(&self) -> &str {
        "mpsc"
    }

    async fn next_event(&mut self) -> Option<T> {
        self.recv().await
    }
}

#[async_trait]
impl<T: Send> EventSource<T> for mpsc::UnboundedReceiver<T> {
    fn name(&self) -> &str {
        "mpsc-unbounded"
    }

    async fn next_event(&mut self) -> Option<T> {
        self.recv().await
    }
}

/// Summary of one pump run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PumpReport {
    /// Events pushed into the queue
    pub forwarded: u64,
    /// Events the queue refused
    pub rejected: u64,
    /// Times the pump paused at the high watermark
    pub pauses: u64,
    /// The pump stopped because its token fired
    pub cancelled: bool,
}

/// Moves events from a source into a queue, pausing above the high watermark
pub struct EventPump<T> {
    queue: AsyncQueue<T>,
    config: BackpressureConfig,
    cancellation: CancellationToken,
}

impl<T: Send + 'static> EventPump<T> {
    /// Create a pump feeding `queue`
    pub fn new(queue: AsyncQueue<T>, config: BackpressureConfig) -> Self {
        Self {
            queue,
            config,
            cancellation: CancellationToken::new(),
        }
    }

    /// Stop the pump when `token` fires. The queue is left open.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn queue(&self) -> &AsyncQueue<T> {
        &self.queue
    }

    /// Pump until the source is exhausted, the queue stops accepting input,
    /// or the pump's token fires
    pub async fn run<S>(&self, source: &mut S) -> crate::Result<PumpReport>
    where
        S: EventSource<T> + ?Sized,
    {
        if self.config.low_watermark >= self.config.high_watermark {
            return Err(crate::Error::Validation(format!(
                "low_watermark ({}) must be below high_watermark ({})",
                self.config.low_watermark, self.config.high_watermark
            )));
        }

        let mut report = PumpReport::default();
        info!(
            source = source.name(),
            queue_id = %self.queue.id(),
            high = self.config.high_watermark,
            low = self.config.low_watermark,
            "Event pump started"
        );

        loop {
            if self.queue.is_closed() || self.queue.is_cancelled() {
                warn!(state = %self.queue.state(), "Queue no longer accepts events");
                break;
            }

            let watermark = self.queue.watermark();
            if watermark >= self.config.high_watermark {
                report.pauses += 1;
                debug!(watermark, "Pausing source at high watermark");
                if !self.wait_for_low_watermark().await {
                    report.cancelled = true;
                    break;
                }
                debug!(watermark = self.queue.watermark(), "Resuming source");
                continue;
            }

            let event = tokio::select! {
                biased;
                _ = self.cancellation.cancelled() => {
                    report.cancelled = true;
                    break;
                }
                event = source.next_event() => event,
            };

            let Some(event) = event else {
                if self.config.close_on_exhaustion {
                    self.queue.end();
                }
                info!(source = source.name(), "Event source exhausted");
                break;
            };

            match self.queue.try_push(event) {
                Ok(()) => report.forwarded += 1,
                Err(rejected) => {
                    report.rejected += 1;
                    warn!(reason = %rejected.reason, "Queue rejected event");
                    break;
                }
            }
        }

        info!(
            forwarded = report.forwarded,
            rejected = report.rejected,
            pauses = report.pauses,
            cancelled = report.cancelled,
            "Event pump stopped"
        );
        Ok(report)
    }

    /// Returns `false` if the pump's token fired while waiting
    async fn wait_for_low_watermark(&self) -> bool {
        let interval = Duration::from_millis(self.config.poll_interval_ms.max(1));
        while self.queue.watermark() > self.config.low_watermark {
            if self.queue.is_closed() || self.queue.is_cancelled() {
                break;
            }
            tokio::select! {
                biased;
                _ = self.cancellation.cancelled() => return false,
                _ = tokio::time::sleep(interval) => {}
            }
        }
        true
    }
}
