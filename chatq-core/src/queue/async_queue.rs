//! Async queue implementation

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, info, trace};
use uuid::Uuid;

use super::{CancellationToken, QueueError, QueueState, Sequence};

/// Options accepted when creating a queue
#[derive(Debug, Clone, Default)]
pub struct QueueOptions {
    /// Token that aborts the queue when fired
    pub cancellation: Option<CancellationToken>,
}

/// A value handed back by [`AsyncQueue::try_push`]
pub struct PushRejected<T> {
    /// The value that was not accepted
    pub value: T,
    /// Why it was not accepted
    pub reason: QueueError,
}

impl<T> fmt::Debug for PushRejected<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PushRejected")
            .field("reason", &self.reason)
            .finish_non_exhaustive()
    }
}

impl<T> fmt::Display for PushRejected<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "push rejected: {}", self.reason)
    }
}

impl<T> std::error::Error for PushRejected<T> {}

struct State<T> {
    buffer: VecDeque<T>,
    closed: bool,
    cancelled: bool,
    /// A consumer is suspended in `next()`
    consuming: bool,
    /// A value was sent to the waiter but the consumer has not taken it yet
    in_flight: bool,
    /// Resolved by the next push; dropped by close or cancellation
    waiter: Option<oneshot::Sender<T>>,
}

struct Shared<T> {
    id: Uuid,
    state: Mutex<State<T>>,
    cancellation: Option<CancellationToken>,
}

impl<T> Shared<T> {
    /// Record a fired token and release the pending wait.
    fn check_cancelled(&self, state: &mut State<T>) -> bool {
        if state.cancelled {
            return true;
        }
        if self
            .cancellation
            .as_ref()
            .is_some_and(|token| token.is_cancelled())
        {
            state.cancelled = true;
            state.waiter = None;
            info!(
                queue_id = %self.id,
                watermark = state.buffer.len(),
                "Queue cancelled"
            );
            return true;
        }
        false
    }
}

/// Unbounded FIFO queue with a single suspending consumer
///
/// Handles are cheap to clone; all clones refer to the same queue. Pushing,
/// closing and reading the watermark never block.
pub struct AsyncQueue<T> {
    shared: Arc<Shared<T>>,
}

impl<T> AsyncQueue<T> {
    /// Create a queue with no cancellation token
    pub fn new() -> Self {
        Self::with_options(QueueOptions::default())
    }

    /// Create a queue that is aborted when `token` fires
    pub fn with_cancellation(token: CancellationToken) -> Self {
        Self::with_options(QueueOptions {
            cancellation: Some(token),
        })
    }

    /// Create a queue from options
    pub fn with_options(options: QueueOptions) -> Self {
        let id = Uuid::new_v4();
        debug!(
            queue_id = %id,
            cancellable = options.cancellation.is_some(),
            "Created queue"
        );
        Self {
            shared: Arc::new(Shared {
                id,
                state: Mutex::new(State {
                    buffer: VecDeque::new(),
                    closed: false,
                    cancelled: false,
                    consuming: false,
                    in_flight: false,
                    waiter: None,
                }),
                cancellation: options.cancellation,
            }),
        }
    }

    /// Identifier used in log records
    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    /// Push a value. Silently dropped once the queue is closed or cancelled.
    pub fn push(&self, value: T) {
        if let Err(rejected) = self.try_push(value) {
            debug!(
                queue_id = %self.shared.id,
                reason = %rejected.reason,
                "Ignoring push after termination"
            );
        }
    }

    /// Push a value, handing it back if the queue no longer accepts input
    pub fn try_push(&self, value: T) -> Result<(), PushRejected<T>> {
        let mut state = self.shared.state.lock();
        if self.shared.check_cancelled(&mut state) {
            return Err(PushRejected {
                value,
                reason: QueueError::Cancelled,
            });
        }
        if state.closed {
            return Err(PushRejected {
                value,
                reason: QueueError::Closed,
            });
        }

        // The buffer is empty whenever a consumer is waiting
        let value = match state.waiter.take() {
            Some(waiter) => match waiter.send(value) {
                Ok(()) => {
                    state.in_flight = true;
                    trace!(queue_id = %self.shared.id, "Handed value to waiting consumer");
                    return Ok(());
                }
                Err(value) => value,
            },
            None => value,
        };

        state.buffer.push_back(value);
        trace!(
            queue_id = %self.shared.id,
            watermark = state.buffer.len(),
            "Buffered value"
        );
        Ok(())
    }

    /// Close the queue for input. Buffered values still drain.
    pub fn end(&self) {
        let mut state = self.shared.state.lock();
        if self.shared.check_cancelled(&mut state) || state.closed {
            return;
        }
        state.closed = true;
        // Dropping the sender resolves a pending consumer to completion
        state.waiter = None;

        let remaining = state.buffer.len();
        if remaining == 0 && !state.in_flight {
            info!(queue_id = %self.shared.id, "Queue closed and completed");
        } else {
            info!(queue_id = %self.shared.id, remaining, "Queue closed, draining");
        }
    }

    /// Number of buffered values not yet delivered
    pub fn watermark(&self) -> usize {
        self.shared.state.lock().buffer.len()
    }

    /// Current lifecycle state
    pub fn state(&self) -> QueueState {
        let mut state = self.shared.state.lock();
        if self.shared.check_cancelled(&mut state) {
            QueueState::Cancelled
        } else if !state.closed {
            QueueState::Open
        } else if state.buffer.is_empty() && !state.in_flight {
            QueueState::Completed
        } else {
            QueueState::Draining
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().closed
    }

    pub fn is_cancelled(&self) -> bool {
        let mut state = self.shared.state.lock();
        self.shared.check_cancelled(&mut state)
    }

    /// Wait for the next value
    ///
    /// Returns `Ok(None)` once the queue is closed and drained, and
    /// `Err(QueueError::Cancelled)` as soon as the token has fired, even if
    /// values are still buffered. Only one call may be waiting at a time.
    pub async fn next(&self) -> Result<Option<T>, QueueError> {
        let rx = {
            let mut state = self.shared.state.lock();
            if state.consuming {
                return Err(QueueError::ConcurrentConsumption);
            }
            if self.shared.check_cancelled(&mut state) {
                return Err(QueueError::Cancelled);
            }
            if let Some(value) = state.buffer.pop_front() {
                if state.closed && state.buffer.is_empty() {
                    info!(queue_id = %self.shared.id, "Queue drained");
                }
                return Ok(Some(value));
            }
            if state.closed {
                return Ok(None);
            }

            let (tx, rx) = oneshot::channel();
            state.waiter = Some(tx);
            state.consuming = true;
            rx
        };

        let mut wait = PendingWait {
            shared: &self.shared,
            rx,
        };
        trace!(queue_id = %self.shared.id, "Consumer waiting");

        let received = match &self.shared.cancellation {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => None,
                result = &mut wait.rx => result.ok(),
            },
            None => (&mut wait.rx).await.ok(),
        };
        drop(wait);

        match received {
            Some(value) => Ok(Some(value)),
            None => {
                let mut state = self.shared.state.lock();
                if self.shared.check_cancelled(&mut state) {
                    Err(QueueError::Cancelled)
                } else {
                    Ok(None)
                }
            }
        }
    }
}

impl<T: Send + 'static> AsyncQueue<T> {
    /// Stream view over the queue
    pub fn sequence(&self) -> Sequence<T> {
        Sequence::new(self.clone())
    }
}

impl<T> Clone for AsyncQueue<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Default for AsyncQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for AsyncQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("AsyncQueue")
            .field("id", &self.shared.id)
            .field("watermark", &state.buffer.len())
            .field("closed", &state.closed)
            .field("cancelled", &state.cancelled)
            .finish()
    }
}

/// Releases the consumer slot when a wait finishes or is dropped
struct PendingWait<'a, T> {
    shared: &'a Shared<T>,
    rx: oneshot::Receiver<T>,
}

impl<T> Drop for PendingWait<'_, T> {
    fn drop(&mut self) {
        let mut state = self.shared.state.lock();
        state.consuming = false;
        state.waiter = None;
        state.in_flight = false;

        // A value delivered to a consumer that went away is the oldest one
        if let Ok(value) = self.rx.try_recv() {
            if !self.shared.check_cancelled(&mut state) {
                state.buffer.push_front(value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready, assert_ready_eq, task};

    #[tokio::test]
    async fn test_fifo_before_consumption() {
        let queue = AsyncQueue::new();
        for i in 0..5 {
            queue.push(i);
        }

        for i in 0..5 {
            assert_eq!(queue.next().await, Ok(Some(i)));
        }
        assert_eq!(queue.watermark(), 0);
    }

    #[tokio::test]
    async fn test_interleaved_push_and_consume() {
        let queue = AsyncQueue::new();
        queue.push("v1");
        assert_eq!(queue.next().await, Ok(Some("v1")));
        queue.push("v2");
        assert_eq!(queue.next().await, Ok(Some("v2")));
    }

    #[tokio::test]
    async fn test_drain_on_close() {
        let queue = AsyncQueue::new();
        queue.push('a');
        queue.push('b');
        queue.end();

        assert_eq!(queue.state(), QueueState::Draining);
        assert_eq!(queue.next().await, Ok(Some('a')));
        assert_eq!(queue.next().await, Ok(Some('b')));
        assert_eq!(queue.state(), QueueState::Completed);
        assert_eq!(queue.next().await, Ok(None));
    }

    #[test]
    fn test_end_resolves_pending_consumer() {
        let queue: AsyncQueue<u8> = AsyncQueue::new();
        let mut next = task::spawn(queue.next());
        assert_pending!(next.poll());

        queue.end();
        assert!(next.is_woken());
        assert_ready_eq!(next.poll(), Ok(None));
        assert_eq!(queue.state(), QueueState::Completed);
    }

    #[test]
    fn test_push_wakes_pending_consumer() {
        let queue = AsyncQueue::new();
        let mut next = task::spawn(queue.next());
        assert_pending!(next.poll());

        queue.push(7);
        assert!(next.is_woken());
        assert_eq!(queue.watermark(), 0);
        assert_ready_eq!(next.poll(), Ok(Some(7)));
    }

    #[tokio::test]
    async fn test_watermark_tracks_buffer() {
        let queue = AsyncQueue::new();
        for i in 0..4 {
            queue.push(i);
        }
        assert_eq!(queue.watermark(), 4);
        queue.next().await.unwrap();
        assert_eq!(queue.watermark(), 3);
    }

    #[tokio::test]
    async fn test_cancellation_preempts_buffer() {
        let token = CancellationToken::new();
        let queue = AsyncQueue::with_cancellation(token.clone());
        queue.push("a");
        token.cancel();

        assert_eq!(queue.next().await, Err(QueueError::Cancelled));
        assert_eq!(queue.next().await, Err(QueueError::Cancelled));
        assert_eq!(queue.state(), QueueState::Cancelled);
        assert_eq!(queue.watermark(), 1);
    }

    #[test]
    fn test_cancellation_wakes_pending_consumer() {
        let token = CancellationToken::new();
        let queue: AsyncQueue<u32> = AsyncQueue::with_cancellation(token.clone());
        let mut next = task::spawn(queue.next());
        assert_pending!(next.poll());

        token.cancel();
        assert!(next.is_woken());
        assert_ready_eq!(next.poll(), Err(QueueError::Cancelled));
    }

    #[test]
    fn test_concurrent_consumer_rejected() {
        let queue: AsyncQueue<u32> = AsyncQueue::new();
        let mut first = task::spawn(queue.next());
        assert_pending!(first.poll());

        let mut second = task::spawn(queue.next());
        assert_ready_eq!(second.poll(), Err(QueueError::ConcurrentConsumption));

        queue.push(1);
        assert_ready_eq!(first.poll(), Ok(Some(1)));
    }

    #[test]
    fn test_dropped_consumer_releases_slot_and_keeps_value() {
        let queue = AsyncQueue::new();
        let mut next = task::spawn(queue.next());
        assert_pending!(next.poll());

        queue.push(1);
        queue.push(2);
        drop(next);
        assert_eq!(queue.watermark(), 2);

        let mut again = task::spawn(queue.next());
        assert_ready_eq!(again.poll(), Ok(Some(1)));
        let mut last = task::spawn(queue.next());
        assert_ready_eq!(last.poll(), Ok(Some(2)));
    }

    #[test]
    fn test_undelivered_value_keeps_queue_draining() {
        let queue = AsyncQueue::new();
        let mut next = task::spawn(queue.next());
        assert_pending!(next.poll());

        queue.push(1);
        queue.end();
        assert_eq!(queue.state(), QueueState::Draining);

        drop(next);
        assert_eq!(queue.state(), QueueState::Draining);
        assert_eq!(queue.watermark(), 1);

        let mut again = task::spawn(queue.next());
        assert_ready_eq!(again.poll(), Ok(Some(1)));
        assert_eq!(queue.state(), QueueState::Completed);
        assert_eq!(queue.watermark(), 0);
    }

    #[test]
    fn test_completes_once_waiting_consumer_takes_value() {
        let queue = AsyncQueue::new();
        let mut next = task::spawn(queue.next());
        assert_pending!(next.poll());

        queue.push(5);
        queue.end();
        assert_ready_eq!(next.poll(), Ok(Some(5)));
        drop(next);
        assert_eq!(queue.state(), QueueState::Completed);

        queue.push(6);
        assert_eq!((queue.state(), queue.watermark()), (QueueState::Completed, 0));
    }

    #[tokio::test]
    async fn test_end_is_idempotent() {
        let queue = AsyncQueue::new();
        queue.push(1);
        queue.end();
        let once = (queue.state(), queue.watermark());
        queue.end();
        assert_eq!((queue.state(), queue.watermark()), once);
    }

    #[tokio::test]
    async fn test_terminal_state_is_stable() {
        let queue = AsyncQueue::new();
        queue.end();
        queue.push(1);
        queue.end();
        assert_eq!(queue.state(), QueueState::Completed);
        assert_eq!(queue.watermark(), 0);
        assert_eq!(queue.next().await, Ok(None));

        let token = CancellationToken::new();
        let cancelled = AsyncQueue::with_cancellation(token.clone());
        cancelled.push(1);
        token.cancel();
        cancelled.push(2);
        cancelled.end();
        assert_eq!(cancelled.state(), QueueState::Cancelled);
        assert_eq!(cancelled.watermark(), 1);
        assert!(!cancelled.is_closed());
    }

    #[test]
    fn test_try_push_returns_value() {
        let queue = AsyncQueue::new();
        queue.end();
        let rejected = queue.try_push(String::from("late")).unwrap_err();
        assert_eq!(rejected.value, "late");
        assert_eq!(rejected.reason, QueueError::Closed);
        assert_eq!(rejected.to_string(), "push rejected: queue is closed");

        let token = CancellationToken::new();
        let queue = AsyncQueue::with_cancellation(token.clone());
        token.cancel();
        let rejected = queue.try_push(5).unwrap_err();
        assert_eq!(rejected.reason, QueueError::Cancelled);
    }

    #[test]
    fn test_buffered_value_ready_without_suspension() {
        let queue = AsyncQueue::new();
        queue.push(3);
        let mut next = task::spawn(queue.next());
        let value = assert_ready!(next.poll());
        assert_eq!(value, Ok(Some(3)));
    }

    #[tokio::test]
    async fn test_producers_on_other_threads() {
        let queue = AsyncQueue::new();
        let mut handles = Vec::new();
        for producer in 0..4u32 {
            let queue = queue.clone();
            handles.push(std::thread::spawn(move || {
                for seq in 0..100u32 {
                    queue.push((producer, seq));
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        queue.end();

        let mut last_seen = [None::<u32>; 4];
        let mut total = 0;
        while let Some((producer, seq)) = queue.next().await.unwrap() {
            let slot = &mut last_seen[producer as usize];
            assert!(slot.map_or(true, |prev| prev < seq));
            *slot = Some(seq);
            total += 1;
        }
        assert_eq!(total, 400);
    }
}
