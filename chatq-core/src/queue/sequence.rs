//! Stream view over an [`AsyncQueue`]

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use futures::stream::{FusedStream, Stream};
use futures::{ready, FutureExt, StreamExt};

use super::{AsyncQueue, QueueError};

type NextFuture<T> = BoxFuture<'static, Result<Option<T>, QueueError>>;

/// Asynchronous sequence of queued values
///
/// Yields `Ok(value)` in push order and ends when the queue is closed and
/// drained. Cancellation yields a single `Err(QueueError::Cancelled)`, after
/// which the sequence is finished. A sequence obtained from an already
/// terminated queue finishes the same way without yielding buffered data.
pub struct Sequence<T> {
    queue: AsyncQueue<T>,
    pending: Option<NextFuture<T>>,
    finished: bool,
}

impl<T: Send + 'static> Sequence<T> {
    pub(crate) fn new(queue: AsyncQueue<T>) -> Self {
        Self {
            queue,
            pending: None,
            finished: false,
        }
    }

    /// Wait for the next item, or `None` once the sequence is finished
    pub async fn next_item(&mut self) -> Option<Result<T, QueueError>> {
        StreamExt::next(self).await
    }

    /// Whether the sequence has ended
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// The queue this sequence reads from
    pub fn queue(&self) -> &AsyncQueue<T> {
        &self.queue
    }
}

impl<T: Send + 'static> Stream for Sequence<T> {
    type Item = Result<T, QueueError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        if this.finished {
            return Poll::Ready(None);
        }

        let pending = this.pending.get_or_insert_with(|| {
            let queue = this.queue.clone();
            let next: NextFuture<T> = Box::pin(async move { queue.next().await });
            next
        });
        let result = ready!(pending.poll_unpin(cx));
        this.pending = None;

        match result {
            Ok(Some(value)) => Poll::Ready(Some(Ok(value))),
            Ok(None) => {
                this.finished = true;
                Poll::Ready(None)
            }
            Err(QueueError::Cancelled) => {
                this.finished = true;
                Poll::Ready(Some(Err(QueueError::Cancelled)))
            }
            // Usage errors leave the sequence usable
            Err(err) => Poll::Ready(Some(Err(err))),
        }
    }
}

impl<T: Send + 'static> FusedStream for Sequence<T> {
    fn is_terminated(&self) -> bool {
        self.finished
    }
}

impl<T> fmt::Debug for Sequence<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sequence")
            .field("queue", &self.queue)
            .field("waiting", &self.pending.is_some())
            .field("finished", &self.finished)
            .finish()
    }
}
