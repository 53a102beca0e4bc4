//! Order-preserving concurrent mapping over an async sequence.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::stream::{BoxStream, FuturesOrdered, Stream, StreamExt};
use tokio::task::JoinHandle;

/// Maps a transform over an input sequence with bounded concurrency,
/// yielding results in input order.
///
/// Pulls eagerly from the input and keeps up to `max_concurrent`
/// invocations in flight as spawned tasks; the consumer always receives
/// the result of the oldest still-pending invocation first. While the
/// ring is full no new input is pulled, so backpressure reaches the
/// producer. Dropping the map stops pulling input but lets already
/// spawned tasks run to completion.
///
/// Transform failures must be surfaced as values of the output type; a
/// panic inside a task is resumed on the consumer.
pub struct BoundedConcurrentMap<T, U, F> {
    input: BoxStream<'static, T>,
    transform: F,
    max_concurrent: usize,
    in_flight: FuturesOrdered<JoinHandle<U>>,
    input_done: bool,
}

impl<T, U, F, Fut> BoundedConcurrentMap<T, U, F>
where
    F: FnMut(T) -> Fut,
    Fut: Future<Output = U> + Send + 'static,
    U: Send + 'static,
{
    /// Create a map over `input` with the given in-flight cap (minimum 1).
    pub fn new(input: BoxStream<'static, T>, max_concurrent: usize, transform: F) -> Self {
        Self {
            input,
            transform,
            max_concurrent: max_concurrent.max(1),
            in_flight: FuturesOrdered::new(),
            input_done: false,
        }
    }
}

impl<T, U, F, Fut> Stream for BoundedConcurrentMap<T, U, F>
where
    F: FnMut(T) -> Fut + Unpin,
    Fut: Future<Output = U> + Send + 'static,
    U: Send + 'static,
{
    type Item = U;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        // Fill the ring from the input while there is capacity.
        while !this.input_done && this.in_flight.len() < this.max_concurrent {
            match this.input.poll_next_unpin(cx) {
                Poll::Ready(Some(item)) => {
                    this.in_flight
                        .push_back(tokio::spawn((this.transform)(item)));
                }
                Poll::Ready(None) => this.input_done = true,
                Poll::Pending => break,
            }
        }

        match this.in_flight.poll_next_unpin(cx) {
            Poll::Ready(Some(Ok(result))) => Poll::Ready(Some(result)),
            Poll::Ready(Some(Err(err))) => match err.try_into_panic() {
                Ok(payload) => std::panic::resume_unwind(payload),
                // Task cancellation only happens at runtime shutdown.
                Err(_) => Poll::Ready(None),
            },
            Poll::Ready(None) if this.input_done => Poll::Ready(None),
            Poll::Ready(None) | Poll::Pending => Poll::Pending,
        }
    }
}
