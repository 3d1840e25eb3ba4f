//! Streams of progress items produced by a background task.
//!
//! The producer runs on a spawned tokio task and sends through a bounded
//! channel; the consumer sees each item as soon as it is known. An `Err`
//! item is terminal: producers stop after sending one.

use futures::Stream;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

use crate::error::{CatalogError, Result};

const CHANNEL_CAPACITY: usize = 64;

/// Receiving half, handed to the caller.
pub struct EventStream<T> {
    inner: ReceiverStream<Result<T>>,
}

/// Sending half, handed to the producer.
pub struct Emitter<T> {
    tx: mpsc::Sender<Result<T>>,
}

impl<T: Send + 'static> EventStream<T> {
    /// Run `producer` on a new task and stream what it emits.
    pub fn spawn<F, Fut>(producer: F) -> Self
    where
        F: FnOnce(Emitter<T>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        tokio::spawn(producer(Emitter { tx }));
        Self {
            inner: ReceiverStream::new(rx),
        }
    }

    /// Drain the stream.
    pub async fn collect_all(mut self) -> Vec<Result<T>> {
        let mut items = Vec::new();
        while let Some(item) = self.inner.next().await {
            items.push(item);
        }
        items
    }

    /// Drain the stream, stopping at the first error.
    pub async fn try_collect(mut self) -> Result<Vec<T>> {
        let mut items = Vec::new();
        while let Some(item) = self.inner.next().await {
            items.push(item?);
        }
        Ok(items)
    }
}

impl<T> Stream for EventStream<T> {
    type Item = Result<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

impl<T> Emitter<T> {
    /// Send an item. Returns `false` once the consumer has gone away, in
    /// which case the producer should stop.
    pub async fn emit(&self, item: T) -> bool {
        self.tx.send(Ok(item)).await.is_ok()
    }

    /// Send the terminal error.
    pub async fn fail(&self, err: CatalogError) {
        let _ = self.tx.send(Err(err)).await;
    }
}
