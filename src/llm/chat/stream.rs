use futures::{ Stream, StreamExt };
use std::future::Future;
use std::pin::Pin;
use std::task::{ Context, Poll };
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;

use crate::llm::ChatError;

const FRAGMENT_BUFFER: usize = 32;

pub type FragmentSender = mpsc::Sender<Result<String, ChatError>>;

/// Pull-based sequence of text fragments fed by a producer task.
///
/// The producer owns the upstream connection. Ending the stream early, either
/// with [`FragmentStream::close`] or by dropping it, aborts the producer and
/// with it the connection. After the first `Err` the stream is exhausted.
pub struct FragmentStream {
    inner: ReceiverStream<Result<String, ChatError>>,
    producer: Option<JoinHandle<()>>,
    finished: bool,
}

impl FragmentStream {
    pub fn spawn<F, Fut>(producer: F) -> Self
        where
            F: FnOnce(FragmentSender) -> Fut + Send + 'static,
            Fut: Future<Output = ()> + Send + 'static
    {
        let (tx, rx) = mpsc::channel(FRAGMENT_BUFFER);
        let handle = tokio::spawn(producer(tx));

        Self {
            inner: ReceiverStream::new(rx),
            producer: Some(handle),
            finished: false,
        }
    }

    /// A stream that yields `items` in order, then ends.
    pub fn from_items(items: Vec<Result<String, ChatError>>) -> Self {
        Self::spawn(move |tx| async move {
            for item in items {
                if tx.send(item).await.is_err() {
                    return;
                }
            }
        })
    }

    pub async fn next_fragment(&mut self) -> Option<Result<String, ChatError>> {
        self.next().await
    }

    /// Drains the stream into one string. Fragments received before a failure
    /// are discarded along with it.
    pub async fn collect_text(mut self) -> Result<String, ChatError> {
        let mut text = String::new();
        while let Some(fragment) = self.next_fragment().await {
            text.push_str(&fragment?);
        }
        Ok(text)
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn close(&mut self) {
        self.finished = true;
        self.inner.close();
        if let Some(producer) = self.producer.take() {
            producer.abort();
        }
    }
}

impl Stream for FragmentStream {
    type Item = Result<String, ChatError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }

        match self.inner.poll_next_unpin(cx) {
            Poll::Ready(Some(Err(e))) => {
                self.close();
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                self.finished = true;
                self.producer.take();
                Poll::Ready(None)
            }
            other => other,
        }
    }
}

impl Drop for FragmentStream {
    fn drop(&mut self) {
        self.close();
    }
}
