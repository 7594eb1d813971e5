//! Work providers: lazy, chunked sources of work items.
//!
//! A [`WorkProvider`] supplies work in bounded chunks so a run never has to
//! materialize an unbounded sequence up front. The provider is polled from the
//! single dispatch loop, so implementations need no internal synchronization.

use async_trait::async_trait;
use futures::{Stream, StreamExt};

/// Errors raised while fetching work.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The provider failed to produce its next chunk.
    #[error("work provider failed: {0}")]
    Fetch(String),
}

impl ProviderError {
    pub fn fetch(message: impl Into<String>) -> Self {
        ProviderError::Fetch(message.into())
    }
}

/// Source of work for a batch run.
///
/// Chunks are pulled one at a time; an **empty chunk terminates the
/// sequence** and the provider is not polled again afterwards.
///
/// # Examples
///
/// ```rust
/// use batch_engine::provider::{ProviderError, WorkProvider};
/// use async_trait::async_trait;
///
/// struct Pages {
///     next_page: u64,
/// }
///
/// #[async_trait]
/// impl WorkProvider<u64> for Pages {
///     fn total_estimated(&self) -> Option<u64> {
///         Some(30)
///     }
///
///     async fn next_chunk(&mut self) -> Result<Vec<u64>, ProviderError> {
///         if self.next_page >= 3 {
///             return Ok(Vec::new());
///         }
///         let page = self.next_page;
///         self.next_page += 1;
///         Ok((page * 10..(page + 1) * 10).collect())
///     }
/// }
/// ```
#[async_trait]
pub trait WorkProvider<T>: Send
where
    T: Send,
{
    /// Estimated total number of work items, or `None` when unknown.
    ///
    /// The estimate only feeds progress reporting; an inaccurate value never
    /// changes what gets processed.
    fn total_estimated(&self) -> Option<u64>;

    /// Fetch the next chunk of work. An empty chunk ends the sequence.
    async fn next_chunk(&mut self) -> Result<Vec<T>, ProviderError>;
}

/// Provider over a pre-built collection, yielded as a single chunk.
pub struct CollectionProvider<T> {
    items: Option<Vec<T>>,
    total: u64,
}

impl<T> CollectionProvider<T> {
    pub fn new(items: Vec<T>) -> Self {
        let total = items.len() as u64;
        Self {
            items: Some(items),
            total,
        }
    }
}

#[async_trait]
impl<T> WorkProvider<T> for CollectionProvider<T>
where
    T: Send,
{
    fn total_estimated(&self) -> Option<u64> {
        Some(self.total)
    }

    async fn next_chunk(&mut self) -> Result<Vec<T>, ProviderError> {
        Ok(self.items.take().unwrap_or_default())
    }
}

/// Provider over a closure that fetches one chunk per call.
///
/// The closure is free to hit a database, page an API, or drain a queue; it
/// signals exhaustion by returning an empty chunk.
pub struct ChunkFn<F> {
    fetch: F,
    total: Option<u64>,
}

impl<F> ChunkFn<F> {
    pub fn new(fetch: F) -> Self {
        Self { fetch, total: None }
    }

    /// Attach a total-size estimate for progress reporting.
    pub fn with_estimate(mut self, total: u64) -> Self {
        self.total = Some(total);
        self
    }
}

#[async_trait]
impl<T, F> WorkProvider<T> for ChunkFn<F>
where
    T: Send,
    F: FnMut() -> Result<Vec<T>, ProviderError> + Send,
{
    fn total_estimated(&self) -> Option<u64> {
        self.total
    }

    async fn next_chunk(&mut self) -> Result<Vec<T>, ProviderError> {
        (self.fetch)()
    }
}

/// Provider adapting a [`futures::Stream`], buffering items into chunks.
pub struct StreamProvider<S> {
    stream: S,
    chunk_size: usize,
    total: Option<u64>,
}

impl<S> StreamProvider<S> {
    pub fn new(stream: S, chunk_size: usize) -> Self {
        Self {
            stream,
            chunk_size: chunk_size.max(1),
            total: None,
        }
    }

    /// Attach a total-size estimate for progress reporting.
    pub fn with_estimate(mut self, total: u64) -> Self {
        self.total = Some(total);
        self
    }
}

#[async_trait]
impl<T, S> WorkProvider<T> for StreamProvider<S>
where
    T: Send,
    S: Stream<Item = T> + Send + Unpin,
{
    fn total_estimated(&self) -> Option<u64> {
        self.total
    }

    async fn next_chunk(&mut self) -> Result<Vec<T>, ProviderError> {
        let mut chunk = Vec::with_capacity(self.chunk_size);
        while chunk.len() < self.chunk_size {
            match self.stream.next().await {
                Some(item) => chunk.push(item),
                None => break,
            }
        }
        Ok(chunk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_collection_provider_yields_once() {
        let mut provider = CollectionProvider::new(vec![1, 2, 3]);
        assert_eq!(provider.total_estimated(), Some(3));
        assert_eq!(provider.next_chunk().await.unwrap(), vec![1, 2, 3]);
        assert!(provider.next_chunk().await.unwrap().is_empty());
        assert!(provider.next_chunk().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_chunk_fn_pages_until_empty() {
        let mut page = 0u32;
        let mut provider = ChunkFn::new(move || {
            page += 1;
            if page > 2 {
                Ok(Vec::new())
            } else {
                Ok(vec![page * 10, page * 10 + 1])
            }
        })
        .with_estimate(4);

        assert_eq!(provider.total_estimated(), Some(4));
        assert_eq!(provider.next_chunk().await.unwrap(), vec![10, 11]);
        assert_eq!(provider.next_chunk().await.unwrap(), vec![20, 21]);
        assert!(provider.next_chunk().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_chunk_fn_propagates_errors() {
        let mut provider: ChunkFn<_> =
            ChunkFn::new(|| Err::<Vec<u32>, _>(ProviderError::fetch("backend down")));
        let err = provider.next_chunk().await.unwrap_err();
        assert!(err.to_string().contains("backend down"));
    }

    #[tokio::test]
    async fn test_stream_provider_chunks() {
        let stream = futures::stream::iter(0..5);
        let mut provider = StreamProvider::new(stream, 2);
        assert_eq!(provider.next_chunk().await.unwrap(), vec![0, 1]);
        assert_eq!(provider.next_chunk().await.unwrap(), vec![2, 3]);
        assert_eq!(provider.next_chunk().await.unwrap(), vec![4]);
        assert!(provider.next_chunk().await.unwrap().is_empty());
    }
}
