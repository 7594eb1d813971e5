//! Flattening of provider chunks into a single item sequence.

use crate::provider::{ProviderError, WorkProvider};

/// Iterates the items of successive provider chunks as one sequence.
///
/// The provider is dropped after its first empty chunk and never polled
/// again.
pub struct WorkSequence<T, P> {
    provider: Option<P>,
    current: std::vec::IntoIter<T>,
}

impl<T, P> WorkSequence<T, P>
where
    T: Send,
    P: WorkProvider<T>,
{
    pub fn new(provider: P) -> Self {
        Self {
            provider: Some(provider),
            current: Vec::new().into_iter(),
        }
    }

    /// Next work item, or `None` once the provider is exhausted.
    pub async fn next(&mut self) -> Result<Option<T>, ProviderError> {
        loop {
            if let Some(item) = self.current.next() {
                return Ok(Some(item));
            }
            let Some(provider) = self.provider.as_mut() else {
                return Ok(None);
            };
            let chunk = provider.next_chunk().await?;
            if chunk.is_empty() {
                self.provider = None;
                return Ok(None);
            }
            self.current = chunk.into_iter();
        }
    }

    /// Pull up to `size` items; a short batch means the sequence ended.
    pub async fn next_batch(&mut self, size: usize) -> Result<Vec<T>, ProviderError> {
        let mut batch = Vec::with_capacity(size);
        while batch.len() < size {
            match self.next().await? {
                Some(item) => batch.push(item),
                None => break,
            }
        }
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ChunkFn, CollectionProvider};

    #[tokio::test]
    async fn test_flattens_chunks() {
        let mut page = 0u32;
        let provider = ChunkFn::new(move || {
            page += 1;
            match page {
                1 => Ok(vec![1, 2, 3]),
                2 => Ok(vec![4]),
                _ => Ok(Vec::new()),
            }
        });

        let mut sequence = WorkSequence::new(provider);
        let mut items = Vec::new();
        while let Some(item) = sequence.next().await.unwrap() {
            items.push(item);
        }
        assert_eq!(items, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_empty_provider() {
        let mut sequence = WorkSequence::new(CollectionProvider::<u32>::new(Vec::new()));
        assert!(sequence.next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_provider_not_polled_after_exhaustion() {
        let mut calls = 0u32;
        let provider = ChunkFn::new(move || {
            calls += 1;
            assert!(calls <= 2, "provider polled after exhaustion");
            match calls {
                1 => Ok(vec![1]),
                _ => Ok(Vec::new()),
            }
        });

        let mut sequence = WorkSequence::new(provider);
        assert_eq!(sequence.next().await.unwrap(), Some(1));
        assert!(sequence.next().await.unwrap().is_none());
        assert!(sequence.next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_next_batch_respects_size_and_tail() {
        let provider = CollectionProvider::new((0..7).collect::<Vec<u32>>());
        let mut sequence = WorkSequence::new(provider);
        assert_eq!(sequence.next_batch(3).await.unwrap(), vec![0, 1, 2]);
        assert_eq!(sequence.next_batch(3).await.unwrap(), vec![3, 4, 5]);
        assert_eq!(sequence.next_batch(3).await.unwrap(), vec![6]);
        assert!(sequence.next_batch(3).await.unwrap().is_empty());
    }
}
