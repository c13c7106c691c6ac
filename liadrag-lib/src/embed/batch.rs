use std::time::Duration;

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::embed::{Embedding, EmbeddingProvider, Normalization};
use crate::{Error, Result};

/// Default number of texts per provider call.
pub const DEFAULT_BATCH_SIZE: usize = 10;
/// Default number of provider calls in flight.
pub const DEFAULT_CONCURRENCY: usize = 5;
/// Default per-call timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Batching and concurrency settings for [`BatchEmbedder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    /// Maximum texts per provider call
    pub batch_size: usize,
    /// Maximum provider calls in flight at once
    pub concurrency: usize,
    /// Per-call bound; `None` relies on the provider's own timeout
    pub timeout: Option<Duration>,
    /// Vector post-processing applied to documents and queries alike
    pub normalization: Normalization,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
            timeout: Some(DEFAULT_TIMEOUT),
            normalization: Normalization::default(),
        }
    }
}

impl BatchConfig {
    fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::Configuration("batch size must be at least 1".to_string()));
        }
        if self.concurrency == 0 {
            return Err(Error::Configuration("concurrency must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Order-preserving, bounded-concurrency embedder over an [`EmbeddingProvider`].
///
/// Input is split into contiguous batches that each remember their offset. Up to
/// `concurrency` batches run at once, and each finished batch is written into the
/// slots reserved for it, so completion order never affects output order. A failed
/// batch leaves its slots as `None` without touching any other batch.
pub struct BatchEmbedder<P: EmbeddingProvider> {
    provider: P,
    config: BatchConfig,
}

impl<P: EmbeddingProvider> BatchEmbedder<P> {
    /// Create an embedder, rejecting a zero batch size or concurrency.
    pub fn new(provider: P, config: BatchConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { provider, config })
    }

    #[must_use]
    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Returns a reference to the provider.
    #[must_use]
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Embed every text, returning one slot per input in input order.
    pub async fn embed_all(&self, texts: &[String]) -> Vec<Option<Embedding>> {
        let mut slots: Vec<Option<Embedding>> = vec![None; texts.len()];
        if texts.is_empty() {
            return slots;
        }

        let batches: Vec<(usize, &[String])> = texts
            .chunks(self.config.batch_size)
            .enumerate()
            .map(|(i, batch)| (i * self.config.batch_size, batch))
            .collect();
        let total_batches = batches.len();
        info!(
            texts = texts.len(),
            batches = total_batches,
            concurrency = self.config.concurrency,
            model = self.provider.model_name(),
            "embedding texts"
        );

        let mut completed = stream::iter(batches)
            .map(|(offset, batch)| async move { (offset, batch.len(), self.call(batch).await) })
            .buffer_unordered(self.config.concurrency);

        let mut failed_batches = 0usize;
        while let Some((offset, len, result)) = completed.next().await {
            match result {
                Ok(vectors) => {
                    debug!(offset, len, "batch embedded");
                    for (slot, vector) in slots[offset..offset + len].iter_mut().zip(vectors) {
                        *slot = Some(vector);
                    }
                }
                Err(e) => {
                    failed_batches += 1;
                    warn!(offset, len, error = %e, "embedding batch failed");
                }
            }
        }

        if failed_batches > 0 {
            warn!(failed_batches, total_batches, "some embedding batches failed");
        }
        slots
    }

    /// Embed a single query. Failures are returned, never retried.
    pub async fn embed_query(&self, text: &str) -> Result<Embedding> {
        self.call(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Provider("provider returned no embedding".to_string()))
    }

    /// One provider call: strip newlines, bound by timeout, check the count and
    /// normalize.
    async fn call(&self, batch: &[String]) -> Result<Vec<Embedding>> {
        let inputs: Vec<String> = batch.iter().map(|t| t.replace('\n', " ")).collect();

        let response = match self.config.timeout {
            Some(limit) => tokio::time::timeout(limit, self.provider.embed(&inputs))
                .await
                .map_err(|_| Error::Provider(format!("embedding call timed out after {limit:?}")))?,
            None => self.provider.embed(&inputs).await,
        };
        let mut vectors = response?;

        if vectors.len() != inputs.len() {
            return Err(Error::Provider(format!(
                "provider returned {} embeddings for {} inputs",
                vectors.len(),
                inputs.len()
            )));
        }
        for v in &mut vectors {
            self.config.normalization.apply(v);
        }
        Ok(vectors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Encodes `t<n>` as `[n, 1.0]`; behaviour is driven by markers in the text.
    #[derive(Default)]
    struct StubProvider {
        inputs: Mutex<Vec<Vec<String>>>,
        finished: Mutex<Vec<String>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    fn vector_for(text: &str) -> Embedding {
        let n: f32 = text
            .split_whitespace()
            .next()
            .and_then(|t| t.trim_start_matches('t').parse().ok())
            .unwrap_or(-1.0);
        vec![n, 1.0]
    }

    #[async_trait]
    impl EmbeddingProvider for StubProvider {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>> {
            self.inputs.lock().unwrap().push(texts.to_vec());
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            let slow = texts.iter().any(|t| t.contains("slow"));
            let hang = texts.iter().any(|t| t.contains("hang"));
            let delay = if hang { 500 } else if slow { 60 } else { 10 };
            tokio::time::sleep(Duration::from_millis(delay)).await;

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.finished.lock().unwrap().push(texts[0].clone());

            if texts.iter().any(|t| t.contains("fail")) {
                return Err(Error::Provider("rate limited".to_string()));
            }
            if texts.iter().any(|t| t.contains("short")) {
                return Ok(vec![vector_for(&texts[0])]);
            }
            Ok(texts.iter().map(|t| vector_for(t)).collect())
        }

        fn model_name(&self) -> &str {
            "stub"
        }
    }

    fn raw_config(batch_size: usize, concurrency: usize) -> BatchConfig {
        BatchConfig {
            batch_size,
            concurrency,
            timeout: Some(Duration::from_millis(200)),
            normalization: Normalization::Raw,
        }
    }

    fn numbered(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("t{i}")).collect()
    }

    #[test]
    fn test_rejects_zero_batch_size_or_concurrency() {
        assert!(matches!(
            BatchEmbedder::new(StubProvider::default(), raw_config(0, 2)),
            Err(Error::Configuration(_))
        ));
        assert!(matches!(
            BatchEmbedder::new(StubProvider::default(), raw_config(2, 0)),
            Err(Error::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_order_preserved_when_first_batch_finishes_last() {
        let embedder = BatchEmbedder::new(StubProvider::default(), raw_config(3, 4)).unwrap();
        let mut texts = numbered(10);
        texts[0] = "t0 slow".to_string();

        let slots = embedder.embed_all(&texts).await;

        let finished = embedder.provider().finished.lock().unwrap().clone();
        assert_eq!(finished.last().map(String::as_str), Some("t0 slow"));
        for (i, slot) in slots.iter().enumerate() {
            assert_eq!(slot.as_deref(), Some(&[i as f32, 1.0][..]), "slot {i}");
        }
    }

    #[tokio::test]
    async fn test_failed_batch_only_marks_its_own_slots() {
        let embedder = BatchEmbedder::new(StubProvider::default(), raw_config(2, 3)).unwrap();
        let mut texts = numbered(7);
        texts[3] = "t3 fail".to_string();

        let slots = embedder.embed_all(&texts).await;

        assert_eq!(slots.len(), 7);
        assert!(slots[2].is_none());
        assert!(slots[3].is_none());
        for i in [0, 1, 4, 5, 6] {
            assert_eq!(slots[i].as_deref(), Some(&[i as f32, 1.0][..]), "slot {i}");
        }
    }

    #[tokio::test]
    async fn test_wrong_count_fails_batch() {
        let embedder = BatchEmbedder::new(StubProvider::default(), raw_config(2, 2)).unwrap();
        let texts = vec!["t0 short".to_string(), "t1".to_string(), "t2".to_string()];

        let slots = embedder.embed_all(&texts).await;

        assert!(slots[0].is_none());
        assert!(slots[1].is_none());
        assert!(slots[2].is_some());
    }

    #[tokio::test]
    async fn test_timeout_fails_batch() {
        let embedder = BatchEmbedder::new(StubProvider::default(), raw_config(1, 2)).unwrap();
        let texts = vec!["t0 hang".to_string(), "t1".to_string()];

        let slots = embedder.embed_all(&texts).await;

        assert!(slots[0].is_none());
        assert_eq!(slots[1].as_deref(), Some(&[1.0, 1.0][..]));
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let embedder = BatchEmbedder::new(StubProvider::default(), raw_config(1, 3)).unwrap();

        let slots = embedder.embed_all(&numbered(12)).await;

        assert!(slots.iter().all(Option::is_some));
        let max = embedder.provider().max_in_flight.load(Ordering::SeqCst);
        assert!(max <= 3, "max in flight was {max}");
        assert!(max >= 2, "batches should overlap, max in flight was {max}");
    }

    #[tokio::test]
    async fn test_newlines_stripped_before_submission() {
        let embedder = BatchEmbedder::new(StubProvider::default(), raw_config(5, 1)).unwrap();
        let texts = vec!["t0 line one\nline two".to_string()];

        embedder.embed_all(&texts).await;

        let inputs = embedder.provider().inputs.lock().unwrap().clone();
        assert_eq!(inputs, vec![vec!["t0 line one line two".to_string()]]);
    }

    #[tokio::test]
    async fn test_batches_are_contiguous() {
        let embedder = BatchEmbedder::new(StubProvider::default(), raw_config(4, 1)).unwrap();

        embedder.embed_all(&numbered(10)).await;

        let mut inputs = embedder.provider().inputs.lock().unwrap().clone();
        inputs.sort_by_key(|b| vector_for(&b[0])[0] as usize);
        let sizes: Vec<usize> = inputs.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![4, 4, 2]);
        assert_eq!(inputs[1][0], "t4");
    }

    #[tokio::test]
    async fn test_empty_input() {
        let embedder = BatchEmbedder::new(StubProvider::default(), raw_config(4, 2)).unwrap();
        assert!(embedder.embed_all(&[]).await.is_empty());
        assert!(embedder.provider().inputs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unit_normalization_applied() {
        let config = BatchConfig {
            normalization: Normalization::Unit,
            ..raw_config(2, 2)
        };
        let embedder = BatchEmbedder::new(StubProvider::default(), config).unwrap();

        let v = embedder.embed_query("t3").await.unwrap();

        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_query_failure_propagates() {
        let embedder = BatchEmbedder::new(StubProvider::default(), raw_config(2, 2)).unwrap();

        let err = embedder.embed_query("t1 fail").await.unwrap_err();

        assert!(matches!(err, Error::Provider(_)));
        assert_eq!(embedder.provider().inputs.lock().unwrap().len(), 1);
    }
}
