use std::sync::Arc;

use super::traits::{Embedder, EmbeddingError};

/// Collects chunk texts and flushes to the embedder when the batch is full.
pub struct EmbeddingBatcher {
    buffer: Vec<(usize, String)>,
    batch_size: usize,
    embedder: Arc<dyn Embedder>,
}

impl EmbeddingBatcher {
    pub fn new(embedder: Arc<dyn Embedder>, batch_size: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(batch_size),
            batch_size,
            embedder,
        }
    }

    /// Add a chunk to the batch. Returns embeddings if the batch is full
    /// (auto-flush), tagged with the chunk index each text arrived with.
    pub async fn add(
        &mut self,
        chunk_index: usize,
        text: String,
    ) -> Result<Option<Vec<(usize, Vec<f32>)>>, EmbeddingError> {
        self.buffer.push((chunk_index, text));
        if self.buffer.len() >= self.batch_size {
            Ok(Some(self.flush().await?))
        } else {
            Ok(None)
        }
    }

    /// Force-flush remaining items.
    pub async fn flush(&mut self) -> Result<Vec<(usize, Vec<f32>)>, EmbeddingError> {
        if self.buffer.is_empty() {
            return Ok(Vec::new());
        }
        let batch: Vec<(usize, String)> = self.buffer.drain(..).collect();
        let texts: Vec<&str> = batch.iter().map(|(_, t)| t.as_str()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;

        Ok(batch
            .into_iter()
            .zip(embeddings)
            .map(|((i, _), emb)| (i, emb))
            .collect())
    }

    /// Number of items currently buffered.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}
