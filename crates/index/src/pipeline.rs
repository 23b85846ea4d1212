//! Ingestion entry point: extracted text → chunks → embeddings → one
//! durable index batch per document.

use std::sync::Arc;

use chrono::Utc;
use hearth_ingest::chunker::{self, ChunkConfig, ChunkingError};
use hearth_ingest::document::{self, ExtractionError};
use hearth_ingest::embedding::{Embedder, EmbeddingBatcher, EmbeddingError};
use thiserror::Error;
use tracing::info;

use crate::store::{EntryMetadata, IndexError, NewEntry, VectorIndex};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("extraction failed: {0}")]
    Extraction(#[from] ExtractionError),
    #[error("chunking failed: {0}")]
    Chunking(#[from] ChunkingError),
    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),
    #[error("index error: {0}")]
    Index(#[from] IndexError),
    #[error("embedding count {embeddings} does not match chunk count {chunks}")]
    CountMismatch { chunks: usize, embeddings: usize },
}

/// Drives a document through chunking and embedding into the index.
/// Re-ingesting the same document appends duplicate entries (no dedup).
pub struct IngestPipeline {
    embedder: Arc<dyn Embedder>,
    index: Arc<VectorIndex>,
    chunk_config: ChunkConfig,
    batch_size: usize,
}

impl IngestPipeline {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<VectorIndex>,
        chunk_config: ChunkConfig,
        batch_size: usize,
    ) -> Self {
        Self {
            embedder,
            index,
            chunk_config,
            batch_size: batch_size.max(1),
        }
    }

    /// Build a pipeline from the environment-derived config: chunk window
    /// from the chat section, batch size from the embedding section.
    pub fn from_config(
        embedder: Arc<dyn Embedder>,
        index: Arc<VectorIndex>,
        config: &hearth_core::Config,
    ) -> Self {
        Self::new(
            embedder,
            index,
            ChunkConfig {
                max_size: config.chat.chunk_max_size,
                overlap: config.chat.chunk_overlap,
            },
            config.embedding.batch_size,
        )
    }

    /// Ingest already-extracted text under `source_id`. Returns the number
    /// of chunks added. The whole document lands as one atomic index batch.
    pub async fn ingest_text(&self, text: &str, source_id: &str) -> Result<usize, IngestError> {
        let chunks: Vec<_> = chunker::split(text, &self.chunk_config)?.collect();
        if chunks.is_empty() {
            return Ok(0);
        }

        let mut batcher = EmbeddingBatcher::new(self.embedder.clone(), self.batch_size);
        let mut embeddings: Vec<(usize, Vec<f32>)> = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            if let Some(flushed) = batcher.add(chunk.index, chunk.text.clone()).await? {
                embeddings.extend(flushed);
            }
        }
        embeddings.extend(batcher.flush().await?);

        if embeddings.len() != chunks.len() {
            return Err(IngestError::CountMismatch {
                chunks: chunks.len(),
                embeddings: embeddings.len(),
            });
        }
        embeddings.sort_by_key(|(i, _)| *i);

        let ingested_at = Utc::now();
        let batch: Vec<NewEntry> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, (_, embedding))| NewEntry {
                text: chunk.text,
                embedding,
                metadata: EntryMetadata {
                    source_id: source_id.to_string(),
                    chunk_index: chunk.index,
                    ingested_at,
                },
            })
            .collect();

        let count = self.index.add(batch).await?;
        info!(source_id, chunks = count, "document ingested");
        Ok(count)
    }

    /// Ingest raw file bytes: extension dispatch, then `ingest_text`.
    pub async fn ingest_bytes(&self, bytes: &[u8], filename: &str) -> Result<usize, IngestError> {
        let doc = document::extract_text(bytes, filename)?;
        self.ingest_text(&doc.text, &doc.source_id).await
    }
}
