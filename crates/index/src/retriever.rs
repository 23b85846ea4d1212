//! Question → ranked context text, over the persisted vector index.

use std::sync::Arc;

use hearth_ingest::embedding::{Embedder, EmbeddingError};
use thiserror::Error;
use tracing::debug;

use crate::store::{IndexError, VectorIndex};

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("query embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),
    #[error("index error: {0}")]
    Index(#[from] IndexError),
}

/// Wraps the vector index behind a text-in/text-out contract. The embedder
/// must be the same one used at ingestion.
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<VectorIndex>,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<VectorIndex>) -> Self {
        Self { embedder, index }
    }

    /// Embed the question, query the index, and concatenate the top-k chunk
    /// texts with blank-line separators in ranked order.
    ///
    /// An empty index or zero matches yields an empty string, not an error;
    /// callers supply the "no information" phrasing.
    pub async fn retrieve(&self, question: &str, k: usize) -> Result<String, RetrievalError> {
        if self.index.is_empty().await {
            debug!("retrieve on empty index");
            return Ok(String::new());
        }

        let embedding = self.embedder.embed(question).await?;
        let hits = self.index.query(&embedding, k).await?;
        debug!(hits = hits.len(), k, "retrieval complete");

        Ok(hits
            .iter()
            .map(|h| h.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n"))
    }
}
