//! Directory-backed vector index.
//!
//! Each `add` call persists one batch file (`batch-<uuid>.json`) via
//! temp-file + fsync + atomic rename, then publishes the entries to the
//! in-memory table under a write lock. A batch is either fully visible to
//! queries or not at all: a concurrent reader never observes a document
//! torn across chunks.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

// ── Types ───────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt batch file {path}: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("dimension mismatch: index holds {expected}-dim vectors, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Attribution metadata stored with every entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub source_id: String,
    pub chunk_index: usize,
    pub ingested_at: DateTime<Utc>,
}

/// A persisted index entry. Append-only: never mutated after `add`,
/// removable only through `clear`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: Uuid,
    /// Monotonic insertion counter; the tie-breaker for equal scores.
    pub seq: u64,
    pub text: String,
    pub embedding: Vec<f32>,
    pub metadata: EntryMetadata,
}

/// Input for `add`; id and seq are assigned by the index.
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub text: String,
    pub embedding: Vec<f32>,
    pub metadata: EntryMetadata,
}

/// A ranked query hit.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub id: Uuid,
    pub text: String,
    pub score: f32,
    pub metadata: EntryMetadata,
}

// ── Store ───────────────────────────────────────────────────────────────────

struct IndexState {
    entries: Vec<IndexEntry>,
    next_seq: u64,
}

/// Shared, read-mostly vector index. Readers query concurrently with an
/// in-flight writer; visibility flips per batch under the write guard.
pub struct VectorIndex {
    dir: PathBuf,
    state: RwLock<IndexState>,
}

impl VectorIndex {
    /// Open (or create) an index at `dir`, loading every persisted batch.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, IndexError> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;

        let mut entries: Vec<IndexEntry> = Vec::new();
        let mut read_dir = tokio::fs::read_dir(&dir).await?;
        while let Some(file) = read_dir.next_entry().await? {
            let path = file.path();
            if !is_batch_file(&path) {
                continue;
            }
            let bytes = tokio::fs::read(&path).await?;
            let batch: Vec<IndexEntry> = serde_json::from_slice(&bytes)
                .map_err(|source| IndexError::Corrupt {
                    path: path.clone(),
                    source,
                })?;
            entries.extend(batch);
        }

        // Batch files load in directory order; seq restores insertion order.
        entries.sort_by_key(|e| e.seq);
        let next_seq = entries.last().map(|e| e.seq + 1).unwrap_or(0);

        info!(dir = %dir.display(), entries = entries.len(), "vector index opened");
        Ok(Self {
            dir,
            state: RwLock::new(IndexState { entries, next_seq }),
        })
    }

    /// Append a batch of entries durably. The batch becomes visible to
    /// queries only after its file reaches disk.
    pub async fn add(&self, batch: Vec<NewEntry>) -> Result<usize, IndexError> {
        if batch.is_empty() {
            return Ok(0);
        }

        let mut state = self.state.write().await;

        let expected = state
            .entries
            .first()
            .map(|e| e.embedding.len())
            .unwrap_or_else(|| batch[0].embedding.len());
        for entry in &batch {
            if entry.embedding.len() != expected {
                return Err(IndexError::DimensionMismatch {
                    expected,
                    actual: entry.embedding.len(),
                });
            }
        }

        let entries: Vec<IndexEntry> = batch
            .into_iter()
            .enumerate()
            .map(|(i, e)| IndexEntry {
                id: Uuid::new_v4(),
                seq: state.next_seq + i as u64,
                text: e.text,
                embedding: e.embedding,
                metadata: e.metadata,
            })
            .collect();

        self.write_batch_file(&entries).await?;

        state.next_seq += entries.len() as u64;
        let count = entries.len();
        state.entries.extend(entries);
        debug!(count, total = state.entries.len(), "batch added to index");
        Ok(count)
    }

    /// Top-k nearest neighbors by cosine similarity, highest first. Equal
    /// scores keep insertion order (stable).
    pub async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<SearchHit>, IndexError> {
        let state = self.state.read().await;

        if let Some(existing) = state.entries.first() {
            if existing.embedding.len() != embedding.len() {
                return Err(IndexError::DimensionMismatch {
                    expected: existing.embedding.len(),
                    actual: embedding.len(),
                });
            }
        }

        let mut scored: Vec<(f32, &IndexEntry)> = state
            .entries
            .iter()
            .map(|e| (cosine_similarity(embedding, &e.embedding), e))
            .collect();
        // Descending score; seq ascending breaks ties.
        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.1.seq.cmp(&b.1.seq))
        });
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(score, e)| SearchHit {
                id: e.id,
                text: e.text.clone(),
                score,
                metadata: e.metadata.clone(),
            })
            .collect())
    }

    /// Remove every entry and batch file.
    pub async fn clear(&self) -> Result<(), IndexError> {
        let mut state = self.state.write().await;
        let mut read_dir = tokio::fs::read_dir(&self.dir).await?;
        while let Some(file) = read_dir.next_entry().await? {
            let path = file.path();
            if is_batch_file(&path) {
                tokio::fs::remove_file(&path).await?;
            }
        }
        state.entries.clear();
        state.next_seq = 0;
        info!(dir = %self.dir.display(), "vector index cleared");
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.entries.is_empty()
    }

    async fn write_batch_file(&self, entries: &[IndexEntry]) -> Result<(), IndexError> {
        let name = format!("batch-{}.json", Uuid::new_v4());
        let final_path = self.dir.join(&name);
        let tmp_path = self.dir.join(format!(".{name}.tmp"));

        let bytes = serde_json::to_vec(entries)?;
        let mut file = tokio::fs::File::create(&tmp_path).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&tmp_path, &final_path).await?;
        Ok(())
    }
}

fn is_batch_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    name.starts_with("batch-") && name.ends_with(".json")
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
