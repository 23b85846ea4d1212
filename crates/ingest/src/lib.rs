pub mod chunker;
pub mod document;
pub mod embedding;

pub use chunker::{chunk_text, split, Chunk, ChunkConfig, ChunkingError, Chunks};
pub use document::{extract_text, ExtractionError, SourceDocument, SourceFormat};
pub use embedding::{Embedder, EmbeddingBatcher, EmbeddingError, OllamaEmbedder, OpenAiEmbedder};
