pub mod pipeline;
pub mod retriever;
pub mod store;

pub use pipeline::{IngestError, IngestPipeline};
pub use retriever::{RetrievalError, Retriever};
pub use store::{EntryMetadata, IndexEntry, IndexError, NewEntry, SearchHit, VectorIndex};
