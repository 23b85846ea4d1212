//! Document-store backend contract and the `store_*` tool set.

mod backend;
mod tools;

pub use backend::{BackendError, DocStoreBackend, MemoryBackend};
pub use tools::{
    register_store_tools, StoreAggregateTool, StoreCountTool, StoreFindOneTool, StoreFindTool,
    StoreListCollectionsTool,
};
