pub mod args;
pub mod registry;
pub mod spec;
pub mod store;
pub mod tool;

pub use args::{coerce_args, CoercionError, ToolArgs};
pub use registry::{RegistryError, ToolRegistry};
pub use spec::{ParamKind, ParamSpec, ToolSpec};
pub use store::{register_store_tools, BackendError, DocStoreBackend, MemoryBackend};
pub use tool::{Tool, ToolCall, ToolError, ToolResult};
