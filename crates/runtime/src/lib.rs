pub mod conversation;
pub mod model;
pub mod orchestrator;
pub mod stream;

pub use conversation::{ChatMessage, Conversation, Role};
pub use model::{
    ChatModel, EventStream, ModelError, ModelEvent, ModelOptions, ModelTurn, StopReason,
    TurnAccumulator,
};
pub use orchestrator::{ChatRequest, Orchestrator, OrchestratorError, RunOutcome, Terminal};
pub use stream::ChatFragment;

#[cfg(any(test, feature = "test-utils"))]
pub use model::mock::MockChatModel;
