//! The chat run state machine.
//!
//! A run owns its flow, conversation, and iteration counter; nothing is
//! shared between runs. Model failure aborts the run, tool failure never
//! does (the result goes back to the model as data).

use std::sync::Arc;
use std::time::{Duration, Instant};

use hearth_core::config::ChatConfig;
use hearth_index::{RetrievalError, Retriever};
use hearth_tools::ToolRegistry;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::conversation::{Conversation, Role};
use crate::model::{ChatModel, ModelError, ModelOptions};

pub(crate) const DEFAULT_MODEL: &str = "llama3.2";

/// Incoming chat request, deserialized straight off the wire.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<crate::conversation::ChatMessage>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub use_knowledge_base: bool,
    #[serde(default)]
    pub use_tool_bridge: bool,
}

/// Why a run stopped. `IterationLimit` is an outcome, not an error: the
/// model kept requesting tools until the loop ran out of budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminal {
    Complete,
    IterationLimit,
}

#[derive(Debug)]
pub struct RunOutcome {
    pub content: String,
    pub terminal: Terminal,
}

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),
    #[error("run deadline exceeded")]
    DeadlineExceeded,
}

/// Which state machine a request routes into. Knowledge-base grounding
/// takes precedence over the tool bridge when both are requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Plain,
    Rag,
    ToolBridge,
}

pub struct Orchestrator {
    pub(crate) model: Arc<dyn ChatModel>,
    pub(crate) registry: Arc<ToolRegistry>,
    retriever: Option<Arc<Retriever>>,
    default_model: String,
    temperature: f32,
    max_tokens: u32,
    max_input_len: usize,
    pub(crate) max_iterations: usize,
    retrieval_k: usize,
    pub(crate) deadline: Option<Duration>,
}

impl Orchestrator {
    pub fn new(model: Arc<dyn ChatModel>, registry: Arc<ToolRegistry>) -> Self {
        Self {
            model,
            registry,
            retriever: None,
            default_model: DEFAULT_MODEL.to_string(),
            temperature: 0.7,
            max_tokens: 2048,
            max_input_len: 10_000,
            max_iterations: 5,
            retrieval_k: 3,
            deadline: None,
        }
    }

    pub fn with_retriever(mut self, retriever: Arc<Retriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// Apply the chat section of the environment config.
    pub fn with_config(mut self, config: &ChatConfig) -> Self {
        self.temperature = config.temperature;
        self.max_tokens = config.max_tokens;
        self.max_input_len = config.max_input_len;
        self.max_iterations = config.max_iterations as usize;
        self.retrieval_k = config.retrieval_k;
        self
    }

    /// Run a request to completion and return the final content.
    pub async fn run(&self, request: ChatRequest) -> Result<RunOutcome, OrchestratorError> {
        let flow = self.route(&request);
        self.validate(&request, flow)?;
        let deadline = self.deadline.map(|d| Instant::now() + d);
        let (mut conversation, options) = self.prepare(&request, flow).await?;
        info!(flow = ?flow, model = %options.model, "chat run started");

        match flow {
            Flow::Plain | Flow::Rag => {
                check_deadline(deadline)?;
                let turn = self
                    .model
                    .invoke(
                        conversation.messages().to_vec(),
                        conversation.system_prompt().map(String::from),
                        &options,
                    )
                    .await?;
                Ok(RunOutcome {
                    content: turn.text.unwrap_or_default(),
                    terminal: Terminal::Complete,
                })
            }
            Flow::ToolBridge => self.run_tool_loop(&mut conversation, &options, deadline).await,
        }
    }

    async fn run_tool_loop(
        &self,
        conversation: &mut Conversation,
        options: &ModelOptions,
        deadline: Option<Instant>,
    ) -> Result<RunOutcome, OrchestratorError> {
        let mut last_text = String::new();
        for iteration in 0..self.max_iterations {
            check_deadline(deadline)?;
            let turn = self
                .model
                .invoke(
                    conversation.messages().to_vec(),
                    conversation.system_prompt().map(String::from),
                    options,
                )
                .await?;

            if let Some(text) = &turn.text {
                last_text = text.clone();
            }
            if turn.tool_calls.is_empty() {
                return Ok(RunOutcome {
                    content: turn.text.unwrap_or_default(),
                    terminal: Terminal::Complete,
                });
            }

            debug!(iteration, calls = turn.tool_calls.len(), "executing tool calls");
            conversation.push_assistant_turn(turn.text.clone(), turn.tool_calls.clone());
            for call in &turn.tool_calls {
                check_deadline(deadline)?;
                let result = self.registry.execute(call).await;
                conversation.push_tool_result(&result);
            }
        }

        warn!(max_iterations = self.max_iterations, "tool loop hit iteration limit");
        Ok(RunOutcome {
            content: last_text,
            terminal: Terminal::IterationLimit,
        })
    }

    pub(crate) fn route(&self, request: &ChatRequest) -> Flow {
        if request.use_knowledge_base {
            Flow::Rag
        } else if request.use_tool_bridge {
            Flow::ToolBridge
        } else {
            Flow::Plain
        }
    }

    pub(crate) fn validate(
        &self,
        request: &ChatRequest,
        flow: Flow,
    ) -> Result<(), OrchestratorError> {
        if request.messages.is_empty() {
            return Err(OrchestratorError::InvalidRequest(
                "message list is empty".to_string(),
            ));
        }
        for message in &request.messages {
            let len = message.content.chars().count();
            if len > self.max_input_len {
                return Err(OrchestratorError::InvalidRequest(format!(
                    "message content of {len} characters exceeds the limit of {}",
                    self.max_input_len
                )));
            }
        }
        if flow == Flow::Rag
            && !matches!(request.messages.last(), Some(m) if m.role == Role::User)
        {
            return Err(OrchestratorError::InvalidRequest(
                "knowledge-base chat requires the last message to be from the user".to_string(),
            ));
        }
        Ok(())
    }

    pub(crate) async fn prepare(
        &self,
        request: &ChatRequest,
        flow: Flow,
    ) -> Result<(Conversation, ModelOptions), OrchestratorError> {
        let mut conversation =
            Conversation::from_request(request.messages.clone(), request.system_prompt.clone());

        if flow == Flow::Rag {
            let retriever = self.retriever.as_ref().ok_or_else(|| {
                OrchestratorError::InvalidRequest("knowledge base is not configured".to_string())
            })?;
            // Validation guarantees a trailing user message.
            let question = conversation.last_user_content().unwrap_or_default();
            let context = retriever.retrieve(question, self.retrieval_k).await?;
            debug!(context_chars = context.len(), "knowledge base context retrieved");
            conversation.set_system_prompt(grounding_prompt(&context));
        }

        let options = ModelOptions {
            model: request
                .model
                .clone()
                .unwrap_or_else(|| self.default_model.clone()),
            temperature: request.temperature.unwrap_or(self.temperature),
            max_tokens: request.max_tokens.unwrap_or(self.max_tokens),
            tools: if flow == Flow::ToolBridge {
                self.registry.specs()
            } else {
                Vec::new()
            },
        };
        Ok((conversation, options))
    }
}

pub(crate) fn check_deadline(deadline: Option<Instant>) -> Result<(), OrchestratorError> {
    match deadline {
        Some(d) if Instant::now() >= d => Err(OrchestratorError::DeadlineExceeded),
        _ => Ok(()),
    }
}

fn grounding_prompt(context: &str) -> String {
    format!(
        "Answer the user's question using only the context below.\n\n\
         Context:\n{context}\n\n\
         If the context does not contain the information needed, reply exactly: \
         \"I don't have enough information in my knowledge base to answer that.\""
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::ChatMessage;
    use crate::model::mock::MockChatModel;
    use async_trait::async_trait;
    use hearth_index::VectorIndex;
    use hearth_ingest::embedding::{Embedder, EmbeddingError};
    use hearth_tools::{register_store_tools, MemoryBackend};
    use serde_json::json;

    fn user_request(text: &str) -> ChatRequest {
        ChatRequest {
            messages: vec![ChatMessage::user(text)],
            model: None,
            temperature: None,
            max_tokens: None,
            system_prompt: None,
            use_knowledge_base: false,
            use_tool_bridge: false,
        }
    }

    fn tool_registry() -> Arc<ToolRegistry> {
        let backend = MemoryBackend::new();
        backend.insert("users", json!({"name": "ada"}));
        backend.insert("users", json!({"name": "grace"}));
        let mut registry = ToolRegistry::new();
        register_store_tools(&mut registry, Arc::new(backend)).unwrap();
        Arc::new(registry)
    }

    struct ConstEmbedder;

    #[async_trait]
    impl Embedder for ConstEmbedder {
        async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }

        fn dimensions(&self) -> usize {
            2
        }
    }

    async fn rag_orchestrator(model: Arc<MockChatModel>) -> (Orchestrator, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let index = Arc::new(VectorIndex::open(dir.path()).await.unwrap());
        let retriever = Arc::new(Retriever::new(Arc::new(ConstEmbedder), index));
        let orchestrator = Orchestrator::new(model, Arc::new(ToolRegistry::new()))
            .with_retriever(retriever);
        (orchestrator, dir)
    }

    #[tokio::test]
    async fn plain_flow_is_a_single_model_turn() {
        let model = Arc::new(MockChatModel::new());
        model.queue_text("Hello!");
        let orchestrator = Orchestrator::new(model.clone(), Arc::new(ToolRegistry::new()));

        let outcome = orchestrator.run(user_request("hi")).await.unwrap();
        assert_eq!(outcome.content, "Hello!");
        assert_eq!(outcome.terminal, Terminal::Complete);
        assert_eq!(model.invocations(), 1);
    }

    #[tokio::test]
    async fn empty_message_list_is_rejected() {
        let model = Arc::new(MockChatModel::new());
        let orchestrator = Orchestrator::new(model.clone(), Arc::new(ToolRegistry::new()));
        let mut request = user_request("x");
        request.messages.clear();

        let err = orchestrator.run(request).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidRequest(_)));
        assert_eq!(model.invocations(), 0);
    }

    #[tokio::test]
    async fn oversized_message_is_rejected_before_any_model_work() {
        let model = Arc::new(MockChatModel::new());
        let orchestrator = Orchestrator::new(model.clone(), Arc::new(ToolRegistry::new()));

        let err = orchestrator
            .run(user_request(&"x".repeat(10_001)))
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidRequest(_)));
        assert_eq!(model.invocations(), 0);
    }

    #[tokio::test]
    async fn rag_requires_trailing_user_message() {
        let model = Arc::new(MockChatModel::new());
        let (orchestrator, _dir) = rag_orchestrator(model).await;

        let mut request = user_request("q");
        request.use_knowledge_base = true;
        request.messages.push(ChatMessage::assistant("a"));

        let err = orchestrator.run(request).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn rag_flow_grounds_and_answers_in_one_turn() {
        let model = Arc::new(MockChatModel::new());
        model.queue_text("Answer from context.");
        let (orchestrator, _dir) = rag_orchestrator(model.clone()).await;

        let mut request = user_request("what do we know?");
        request.use_knowledge_base = true;

        let outcome = orchestrator.run(request).await.unwrap();
        assert_eq!(outcome.content, "Answer from context.");
        assert_eq!(outcome.terminal, Terminal::Complete);
        assert_eq!(model.invocations(), 1);
    }

    #[test]
    fn knowledge_base_takes_precedence_over_tool_bridge() {
        let model = Arc::new(MockChatModel::new());
        let orchestrator = Orchestrator::new(model, tool_registry());

        let mut request = user_request("q");
        request.use_knowledge_base = true;
        request.use_tool_bridge = true;
        assert_eq!(orchestrator.route(&request), Flow::Rag);

        request.use_knowledge_base = false;
        assert_eq!(orchestrator.route(&request), Flow::ToolBridge);

        request.use_tool_bridge = false;
        assert_eq!(orchestrator.route(&request), Flow::Plain);
    }

    #[tokio::test]
    async fn tool_loop_executes_one_round_then_answers() {
        let model = Arc::new(MockChatModel::new());
        model.queue_tool_call("c1", "store_count", json!({"collection": "users"}));
        model.queue_text("There are 2 users.");
        let orchestrator = Orchestrator::new(model.clone(), tool_registry());

        let mut request = user_request("how many users?");
        request.use_tool_bridge = true;

        let outcome = orchestrator.run(request).await.unwrap();
        assert_eq!(outcome.content, "There are 2 users.");
        assert_eq!(outcome.terminal, Terminal::Complete);
        assert_eq!(model.invocations(), 2);
    }

    #[tokio::test]
    async fn tool_loop_stops_at_iteration_limit() {
        let model = Arc::new(MockChatModel::new());
        for i in 0..10 {
            model.queue_tool_call(
                &format!("c{i}"),
                "store_list_collections",
                json!({}),
            );
        }
        let orchestrator = Orchestrator::new(model.clone(), tool_registry());

        let mut request = user_request("loop forever");
        request.use_tool_bridge = true;

        let outcome = orchestrator.run(request).await.unwrap();
        assert_eq!(outcome.terminal, Terminal::IterationLimit);
        assert_eq!(model.invocations(), 5);
    }

    #[tokio::test]
    async fn unknown_tool_is_fed_back_not_fatal() {
        let model = Arc::new(MockChatModel::new());
        model.queue_tool_call("c1", "no_such_tool", json!({}));
        model.queue_text("Could not use that tool.");
        let orchestrator = Orchestrator::new(model.clone(), tool_registry());

        let mut request = user_request("try something");
        request.use_tool_bridge = true;

        let outcome = orchestrator.run(request).await.unwrap();
        assert_eq!(outcome.terminal, Terminal::Complete);
        assert_eq!(outcome.content, "Could not use that tool.");
    }

    #[tokio::test]
    async fn expired_deadline_aborts_the_run() {
        let model = Arc::new(MockChatModel::new());
        model.queue_text("never delivered");
        let orchestrator = Orchestrator::new(model.clone(), Arc::new(ToolRegistry::new()))
            .with_deadline(Duration::ZERO);

        let err = orchestrator.run(user_request("hi")).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::DeadlineExceeded));
    }

    #[test]
    fn grounding_prompt_carries_the_fallback_sentence() {
        let prompt = grounding_prompt("chunk one\n\nchunk two");
        assert!(prompt.contains("chunk one\n\nchunk two"));
        assert!(prompt.contains("I don't have enough information in my knowledge base"));
    }
}
