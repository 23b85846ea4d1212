//! The model invocation interface.
//!
//! The trait lives here, not in the provider crate, because it is defined
//! by the consumer (the orchestrator); implementations live in hearth-llm
//! or adapter crates.

use std::pin::Pin;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use hearth_tools::{ToolCall, ToolSpec};
use serde::{Deserialize, Serialize};

use crate::conversation::ChatMessage;

/// Per-invocation knobs, resolved from request plus config defaults.
#[derive(Debug, Clone)]
pub struct ModelOptions {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Tools bound for this turn; empty means no tool use.
    pub tools: Vec<ToolSpec>,
}

/// Provider-agnostic stream events, translated from each backend's wire
/// format in the provider layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ModelEvent {
    TextDelta { text: String },
    ToolCallStart { id: String, name: String },
    ToolCallDelta { id: String, arguments_delta: String },
    ToolCallEnd { id: String },
    TurnEnd { stop: StopReason },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
}

/// A fully collected model turn.
#[derive(Debug, Clone)]
pub struct ModelTurn {
    pub text: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub stop: StopReason,
}

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("stream error: {0}")]
    Stream(String),
}

pub type EventStream = Pin<Box<dyn Stream<Item = Result<ModelEvent, ModelError>> + Send>>;

#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Stream one model turn over the given history.
    async fn invoke_streaming(
        &self,
        messages: Vec<ChatMessage>,
        system_prompt: Option<String>,
        options: &ModelOptions,
    ) -> Result<EventStream, ModelError>;

    /// Non-streaming convenience: collects the stream into a turn.
    async fn invoke(
        &self,
        messages: Vec<ChatMessage>,
        system_prompt: Option<String>,
        options: &ModelOptions,
    ) -> Result<ModelTurn, ModelError> {
        let mut stream = self.invoke_streaming(messages, system_prompt, options).await?;
        let mut acc = TurnAccumulator::new();
        while let Some(event) = stream.next().await {
            acc.push(&event?);
        }
        Ok(acc.finish())
    }

    /// Backend name for logging (e.g. "ollama", "openai").
    fn backend_name(&self) -> &str;
}

/// Folds stream events into a `ModelTurn`. Tool call arguments arrive as
/// JSON text deltas and are parsed once the call ends; unparseable
/// arguments fall back to null and surface later as a coercion error.
#[derive(Debug, Default)]
pub struct TurnAccumulator {
    text_parts: Vec<String>,
    tool_calls: Vec<ToolCall>,
    current_id: String,
    current_name: String,
    current_args: String,
    stop: Option<StopReason>,
}

impl TurnAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: &ModelEvent) {
        match event {
            ModelEvent::TextDelta { text } => self.text_parts.push(text.clone()),
            ModelEvent::ToolCallStart { id, name } => {
                self.current_id = id.clone();
                self.current_name = name.clone();
                self.current_args.clear();
            }
            ModelEvent::ToolCallDelta {
                arguments_delta, ..
            } => self.current_args.push_str(arguments_delta),
            ModelEvent::ToolCallEnd { .. } => {
                let input = if self.current_args.trim().is_empty() {
                    serde_json::Value::Object(serde_json::Map::new())
                } else {
                    serde_json::from_str(&self.current_args).unwrap_or_default()
                };
                self.tool_calls.push(ToolCall {
                    id: std::mem::take(&mut self.current_id),
                    name: std::mem::take(&mut self.current_name),
                    input,
                });
                self.current_args.clear();
            }
            ModelEvent::TurnEnd { stop } => self.stop = Some(*stop),
        }
    }

    pub fn finish(self) -> ModelTurn {
        let text = if self.text_parts.is_empty() {
            None
        } else {
            Some(self.text_parts.concat())
        };
        let stop = self.stop.unwrap_or(if self.tool_calls.is_empty() {
            StopReason::EndTurn
        } else {
            StopReason::ToolUse
        });
        ModelTurn {
            text,
            tool_calls: self.tool_calls,
            stop,
        }
    }
}

/// Mock model for exercising the orchestrator without a backend.
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use super::*;
    use futures::stream;
    use serde_json::Value;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Returns queued event sequences in FIFO order; an empty queue yields
    /// a bare end-of-turn.
    pub struct MockChatModel {
        responses: Mutex<VecDeque<Vec<Result<ModelEvent, ModelError>>>>,
        invocations: AtomicUsize,
    }

    impl MockChatModel {
        pub fn new() -> Self {
            Self {
                responses: Mutex::new(VecDeque::new()),
                invocations: AtomicUsize::new(0),
            }
        }

        pub fn queue_response(&self, events: Vec<ModelEvent>) {
            self.queue_events(events.into_iter().map(Ok).collect());
        }

        /// Queue a raw event sequence, including mid-stream failures.
        pub fn queue_events(&self, events: Vec<Result<ModelEvent, ModelError>>) {
            self.responses.lock().unwrap().push_back(events);
        }

        /// Queue a plain text answer delivered as a single delta.
        pub fn queue_text(&self, text: &str) {
            self.queue_response(vec![
                ModelEvent::TextDelta {
                    text: text.to_string(),
                },
                ModelEvent::TurnEnd {
                    stop: StopReason::EndTurn,
                },
            ]);
        }

        /// Queue a text answer split into the given deltas.
        pub fn queue_text_deltas(&self, deltas: &[&str]) {
            let mut events: Vec<ModelEvent> = deltas
                .iter()
                .map(|d| ModelEvent::TextDelta {
                    text: d.to_string(),
                })
                .collect();
            events.push(ModelEvent::TurnEnd {
                stop: StopReason::EndTurn,
            });
            self.queue_response(events);
        }

        /// Queue a turn requesting one tool call.
        pub fn queue_tool_call(&self, id: &str, name: &str, input: Value) {
            self.queue_response(vec![
                ModelEvent::ToolCallStart {
                    id: id.to_string(),
                    name: name.to_string(),
                },
                ModelEvent::ToolCallDelta {
                    id: id.to_string(),
                    arguments_delta: input.to_string(),
                },
                ModelEvent::ToolCallEnd { id: id.to_string() },
                ModelEvent::TurnEnd {
                    stop: StopReason::ToolUse,
                },
            ]);
        }

        /// Number of model invocations observed so far.
        pub fn invocations(&self) -> usize {
            self.invocations.load(Ordering::SeqCst)
        }
    }

    impl Default for MockChatModel {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl ChatModel for MockChatModel {
        async fn invoke_streaming(
            &self,
            _messages: Vec<ChatMessage>,
            _system_prompt: Option<String>,
            _options: &ModelOptions,
        ) -> Result<EventStream, ModelError> {
            self.invocations.fetch_add(1, Ordering::SeqCst);
            let events = self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| {
                    vec![Ok(ModelEvent::TurnEnd {
                        stop: StopReason::EndTurn,
                    })]
                });
            Ok(Box::pin(stream::iter(events)))
        }

        fn backend_name(&self) -> &str {
            "mock"
        }
    }
}
