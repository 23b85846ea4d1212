//! OpenAI-compatible backend: non-streaming chat completions bridged
//! into the stream event model (the response arrives as one delta per
//! text/tool block).

use async_trait::async_trait;
use futures::stream;
use hearth_runtime::{
    ChatMessage, ChatModel, EventStream, ModelError, ModelEvent, ModelOptions, StopReason,
};
use serde_json::{json, Value};
use tracing::debug;

use crate::translate::{message_to_wire, tool_to_wire};

pub struct OpenAiChatModel {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAiChatModel {
    /// `base_url` includes the version prefix, e.g.
    /// `https://api.openai.com/v1`.
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }

    pub fn with_defaults(api_key: impl Into<String>) -> Self {
        Self::new(api_key, "https://api.openai.com/v1")
    }
}

/// Translate a completed chat-completions response into the events a
/// streaming consumer would have seen.
fn response_events(response: &Value) -> Result<Vec<ModelEvent>, ModelError> {
    let choice = response["choices"]
        .get(0)
        .ok_or_else(|| ModelError::InvalidResponse("response has no choices".to_string()))?;
    let message = &choice["message"];

    let mut events = Vec::new();

    if let Some(content) = message["content"].as_str() {
        if !content.is_empty() {
            events.push(ModelEvent::TextDelta {
                text: content.to_string(),
            });
        }
    }

    if let Some(calls) = message["tool_calls"].as_array() {
        for (i, call) in calls.iter().enumerate() {
            let id = call["id"]
                .as_str()
                .map(String::from)
                .unwrap_or_else(|| format!("call_{i}"));
            let name = call["function"]["name"]
                .as_str()
                .ok_or_else(|| {
                    ModelError::InvalidResponse("tool call without a function name".to_string())
                })?
                .to_string();
            // Arguments arrive as a JSON-encoded string.
            let arguments = call["function"]["arguments"]
                .as_str()
                .unwrap_or("{}")
                .to_string();

            events.push(ModelEvent::ToolCallStart {
                id: id.clone(),
                name,
            });
            events.push(ModelEvent::ToolCallDelta {
                id: id.clone(),
                arguments_delta: arguments,
            });
            events.push(ModelEvent::ToolCallEnd { id });
        }
    }

    let stop = match choice["finish_reason"].as_str() {
        Some("tool_calls") => StopReason::ToolUse,
        Some("length") => StopReason::MaxTokens,
        _ => StopReason::EndTurn,
    };
    events.push(ModelEvent::TurnEnd { stop });

    Ok(events)
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    async fn invoke_streaming(
        &self,
        messages: Vec<ChatMessage>,
        system_prompt: Option<String>,
        options: &ModelOptions,
    ) -> Result<EventStream, ModelError> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut api_messages: Vec<Value> = Vec::with_capacity(messages.len() + 1);
        if let Some(system) = &system_prompt {
            api_messages.push(json!({"role": "system", "content": system}));
        }
        api_messages.extend(messages.iter().map(message_to_wire));

        let mut body = json!({
            "model": options.model,
            "messages": api_messages,
            "temperature": options.temperature,
            "max_tokens": options.max_tokens,
        });
        if !options.tools.is_empty() {
            body["tools"] = Value::Array(options.tools.iter().map(tool_to_wire).collect());
        }

        debug!(model = %options.model, url = %url, "sending OpenAI chat request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ModelError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            let message = response.text().await.unwrap_or_default();
            return Err(ModelError::Api { status, message });
        }

        let parsed: Value = response
            .json()
            .await
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;
        let events = response_events(&parsed)?;

        Ok(Box::pin(stream::iter(events.into_iter().map(Ok))))
    }

    fn backend_name(&self) -> &str {
        "openai"
    }
}
