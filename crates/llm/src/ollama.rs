//! Ollama backend: `/api/chat` with `stream: true` (NDJSON, one JSON
//! object per line) and native tool calls.

use async_trait::async_trait;
use futures::stream::{self, Stream};
use hearth_runtime::{
    ChatMessage, ChatModel, EventStream, ModelError, ModelEvent, ModelOptions, StopReason,
};
use serde_json::{json, Value};
use std::pin::Pin;
use tracing::debug;

use crate::translate::{message_to_wire, tool_to_wire};

pub struct OllamaChatModel {
    client: reqwest::Client,
    url: String,
}

impl OllamaChatModel {
    /// `url` is the server root, e.g. `http://localhost:11434`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

/// Per-stream parse state: tool call ids are synthesized (Ollama does not
/// assign them) and the stop reason depends on whether calls were seen.
#[derive(Default)]
struct LineState {
    next_call: usize,
    saw_tool_calls: bool,
}

/// Append a chunk to the byte buffer and drain every complete line.
/// Decoding happens per line, after its terminating newline has arrived,
/// so a multi-byte character split across chunk boundaries stays intact.
fn drain_lines(buffer: &mut Vec<u8>, chunk: &[u8]) -> Vec<String> {
    buffer.extend_from_slice(chunk);
    let mut lines = Vec::new();
    while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
        let line_bytes: Vec<u8> = buffer.drain(..=pos).collect();
        let line = String::from_utf8_lossy(&line_bytes[..pos]).trim().to_string();
        if !line.is_empty() {
            lines.push(line);
        }
    }
    lines
}

/// Translate one NDJSON line into stream events.
fn line_events(line: &str, state: &mut LineState) -> Result<Vec<ModelEvent>, ModelError> {
    let parsed: Value = serde_json::from_str(line)
        .map_err(|e| ModelError::InvalidResponse(format!("bad NDJSON line: {e}")))?;

    if let Some(error) = parsed["error"].as_str() {
        return Err(ModelError::Api {
            status: 200,
            message: error.to_string(),
        });
    }

    let mut events = Vec::new();

    if let Some(content) = parsed["message"]["content"].as_str() {
        if !content.is_empty() {
            events.push(ModelEvent::TextDelta {
                text: content.to_string(),
            });
        }
    }

    if let Some(calls) = parsed["message"]["tool_calls"].as_array() {
        for call in calls {
            let name = call["function"]["name"]
                .as_str()
                .ok_or_else(|| {
                    ModelError::InvalidResponse("tool call without a function name".to_string())
                })?
                .to_string();
            let id = format!("call_{}", state.next_call);
            state.next_call += 1;
            state.saw_tool_calls = true;

            events.push(ModelEvent::ToolCallStart {
                id: id.clone(),
                name,
            });
            events.push(ModelEvent::ToolCallDelta {
                id: id.clone(),
                arguments_delta: call["function"]["arguments"].to_string(),
            });
            events.push(ModelEvent::ToolCallEnd { id });
        }
    }

    if parsed["done"].as_bool() == Some(true) {
        let stop = match parsed["done_reason"].as_str() {
            Some("length") => StopReason::MaxTokens,
            _ if state.saw_tool_calls => StopReason::ToolUse,
            _ => StopReason::EndTurn,
        };
        events.push(ModelEvent::TurnEnd { stop });
    }

    Ok(events)
}

#[async_trait]
impl ChatModel for OllamaChatModel {
    async fn invoke_streaming(
        &self,
        messages: Vec<ChatMessage>,
        system_prompt: Option<String>,
        options: &ModelOptions,
    ) -> Result<EventStream, ModelError> {
        let url = format!("{}/api/chat", self.url);

        let mut api_messages: Vec<Value> = Vec::with_capacity(messages.len() + 1);
        if let Some(system) = &system_prompt {
            api_messages.push(json!({"role": "system", "content": system}));
        }
        api_messages.extend(messages.iter().map(message_to_wire));

        let mut body = json!({
            "model": options.model,
            "messages": api_messages,
            "stream": true,
            "options": {
                "temperature": options.temperature,
                "num_predict": options.max_tokens,
            },
        });
        if !options.tools.is_empty() {
            body["tools"] = Value::Array(options.tools.iter().map(tool_to_wire).collect());
        }

        debug!(model = %options.model, url = %url, "starting Ollama streaming request");

        let response = self
            .client
            .post(&url)
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

        type ByteStream = Pin<Box<dyn Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send>>;

        struct State {
            bytes: ByteStream,
            buffer: Vec<u8>,
            line_state: LineState,
            pending: std::collections::VecDeque<Result<ModelEvent, ModelError>>,
        }

        let state = State {
            bytes: Box::pin(response.bytes_stream()),
            buffer: Vec::new(),
            line_state: LineState::default(),
            pending: std::collections::VecDeque::new(),
        };

        let event_stream = stream::unfold(state, move |mut state| async move {
            use futures::StreamExt;
            loop {
                if let Some(item) = state.pending.pop_front() {
                    return Some((item, state));
                }

                match state.bytes.next().await {
                    Some(Ok(chunk)) => {
                        for line in drain_lines(&mut state.buffer, &chunk) {
                            match line_events(&line, &mut state.line_state) {
                                Ok(events) => state.pending.extend(events.into_iter().map(Ok)),
                                Err(e) => state.pending.push_back(Err(e)),
                            }
                        }
                    }
                    Some(Err(e)) => {
                        return Some((Err(ModelError::Stream(e.to_string())), state));
                    }
                    None => {
                        return state.pending.pop_front().map(|item| (item, state));
                    }
                }
            }
        });

        Ok(Box::pin(event_stream))
    }

    fn backend_name(&self) -> &str {
        "ollama"
    }
}
