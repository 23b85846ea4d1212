//! Shared wire translation between the runtime's message model and the
//! chat-completions shape both backends speak.

use hearth_runtime::{ChatMessage, Role};
use hearth_tools::ToolSpec;
use serde_json::{json, Value};

pub(crate) fn role_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

/// Render a tool spec as a `{"type": "function", ...}` binding.
pub(crate) fn tool_to_wire(spec: &ToolSpec) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": spec.name,
            "description": spec.description,
            "parameters": spec.input_schema(),
        },
    })
}

/// Render a message, including assistant tool calls and the tool-result
/// call id where present.
pub(crate) fn message_to_wire(message: &ChatMessage) -> Value {
    let mut wire = json!({
        "role": role_str(message.role),
        "content": message.content,
    });
    if !message.tool_calls.is_empty() {
        wire["tool_calls"] = Value::Array(
            message
                .tool_calls
                .iter()
                .map(|call| {
                    json!({
                        "id": call.id,
                        "type": "function",
                        "function": {
                            "name": call.name,
                            "arguments": call.input,
                        },
                    })
                })
                .collect(),
        );
    }
    if let Some(call_id) = &message.tool_call_id {
        wire["tool_call_id"] = json!(call_id);
    }
    wire
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_tools::{ParamKind, ParamSpec, ToolCall};

    #[test]
    fn plain_messages_carry_role_and_content() {
        let wire = message_to_wire(&ChatMessage::user("hello"));
        assert_eq!(wire, json!({"role": "user", "content": "hello"}));
    }

    #[test]
    fn assistant_tool_calls_are_rendered_as_functions() {
        let mut message = ChatMessage::assistant("");
        message.tool_calls.push(ToolCall {
            id: "c1".to_string(),
            name: "store_find".to_string(),
            input: json!({"collection": "users"}),
        });
        let wire = message_to_wire(&message);
        assert_eq!(wire["tool_calls"][0]["function"]["name"], "store_find");
        assert_eq!(
            wire["tool_calls"][0]["function"]["arguments"]["collection"],
            "users"
        );
    }

    #[test]
    fn tool_results_keep_their_call_id() {
        let message = ChatMessage {
            role: Role::Tool,
            content: r#"{"success":true}"#.to_string(),
            tool_call_id: Some("c1".to_string()),
            tool_calls: Vec::new(),
        };
        let wire = message_to_wire(&message);
        assert_eq!(wire["role"], "tool");
        assert_eq!(wire["tool_call_id"], "c1");
    }

    #[test]
    fn tool_binding_exposes_the_schema() {
        let spec = ToolSpec {
            name: "store_count".to_string(),
            description: "Count documents".to_string(),
            params: vec![ParamSpec::required(
                "collection",
                ParamKind::Text,
                "Collection to count",
            )],
        };
        let wire = tool_to_wire(&spec);
        assert_eq!(wire["type"], "function");
        assert_eq!(
            wire["function"]["parameters"]["required"],
            json!(["collection"])
        );
    }
}
