use hearth_tools::{ToolCall, ToolResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// One message on the wire. Assistant messages may carry tool calls; tool
/// messages carry the id of the call they answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(Role::Assistant, content)
    }

    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_call_id: None,
            tool_calls: Vec::new(),
        }
    }
}

/// Message history for one run. Append-only: messages are normalized from
/// the request once and only grow as the loop adds assistant turns and
/// tool results. The system prompt is held separately (providers prepend
/// it) so it survives whatever the history contains.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    system_prompt: Option<String>,
    messages: Vec<ChatMessage>,
}

impl Conversation {
    /// Build from request messages. The request-level system prompt is
    /// applied only when the message list carries no system message of
    /// its own; an explicit one always wins.
    pub fn from_request(messages: Vec<ChatMessage>, system_prompt: Option<String>) -> Self {
        let has_system = messages.iter().any(|m| m.role == Role::System);
        Self {
            system_prompt: if has_system { None } else { system_prompt },
            messages,
        }
    }

    /// Replace the system prompt (knowledge-base grounding does this).
    pub fn set_system_prompt(&mut self, prompt: String) {
        self.system_prompt = Some(prompt);
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn last_is_user(&self) -> bool {
        matches!(self.messages.last(), Some(m) if m.role == Role::User)
    }

    pub fn last_user_content(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }

    pub fn push_assistant_turn(&mut self, text: Option<String>, tool_calls: Vec<ToolCall>) {
        self.messages.push(ChatMessage {
            role: Role::Assistant,
            content: text.unwrap_or_default(),
            tool_call_id: None,
            tool_calls,
        });
    }

    pub fn push_tool_result(&mut self, result: &ToolResult) {
        self.messages.push(ChatMessage {
            role: Role::Tool,
            content: result.content.clone(),
            tool_call_id: Some(result.call_id.clone()),
            tool_calls: Vec::new(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_prompt_used_when_no_system_message() {
        let conv = Conversation::from_request(
            vec![ChatMessage::user("hi")],
            Some("You are terse.".to_string()),
        );
        assert_eq!(conv.system_prompt(), Some("You are terse."));
    }

    #[test]
    fn explicit_system_message_wins_over_request_prompt() {
        let conv = Conversation::from_request(
            vec![ChatMessage::system("Custom."), ChatMessage::user("hi")],
            Some("Ignored.".to_string()),
        );
        assert_eq!(conv.system_prompt(), None);
        assert_eq!(conv.messages()[0].role, Role::System);
    }

    #[test]
    fn last_is_user_tracks_the_tail() {
        let mut conv = Conversation::from_request(vec![ChatMessage::user("hi")], None);
        assert!(conv.last_is_user());
        conv.push_assistant_turn(Some("hello".to_string()), Vec::new());
        assert!(!conv.last_is_user());
    }

    #[test]
    fn tool_results_keep_their_call_id() {
        let mut conv = Conversation::from_request(vec![ChatMessage::user("q")], None);
        conv.push_assistant_turn(
            None,
            vec![ToolCall {
                id: "call_7".to_string(),
                name: "store_count".to_string(),
                input: json!({"collection": "users"}),
            }],
        );
        conv.push_tool_result(&ToolResult {
            call_id: "call_7".to_string(),
            content: r#"{"success":true,"count":2}"#.to_string(),
            is_error: false,
        });

        let last = conv.messages().last().unwrap();
        assert_eq!(last.role, Role::Tool);
        assert_eq!(last.tool_call_id.as_deref(), Some("call_7"));
    }

    #[test]
    fn message_roles_serialize_lowercase() {
        let json = serde_json::to_value(ChatMessage::user("hi")).unwrap();
        assert_eq!(json["role"], "user");
        assert!(json.get("tool_call_id").is_none());
        assert!(json.get("tool_calls").is_none());
    }
}
