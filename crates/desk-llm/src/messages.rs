//! Message types for chat completion
//!
//! A conversation is a list of [`Message`]s. Plain turns carry text; tool
//! round-trips carry [`ContentBlock`]s: the assistant's `ToolUse` requests and
//! the `ToolResult`s sent back in the following user turn.

use serde::{Deserialize, Serialize};

/// Message role in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    /// Handled separately by most providers
    System,
}

/// Structured content of a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },

    /// Tool call requested by the assistant
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },

    /// Outcome of a tool call, sent back as part of a user turn
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
}

impl ContentBlock {
    /// Successful tool result
    pub fn tool_result(tool_use_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::ToolResult {
            tool_use_id: tool_use_id.into(),
            content: content.into(),
            is_error: false,
        }
    }

    /// Failed tool result; the model sees the error text
    pub fn tool_error(tool_use_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self::ToolResult {
            tool_use_id: tool_use_id.into(),
            content: error.into(),
            is_error: true,
        }
    }
}

/// Message content: either simple text or structured blocks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

/// A tool call extracted from an assistant message
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
}

/// A message in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: MessageContent,
}

impl Message {
    /// Create a user message with text
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(text.into()),
        }
    }

    /// Create an assistant message with text
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Text(text.into()),
        }
    }

    /// Create a message from structured blocks
    pub fn blocks(role: Role, blocks: Vec<ContentBlock>) -> Self {
        Self {
            role,
            content: MessageContent::Blocks(blocks),
        }
    }

    /// User turn carrying the results of one round of tool calls
    pub fn tool_results(results: Vec<ContentBlock>) -> Self {
        Self::blocks(Role::User, results)
    }

    /// All text content of the message, concatenated
    pub fn text(&self) -> String {
        match &self.content {
            MessageContent::Text(s) => s.clone(),
            MessageContent::Blocks(blocks) => blocks
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// Tool calls requested by this message, in order
    pub fn tool_calls(&self) -> Vec<ToolCall> {
        match &self.content {
            MessageContent::Text(_) => Vec::new(),
            MessageContent::Blocks(blocks) => blocks
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::ToolUse { id, name, input } => Some(ToolCall {
                        id: id.clone(),
                        name: name.clone(),
                        input: input.clone(),
                    }),
                    _ => None,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_of_plain_and_block_messages() {
        assert_eq!(Message::user("Hello").text(), "Hello");

        let msg = Message::blocks(
            Role::Assistant,
            vec![
                ContentBlock::Text {
                    text: "first".into(),
                },
                ContentBlock::ToolUse {
                    id: "call_1".into(),
                    name: "get_info".into(),
                    input: json!({"symbol": "AAPL"}),
                },
                ContentBlock::Text {
                    text: "second".into(),
                },
            ],
        );
        assert_eq!(msg.text(), "first\nsecond");
    }

    #[test]
    fn test_tool_calls_extracted_in_order() {
        let msg = Message::blocks(
            Role::Assistant,
            vec![
                ContentBlock::ToolUse {
                    id: "a".into(),
                    name: "get_info".into(),
                    input: json!({"symbol": "AAPL"}),
                },
                ContentBlock::ToolUse {
                    id: "b".into(),
                    name: "get_news".into(),
                    input: json!({"symbol": "MSFT"}),
                },
            ],
        );

        let calls = msg.tool_calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].name, "get_info");
        assert_eq!(calls[1].id, "b");
        assert!(Message::assistant("done").tool_calls().is_empty());
    }

    #[test]
    fn test_tool_result_serialization_omits_false_error_flag() {
        let ok = serde_json::to_value(ContentBlock::tool_result("x", "fine")).unwrap();
        assert_eq!(ok, json!({"type": "tool_result", "tool_use_id": "x", "content": "fine"}));

        let err = serde_json::to_value(ContentBlock::tool_error("x", "boom")).unwrap();
        assert_eq!(err["is_error"], json!(true));
    }
}
