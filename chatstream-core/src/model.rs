use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Role/content pair as sent on the wire.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// Body of a streaming chat completion request.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Session token identifying the conversation upstream.
    pub chat_id: String,
}

impl ChatRequest {
    /// Single-turn streaming request for `text`.
    pub fn user_turn(model: impl Into<String>, text: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: vec![ChatMessage {
                role: Role::User,
                content: text.into(),
            }],
            stream: true,
            temperature: None,
            max_tokens: None,
            chat_id: chat_id.into(),
        }
    }
}

/// An entry in the conversation list.
///
/// Messages are values: updates replace the entry at its index rather than
/// mutating a shared object.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default)]
    pub is_temporary: bool,
    #[serde(default)]
    pub is_error: bool,
    /// Display form, computed once when the message is finalized.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rendered: Option<String>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            reasoning: None,
            is_temporary: false,
            is_error: false,
            rendered: None,
        }
    }

    /// Empty in-progress assistant reply.
    pub fn placeholder() -> Self {
        Self {
            role: Role::Assistant,
            content: String::new(),
            reasoning: None,
            is_temporary: true,
            is_error: false,
            rendered: None,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: text.into(),
            reasoning: None,
            is_temporary: false,
            is_error: true,
            rendered: None,
        }
    }
}
