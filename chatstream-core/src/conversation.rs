//! Message list owned by the UI side of a chat.
//!
//! At most one message is temporary at any time. It is created by
//! [`Conversation::begin_send`], replaced in place on every progress event, and
//! finalized or removed by [`Conversation::resolve`].

use crate::error::ChatResult;
use crate::model::{Message, Role};
use crate::stream::{ProgressEvent, StreamOutcome};

/// Computes the display form of a finalized assistant message.
pub trait ContentRenderer: Send + Sync {
    fn render(&self, raw: &str) -> String;
}

/// Renders content unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughRenderer;

impl ContentRenderer for PassthroughRenderer {
    fn render(&self, raw: &str) -> String {
        raw.to_string()
    }
}

pub struct Conversation {
    messages: Vec<Message>,
    renderer: Box<dyn ContentRenderer>,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Conversation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conversation")
            .field("messages", &self.messages)
            .finish_non_exhaustive()
    }
}

impl Conversation {
    pub fn new() -> Self {
        Self::with_renderer(Box::new(PassthroughRenderer))
    }

    pub fn with_renderer(renderer: Box<dyn ContentRenderer>) -> Self {
        Self {
            messages: Vec::new(),
            renderer,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn temporary_index(&self) -> Option<usize> {
        self.messages.iter().position(|m| m.is_temporary)
    }

    pub fn is_streaming(&self) -> bool {
        self.temporary_index().is_some()
    }

    /// Append the user's message and an empty temporary assistant reply.
    ///
    /// A leftover temporary message from an unresolved send is dropped first.
    pub fn begin_send(&mut self, text: &str) {
        self.messages.retain(|m| !m.is_temporary);
        self.messages.push(Message::user(text));
        self.messages.push(Message::placeholder());
    }

    /// Append the fragment to the temporary message, replacing it at its index.
    pub fn apply_progress(&mut self, event: &ProgressEvent) {
        let Some(idx) = self.temporary_index() else {
            return;
        };
        let mut next = self.messages[idx].clone();
        if let Some(content) = &event.content {
            next.content.push_str(content);
        }
        if let Some(reasoning) = &event.reasoning {
            next.reasoning
                .get_or_insert_with(String::new)
                .push_str(reasoning);
        }
        self.messages[idx] = next;
    }

    /// Settle the temporary message once the session has ended.
    pub fn resolve(&mut self, result: &ChatResult<StreamOutcome>) {
        let temp = self.temporary_index();
        match (result, temp) {
            (Ok(StreamOutcome::Completed(text)), Some(idx)) => {
                let reasoning = self.messages[idx].reasoning.take();
                let content = text.trim().to_string();
                let rendered = self.renderer.render(&content);
                self.messages[idx] = Message {
                    role: Role::Assistant,
                    content,
                    reasoning,
                    is_temporary: false,
                    is_error: false,
                    rendered: Some(rendered),
                };
            }
            // Already finalized.
            (Ok(StreamOutcome::Completed(_)), None) => {}
            (Ok(StreamOutcome::Cancelled), Some(idx)) => {
                self.messages.remove(idx);
            }
            (Ok(StreamOutcome::Cancelled), None) => {}
            (Err(e), Some(idx)) => self.messages[idx] = Message::error(e.to_string()),
            (Err(e), None) => self.messages.push(Message::error(e.to_string())),
        }
    }

    /// Non-temporary messages in order, then the live temporary one.
    pub fn display_messages(&self) -> Vec<&Message> {
        let mut out: Vec<&Message> = self.messages.iter().filter(|m| !m.is_temporary).collect();
        out.extend(self.messages.iter().find(|m| m.is_temporary));
        out
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}
