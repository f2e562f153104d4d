use super::classifier::{EventClass, FramedEvent};
use super::ProgressEvent;

/// Result of applying one classified event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Progress(ProgressEvent),
    /// Accepted, but carried nothing to report.
    Idle,
    /// The terminator was seen; the stream is over.
    Terminate,
}

/// Owns the append-only response buffer of one stream session.
#[derive(Debug, Default)]
pub struct DeltaAggregator {
    buffer: String,
}

impl DeltaAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: &FramedEvent, class: EventClass) -> Step {
        match class {
            EventClass::Terminator => Step::Terminate,
            EventClass::StructuredDelta(delta) => {
                if delta.is_empty() {
                    return Step::Idle;
                }
                if let Some(content) = &delta.content {
                    self.buffer.push_str(content);
                }
                Step::Progress(ProgressEvent {
                    content: delta.content,
                    reasoning: delta.reasoning_content,
                })
            }
            EventClass::PlainText => {
                self.buffer.push_str(event.as_str());
                Step::Progress(ProgressEvent::content(event.as_str()))
            }
        }
    }

    /// Everything accepted so far, untrimmed.
    pub fn response(&self) -> &str {
        &self.buffer
    }

    /// Hand off the final response, trimmed.
    pub fn into_response(self) -> String {
        let trimmed = self.buffer.trim();
        if trimmed.len() == self.buffer.len() {
            self.buffer
        } else {
            trimmed.to_string()
        }
    }
}
