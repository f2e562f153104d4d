//! Streaming protocol engine.
//!
//! Contract:
//! - Raw chunks are split into lines by [`LineDecoder`], framed and classified by
//!   [`EventClassifier`], and folded into the response by [`DeltaAggregator`].
//! - Every accepted fragment is reported as one [`ProgressEvent`]; consumers append
//!   fragments, they never replace.
//! - A stream ends in exactly one [`StreamOutcome`] or one error.

pub mod aggregator;
pub mod classifier;
pub mod lines;
pub mod record;

pub use aggregator::{DeltaAggregator, Step};
pub use classifier::{Classification, EventClass, EventClassifier, FramedEvent, TERMINATOR};
pub use lines::LineDecoder;
pub use record::{parse_record, Delta, ParsedRecord};

/// Incremental fragment delivered to the progress callback.
/// At least one field is set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressEvent {
    pub content: Option<String>,
    pub reasoning: Option<String>,
}

impl ProgressEvent {
    pub fn content(text: impl Into<String>) -> Self {
        Self {
            content: Some(text.into()),
            reasoning: None,
        }
    }

    pub fn reasoning(text: impl Into<String>) -> Self {
        Self {
            content: None,
            reasoning: Some(text.into()),
        }
    }
}

/// How a stream session ended when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    /// Final trimmed response text.
    Completed(String),
    /// Stopped by the consumer; carries no result.
    Cancelled,
}

impl StreamOutcome {
    /// Convenience accessor for the completed text.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Completed(s) => Some(s.as_str()),
            Self::Cancelled => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
