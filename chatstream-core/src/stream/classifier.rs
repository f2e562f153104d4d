use once_cell::sync::Lazy;
use regex::Regex;

use super::record::{parse_record, Delta, ParsedRecord};

/// Reserved literal marking the explicit end of a streamed response.
pub const TERMINATOR: &str = "[DONE]";

static FRAMING_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*data:\s*").expect("framing prefix regex is valid"));

/// A logical line with framing removed and whitespace trimmed. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramedEvent(String);

impl FramedEvent {
    /// Strip the `data:` prefix and trim; `None` when nothing is left.
    pub fn from_line(line: &str) -> Option<Self> {
        let unframed = FRAMING_PREFIX.replace(line, "");
        let text = unframed.trim();
        if text.is_empty() {
            None
        } else {
            Some(Self(text.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventClass {
    Terminator,
    StructuredDelta(Delta),
    PlainText,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Nothing left after framing was removed.
    Empty,
    /// Identical to the previous accepted event.
    Duplicate(FramedEvent),
    Event(FramedEvent, EventClass),
}

/// Sequential, stateful line classifier.
///
/// Duplicate detection only compares against the single most recent accepted
/// event; the same payload separated by any other event is accepted again.
#[derive(Debug, Default)]
pub struct EventClassifier {
    last_seen: Option<FramedEvent>,
}

impl EventClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn classify(&mut self, line: &str) -> Classification {
        let Some(event) = FramedEvent::from_line(line) else {
            return Classification::Empty;
        };
        if event.as_str() == TERMINATOR {
            return Classification::Event(event, EventClass::Terminator);
        }
        if self.last_seen.as_ref() == Some(&event) {
            return Classification::Duplicate(event);
        }
        let class = match parse_record(event.as_str()) {
            ParsedRecord::Valid(delta) => EventClass::StructuredDelta(delta),
            ParsedRecord::Malformed => EventClass::PlainText,
        };
        self.last_seen = Some(event.clone());
        Classification::Event(event, class)
    }

    pub fn last_seen(&self) -> Option<&FramedEvent> {
        self.last_seen.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class_of(c: &Classification) -> Option<&EventClass> {
        match c {
            Classification::Event(_, class) => Some(class),
            _ => None,
        }
    }

    #[test]
    fn framing_prefix_variants() {
        for line in ["data: x", "data:x", "DATA:   x", "  Data: x  ", "x"] {
            assert_eq!(FramedEvent::from_line(line).unwrap().as_str(), "x", "{line:?}");
        }
        assert!(FramedEvent::from_line("data:   ").is_none());
        assert!(FramedEvent::from_line("").is_none());
        // only a leading prefix is stripped
        assert_eq!(
            FramedEvent::from_line("data: data: x").unwrap().as_str(),
            "data: x"
        );
    }

    #[test]
    fn terminator_is_case_sensitive_exact_match() {
        let mut c = EventClassifier::new();
        assert_eq!(class_of(&c.classify("data: [DONE]")), Some(&EventClass::Terminator));
        assert_eq!(class_of(&c.classify("[DONE]")), Some(&EventClass::Terminator));
        assert_eq!(class_of(&c.classify("data: [done]")), Some(&EventClass::PlainText));
        assert_eq!(class_of(&c.classify("data: [DONE] now")), Some(&EventClass::PlainText));
    }

    #[test]
    fn structured_and_plain() {
        let mut c = EventClassifier::new();
        match c.classify(r#"data: {"choices":[{"delta":{"content":"hi"}}]}"#) {
            Classification::Event(_, EventClass::StructuredDelta(d)) => {
                assert_eq!(d.content.as_deref(), Some("hi"))
            }
            other => panic!("expected StructuredDelta, got {other:?}"),
        }
        match c.classify("hello world") {
            Classification::Event(ev, EventClass::PlainText) => assert_eq!(ev.as_str(), "hello world"),
            other => panic!("expected PlainText, got {other:?}"),
        }
    }

    #[test]
    fn consecutive_duplicate_is_dropped() {
        let mut c = EventClassifier::new();
        assert!(matches!(c.classify("data: a"), Classification::Event(..)));
        assert!(matches!(c.classify("data: a"), Classification::Duplicate(_)));
        // framing differences do not matter, the framed text does
        assert!(matches!(c.classify("a  "), Classification::Duplicate(_)));
    }

    #[test]
    fn duplicate_separated_by_other_event_is_accepted() {
        let mut c = EventClassifier::new();
        assert!(matches!(c.classify("a"), Classification::Event(..)));
        assert!(matches!(c.classify("b"), Classification::Event(..)));
        assert!(matches!(c.classify("a"), Classification::Event(..)));
    }

    #[test]
    fn empty_lines_do_not_reset_duplicate_state() {
        let mut c = EventClassifier::new();
        assert!(matches!(c.classify("a"), Classification::Event(..)));
        assert_eq!(c.classify(""), Classification::Empty);
        assert_eq!(c.classify("data:"), Classification::Empty);
        assert!(matches!(c.classify("a"), Classification::Duplicate(_)));
        assert_eq!(c.last_seen().map(FramedEvent::as_str), Some("a"));
    }
}
