use serde::Deserialize;

/// Typed fragments carried by one structured stream record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delta {
    pub content: Option<String>,
    pub reasoning_content: Option<String>,
}

impl Delta {
    pub fn is_empty(&self) -> bool {
        self.content.is_none() && self.reasoning_content.is_none()
    }
}

/// Outcome of parsing a framed event as a structured record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedRecord {
    Valid(Delta),
    /// Not JSON, or JSON without the expected `choices[0].delta` shape.
    Malformed,
}

// ---- Wire structs (minimal) ----
#[derive(Deserialize)]
struct WireChunk {
    choices: Vec<WireChoice>,
}

#[derive(Deserialize)]
struct WireChoice {
    #[serde(default)]
    delta: Option<WireDelta>,
}

#[derive(Deserialize)]
struct WireDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
}

pub fn parse_record(text: &str) -> ParsedRecord {
    let Ok(chunk) = serde_json::from_str::<WireChunk>(text) else {
        return ParsedRecord::Malformed;
    };
    let Some(delta) = chunk.choices.into_iter().next().and_then(|c| c.delta) else {
        return ParsedRecord::Malformed;
    };
    ParsedRecord::Valid(Delta {
        content: delta.content.filter(|s| !s.is_empty()),
        reasoning_content: delta.reasoning_content.filter(|s| !s.is_empty()),
    })
}
