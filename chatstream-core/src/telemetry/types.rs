use serde::Serialize;

/// Terminal state of a stream session as reported to telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionOutcome {
    Completed,
    Cancelled,
    Failed,
}

impl SessionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }
}

/// Counters accumulated while a session reads its stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StreamCounters {
    pub chunks: u64,
    pub lines: u64,
    pub duplicates: u64,
    pub demoted: u64,
    pub progress_events: u64,
}

/// Structured record emitted once per finished stream session.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionLog {
    pub chat_id: Option<String>,
    pub model: Option<String>,
    pub transport: Option<String>,
    pub outcome: Option<SessionOutcome>,
    pub error_kind: Option<String>,
    pub error_message: Option<String>,
    pub counters: StreamCounters,
    pub content_len: Option<usize>,
    pub latency_ms: Option<u64>,
}

impl SessionLog {
    pub fn new() -> Self { Self::default() }
    pub fn chat_id(mut self, v: &str) -> Self { self.chat_id = Some(v.to_string()); self }
    pub fn model(mut self, v: &str) -> Self { self.model = Some(v.to_string()); self }
    pub fn transport(mut self, v: &str) -> Self { self.transport = Some(v.to_string()); self }
    pub fn outcome(mut self, v: SessionOutcome) -> Self { self.outcome = Some(v); self }
    pub fn error(mut self, kind: &str, message: &str) -> Self {
        self.error_kind = Some(kind.to_string());
        self.error_message = Some(message.to_string());
        self
    }
    pub fn counters(mut self, v: StreamCounters) -> Self { self.counters = v; self }
    pub fn content_len_opt(mut self, v: Option<usize>) -> Self { self.content_len = v; self }
    pub fn latency_ms(mut self, v: u64) -> Self { self.latency_ms = Some(v); self }
}
