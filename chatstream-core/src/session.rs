//! Stream session controller.
//!
//! Owns at most one in-flight stream. Starting a new session cancels the
//! previous one; every session ends in exactly one of Completed, Cancelled or
//! Failed, and its slot is released exactly once on every exit path.

use std::sync::Arc;
use std::time::Instant;

use futures_util::StreamExt;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, field, info_span, warn, Span};
use tracing_futures::Instrument;

use crate::config::EmptyStreamPolicy;
use crate::error::{ChatError, ChatResult};
use crate::model::ChatRequest;
use crate::stream::{
    Classification, DeltaAggregator, EventClass, EventClassifier, LineDecoder, ProgressEvent,
    Step, StreamOutcome,
};
use crate::telemetry::{self, SessionLog, SessionOutcome, StreamCounters};
use crate::transport::{ByteStream, Transport};

/// Error bodies are read up to this many bytes.
const MAX_ERROR_BODY_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    /// Request issued, nothing received yet.
    Sending,
    /// At least one chunk received.
    Streaming,
    Completed,
    Cancelled,
    Failed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

impl From<SessionOutcome> for SessionState {
    fn from(o: SessionOutcome) -> Self {
        match o {
            SessionOutcome::Completed => Self::Completed,
            SessionOutcome::Cancelled => Self::Cancelled,
            SessionOutcome::Failed => Self::Failed,
        }
    }
}

struct ActiveSession {
    id: u64,
    chat_id: String,
    token: CancellationToken,
}

#[derive(Default)]
struct Slot {
    next_id: u64,
    active: Option<ActiveSession>,
    state: SessionState,
}

/// Cloneable handle that cancels whatever session is active on its controller.
#[derive(Clone)]
pub struct CancelHandle {
    slot: Arc<Mutex<Slot>>,
}

impl CancelHandle {
    /// Request cancellation of the active stream. Returns `false` when idle.
    pub fn cancel(&self) -> bool {
        let slot = self.slot.lock();
        match &slot.active {
            Some(active) => {
                debug!(chat.id = %active.chat_id, "cancellation requested");
                active.token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.slot.lock().active.is_some()
    }
}

impl std::fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelHandle")
            .field("active", &self.is_active())
            .finish()
    }
}

pub struct StreamController {
    transport: Arc<dyn Transport>,
    slot: Arc<Mutex<Slot>>,
    on_empty: EmptyStreamPolicy,
}

impl StreamController {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            slot: Arc::new(Mutex::new(Slot::default())),
            on_empty: EmptyStreamPolicy::default(),
        }
    }

    pub fn with_empty_policy(mut self, policy: EmptyStreamPolicy) -> Self {
        self.on_empty = policy;
        self
    }

    /// State of the most recent session.
    pub fn state(&self) -> SessionState {
        self.slot.lock().state
    }

    pub fn is_streaming(&self) -> bool {
        self.slot.lock().active.is_some()
    }

    pub fn active_chat_id(&self) -> Option<String> {
        self.slot.lock().active.as_ref().map(|a| a.chat_id.clone())
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            slot: self.slot.clone(),
        }
    }

    /// Cancel the active session, if any.
    pub fn cancel(&self) -> bool {
        self.cancel_handle().cancel()
    }

    /// Run one stream session to its end.
    ///
    /// `on_progress` is called synchronously for every fragment, before the next
    /// chunk is read, and never after cancellation has been observed.
    /// Cancellation is reported as `Ok(StreamOutcome::Cancelled)`.
    pub async fn start<F>(&self, request: ChatRequest, mut on_progress: F) -> ChatResult<StreamOutcome>
    where
        F: FnMut(&ProgressEvent),
    {
        let span = info_span!(
            "stream_session",
            chat.id = %request.chat_id,
            llm.model = %request.model,
            outcome = field::Empty,
            chunks = field::Empty,
            lines = field::Empty,
            duplicates = field::Empty,
        );
        let (token, mut guard) = self.begin(&request, span.clone());

        let result = self
            .drive(&request, &token, &mut guard, &mut on_progress)
            .instrument(span)
            .await;

        match &result {
            Ok(StreamOutcome::Completed(text)) => {
                guard.release(SessionOutcome::Completed, None, Some(text.len()))
            }
            Ok(StreamOutcome::Cancelled) => guard.release(SessionOutcome::Cancelled, None, None),
            Err(e) => guard.release(SessionOutcome::Failed, Some(e), None),
        }
        result
    }

    fn begin(&self, request: &ChatRequest, span: Span) -> (CancellationToken, SessionGuard) {
        let mut slot = self.slot.lock();
        if let Some(prev) = slot.active.take() {
            debug!(chat.id = %prev.chat_id, "preempting active stream session");
            prev.token.cancel();
        }
        slot.next_id += 1;
        let id = slot.next_id;
        let token = CancellationToken::new();
        slot.active = Some(ActiveSession {
            id,
            chat_id: request.chat_id.clone(),
            token: token.clone(),
        });
        slot.state = SessionState::Sending;

        let guard = SessionGuard {
            slot: self.slot.clone(),
            id,
            log: SessionLog::new()
                .chat_id(&request.chat_id)
                .model(&request.model)
                .transport(self.transport.name()),
            started: Instant::now(),
            counters: StreamCounters::default(),
            span,
            released: false,
        };
        (token, guard)
    }

    async fn drive<F>(
        &self,
        request: &ChatRequest,
        token: &CancellationToken,
        guard: &mut SessionGuard,
        on_progress: &mut F,
    ) -> ChatResult<StreamOutcome>
    where
        F: FnMut(&ProgressEvent),
    {
        let opened = tokio::select! {
            biased;
            _ = token.cancelled() => return Ok(StreamOutcome::Cancelled),
            opened = self.transport.open(request) => opened?,
        };

        if !opened.is_success() {
            let retry_after = opened.retry_after();
            let body = match opened.body {
                Some(body) => tokio::select! {
                    biased;
                    _ = token.cancelled() => return Ok(StreamOutcome::Cancelled),
                    text = read_error_body(body) => text,
                },
                None => String::new(),
            };
            return Err(ChatError::from_raw_status(opened.status, retry_after, &body));
        }
        let Some(mut body) = opened.body else {
            return Err(ChatError::NoBody);
        };

        let mut decoder = LineDecoder::new();
        let mut pipeline = EventPipeline::default();
        let mut terminated = false;

        'read: loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => return Ok(StreamOutcome::Cancelled),
                next = body.next() => next,
            };
            let lines = match next {
                Some(Ok(chunk)) => {
                    guard.mark_streaming();
                    guard.counters.chunks += 1;
                    decoder.feed(&chunk)
                }
                Some(Err(e)) => return Err(e),
                None => break 'read,
            };
            for line in lines {
                if token.is_cancelled() {
                    return Ok(StreamOutcome::Cancelled);
                }
                if pipeline.process(&line, &mut guard.counters, on_progress) {
                    terminated = true;
                    break 'read;
                }
            }
        }
        // Release the transport before handing off.
        drop(body);

        if !terminated && let Some(rest) = decoder.finish() {
            if token.is_cancelled() {
                return Ok(StreamOutcome::Cancelled);
            }
            terminated = pipeline.process(&rest, &mut guard.counters, on_progress);
        }

        if !terminated {
            debug!("stream closed without terminator");
            if guard.counters.progress_events == 0 && self.on_empty == EmptyStreamPolicy::Fail {
                return Err(ChatError::MalformedResponse(
                    "stream closed before any content".into(),
                ));
            }
        }
        Ok(StreamOutcome::Completed(pipeline.aggregator.into_response()))
    }
}

/// Classifier and aggregator state for one session.
#[derive(Default)]
struct EventPipeline {
    classifier: EventClassifier,
    aggregator: DeltaAggregator,
}

impl EventPipeline {
    /// Process one logical line. Returns `true` once the terminator is seen.
    fn process<F>(&mut self, line: &str, counters: &mut StreamCounters, on_progress: &mut F) -> bool
    where
        F: FnMut(&ProgressEvent),
    {
        counters.lines += 1;
        match self.classifier.classify(line) {
            Classification::Empty => false,
            Classification::Duplicate(event) => {
                counters.duplicates += 1;
                debug!(event = event.as_str(), "skipping duplicate stream event");
                false
            }
            Classification::Event(event, class) => {
                if class == EventClass::PlainText {
                    counters.demoted += 1;
                    debug!(event = event.as_str(), "non-structured event treated as text");
                }
                match self.aggregator.apply(&event, class) {
                    Step::Progress(progress) => {
                        counters.progress_events += 1;
                        on_progress(&progress);
                        false
                    }
                    Step::Idle => false,
                    Step::Terminate => true,
                }
            }
        }
    }
}

/// Releases a session's slot exactly once, on completion or when dropped.
struct SessionGuard {
    slot: Arc<Mutex<Slot>>,
    id: u64,
    log: SessionLog,
    started: Instant,
    counters: StreamCounters,
    span: Span,
    released: bool,
}

impl SessionGuard {
    fn mark_streaming(&self) {
        let mut slot = self.slot.lock();
        if slot.active.as_ref().is_some_and(|a| a.id == self.id)
            && slot.state == SessionState::Sending
        {
            slot.state = SessionState::Streaming;
        }
    }

    fn release(&mut self, outcome: SessionOutcome, error: Option<&ChatError>, content_len: Option<usize>) {
        if self.released {
            return;
        }
        self.released = true;

        {
            let mut slot = self.slot.lock();
            // A preempted session must not clobber its successor.
            if slot.active.as_ref().is_some_and(|a| a.id == self.id) {
                slot.active = None;
                slot.state = outcome.into();
            }
        }

        self.span.record("outcome", outcome.as_str());
        self.span.record("chunks", self.counters.chunks);
        self.span.record("lines", self.counters.lines);
        self.span.record("duplicates", self.counters.duplicates);

        let mut log = std::mem::take(&mut self.log)
            .outcome(outcome)
            .counters(self.counters)
            .content_len_opt(content_len)
            .latency_ms(self.started.elapsed().as_millis() as u64);
        if let Some(e) = error {
            warn!(parent: &self.span, error.kind = e.kind(), "stream session failed: {e}");
            log = log.error(e.kind(), &e.to_string());
        }
        telemetry::emit_session(log);
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        // Reached without `release` only when the session future was dropped.
        self.release(SessionOutcome::Cancelled, None, None);
    }
}

async fn read_error_body(mut body: ByteStream) -> String {
    let mut buf = Vec::new();
    while let Some(Ok(chunk)) = body.next().await {
        buf.extend_from_slice(&chunk);
        if buf.len() >= MAX_ERROR_BODY_BYTES {
            break;
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}
