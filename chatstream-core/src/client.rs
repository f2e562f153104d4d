use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::config::{Config, ModelOption};
use crate::conversation::Conversation;
use crate::error::{ChatError, ChatResult};
use crate::http_client::HttpTransport;
use crate::model::{ChatRequest, Message};
use crate::normalizer::{clean_text, normalize_request};
use crate::session::{CancelHandle, SessionState, StreamController};
use crate::stream::{ProgressEvent, StreamOutcome};
use crate::transport::Transport;

/// A single chat: its messages, selected model and streaming session.
pub struct ChatClient {
    config: Config,
    controller: StreamController,
    conversation: Conversation,
    selected_model: String,
    chat_id: Option<String>,
}

impl ChatClient {
    pub fn new(config: Config, transport: Arc<dyn Transport>) -> Self {
        let controller = StreamController::new(transport).with_empty_policy(config.stream.on_empty);
        Self {
            selected_model: config.models.default.clone(),
            config,
            controller,
            conversation: Conversation::new(),
            chat_id: None,
        }
    }

    /// Client talking HTTP to the configured endpoint.
    pub fn from_config(config: Config) -> ChatResult<Self> {
        config.validate()?;
        let transport = HttpTransport::from_config(&config)?;
        debug!(url = transport.url(), "http transport ready");
        Ok(Self::new(config, Arc::new(transport)))
    }

    pub fn with_conversation(mut self, conversation: Conversation) -> Self {
        self.conversation = conversation;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn available_models(&self) -> &[ModelOption] {
        &self.config.models.available
    }

    pub fn selected_model(&self) -> &str {
        &self.selected_model
    }

    pub fn chat_id(&self) -> Option<&str> {
        self.chat_id.as_deref()
    }

    pub fn select_model(&mut self, model: &str) -> ChatResult<()> {
        if !self.config.models.contains(model) {
            return Err(ChatError::Validation(format!("unknown model '{model}'")));
        }
        self.selected_model = model.to_string();
        Ok(())
    }

    /// Drop the conversation and start over under a fresh chat id.
    pub fn start_new_chat(&mut self) {
        self.controller.cancel();
        self.conversation.clear();
        self.chat_id = Some(Uuid::new_v4().to_string());
        info!(chat.id = self.chat_id.as_deref().unwrap_or_default(), "new chat started");
    }

    /// Send `text` and stream the reply.
    ///
    /// `on_progress` sees every fragment after it has been applied to the
    /// conversation. The conversation is resolved before this returns; failures
    /// are returned after their error message has been recorded.
    pub async fn send_message<F>(&mut self, text: &str, mut on_progress: F) -> ChatResult<StreamOutcome>
    where
        F: FnMut(&ProgressEvent),
    {
        let text = clean_text(text);
        if text.is_empty() {
            return Err(ChatError::Validation("message text is empty".into()));
        }

        let chat_id = self
            .chat_id
            .get_or_insert_with(|| Uuid::new_v4().to_string())
            .clone();
        let mut request = ChatRequest::user_turn(&self.selected_model, &text, chat_id);
        request.temperature = Some(self.config.request.temperature);
        request.max_tokens = Some(self.config.request.max_tokens);
        let request = normalize_request(request);

        let mut pending = PendingReply::begin(&mut self.conversation, &text);
        let result = self
            .controller
            .start(request, |event| {
                pending.apply(event);
                on_progress(event);
            })
            .await;
        pending.resolve(&result);
        result
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.controller.cancel_handle()
    }

    pub fn cancel(&self) -> bool {
        self.controller.cancel()
    }

    pub fn is_streaming(&self) -> bool {
        self.controller.is_streaming()
    }

    pub fn session_state(&self) -> SessionState {
        self.controller.state()
    }

    pub fn messages(&self) -> &[Message] {
        self.conversation.messages()
    }

    pub fn display_messages(&self) -> Vec<&Message> {
        self.conversation.display_messages()
    }
}

/// The temporary reply of one send. Dropped unresolved, it settles as cancelled.
struct PendingReply<'a> {
    conversation: &'a mut Conversation,
    resolved: bool,
}

impl<'a> PendingReply<'a> {
    fn begin(conversation: &'a mut Conversation, text: &str) -> Self {
        conversation.begin_send(text);
        Self {
            conversation,
            resolved: false,
        }
    }

    fn apply(&mut self, event: &ProgressEvent) {
        self.conversation.apply_progress(event);
    }

    fn resolve(mut self, result: &ChatResult<StreamOutcome>) {
        self.conversation.resolve(result);
        self.resolved = true;
    }
}

impl Drop for PendingReply<'_> {
    fn drop(&mut self) {
        if !self.resolved {
            debug!("send dropped before resolution, discarding temporary reply");
            self.conversation.resolve(&Ok(StreamOutcome::Cancelled));
        }
    }
}
