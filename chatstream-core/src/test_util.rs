//! In-memory transport for exercising sessions without a network.

use std::collections::VecDeque;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{future, stream};
use futures_util::StreamExt;
use parking_lot::Mutex;

use crate::error::{ChatError, ChatResult};
use crate::model::ChatRequest;
use crate::transport::{ByteStream, Transport, TransportResponse};

/// One canned answer to `open`.
pub enum ScriptedResponse {
    Open {
        status: u16,
        headers: Vec<(String, String)>,
        body: Option<Vec<ChatResult<Bytes>>>,
        /// Keep the body open after the scripted chunks.
        hang: bool,
    },
    OpenError(ChatError),
    /// `open` never completes.
    HangOnOpen,
}

impl ScriptedResponse {
    pub fn ok(chunks: &[&str]) -> Self {
        Self::Open {
            status: 200,
            headers: Vec::new(),
            body: Some(chunks.iter().map(|c| Ok(Bytes::copy_from_slice(c.as_bytes()))).collect()),
            hang: false,
        }
    }

    pub fn ok_then_hang(chunks: &[&str]) -> Self {
        Self::ok(chunks).hanging()
    }

    pub fn hang_on_open() -> Self {
        Self::HangOnOpen
    }

    /// Keep the body open after its scripted chunks.
    pub fn hanging(mut self) -> Self {
        if let Self::Open { hang, .. } = &mut self {
            *hang = true;
        }
        self
    }

    pub fn status(status: u16, body: &str) -> Self {
        Self::Open {
            status,
            headers: Vec::new(),
            body: Some(vec![Ok(Bytes::copy_from_slice(body.as_bytes()))]),
            hang: false,
        }
    }

    pub fn no_body() -> Self {
        Self::Open { status: 200, headers: Vec::new(), body: None, hang: false }
    }

    pub fn open_error(err: ChatError) -> Self {
        Self::OpenError(err)
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let Self::Open { headers, .. } = &mut self {
            headers.push((name.to_ascii_lowercase(), value.to_string()));
        }
        self
    }

    /// Fail the body stream after the scripted chunks.
    pub fn then_error(mut self, err: ChatError) -> Self {
        if let Self::Open { body: Some(chunks), .. } = &mut self {
            chunks.push(Err(err));
        }
        self
    }
}

/// Pops one [`ScriptedResponse`] per `open` and records every request.
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<ScriptedResponse>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedTransport {
    pub fn new(responses: Vec<ScriptedResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn open(&self, request: &ChatRequest) -> ChatResult<TransportResponse> {
        self.requests.lock().push(request.clone());
        let next = self.responses.lock().pop_front();
        match next {
            Some(ScriptedResponse::Open { status, headers, body, hang }) => {
                let body = body.map(|chunks| {
                    let items = stream::iter(chunks);
                    if hang {
                        items.chain(stream::pending()).boxed() as ByteStream
                    } else {
                        items.boxed() as ByteStream
                    }
                });
                Ok(TransportResponse { status, headers, body })
            }
            Some(ScriptedResponse::OpenError(e)) => Err(e),
            Some(ScriptedResponse::HangOnOpen) => future::pending().await,
            None => Err(ChatError::Connection("no scripted response left".into())),
        }
    }
}
