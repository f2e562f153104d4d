use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::Stream;

use crate::error::ChatResult;
use crate::model::ChatRequest;

/// A boxed stream of raw body chunks. Chunk boundaries carry no meaning.
pub type ByteStream = Pin<Box<dyn Stream<Item = ChatResult<Bytes>> + Send>>;

/// What the transport hands back once a request is open.
pub struct TransportResponse {
    pub status: u16,
    /// Lower-cased header names.
    pub headers: Vec<(String, String)>,
    pub body: Option<ByteStream>,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Numeric `Retry-After` seconds, if present.
    pub fn retry_after(&self) -> Option<u64> {
        self.header("retry-after")
            .and_then(|v| v.trim().parse::<u64>().ok())
    }
}

impl std::fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("body", &self.body.as_ref().map(|_| "<stream>"))
            .finish()
    }
}

/// Opaque duplex channel to the chat backend.
///
/// Cancellation is dropping: dropping the `open` future or the returned body
/// stream must abort the underlying request.
#[async_trait]
pub trait Transport: Send + Sync {
    fn name(&self) -> &str;
    async fn open(&self, request: &ChatRequest) -> ChatResult<TransportResponse>;
}
