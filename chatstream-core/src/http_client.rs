use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::config::Config;
use crate::error::{ChatError, ChatResult};
use crate::model::ChatRequest;
use crate::transport::{Transport, TransportResponse};

/// reqwest-backed [`Transport`] that POSTs to an OpenAI-compatible
/// streaming chat endpoint.
#[derive(Clone)]
pub struct HttpTransport {
    inner: Client,
    url: String,
    api_key: Option<SecretString>,
    headers: Vec<(String, String)>,
    user_agent: String,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("url", &self.url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("headers", &self.headers)
            .finish()
    }
}

impl HttpTransport {
    pub fn from_config(cfg: &Config) -> ChatResult<Self> {
        let mut builder = Client::builder()
            .connect_timeout(Duration::from_millis(cfg.http.connect_timeout_ms))
            .timeout(Duration::from_millis(cfg.http.request_timeout_ms));
        if let Some(n) = cfg.http.pool_max_idle_per_host {
            builder = builder.pool_max_idle_per_host(n);
        }
        let inner = builder
            .build()
            .map_err(|e| ChatError::Other(anyhow::anyhow!("http client build failed: {e}")))?;
        Ok(Self {
            inner,
            url: cfg.stream_url(),
            api_key: cfg.api_key(),
            headers: cfg
                .api
                .headers
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            user_agent: format!("chatstream/{}", env!("CARGO_PKG_VERSION")),
        })
    }

    /// Override the API key resolved from the environment.
    pub fn with_api_key(mut self, key: Option<SecretString>) -> Self {
        self.api_key = key;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn name(&self) -> &str {
        "http"
    }

    async fn open(&self, request: &ChatRequest) -> ChatResult<TransportResponse> {
        let mut req = self
            .inner
            .post(&self.url)
            .json(request)
            .header("User-Agent", &self.user_agent)
            .header("Accept", "text/event-stream");

        for (k, v) in &self.headers {
            req = req.header(k.as_str(), v.as_str());
        }
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key.expose_secret());
        }

        let resp = req.send().await.map_err(map_send_error)?;

        let status = resp.status().as_u16();
        debug!(status, content_length = ?resp.content_length(), "stream response opened");
        let headers = resp
            .headers()
            .iter()
            .filter_map(|(k, v)| {
                v.to_str()
                    .ok()
                    .map(|v| (k.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();

        let body = if resp.content_length() == Some(0) {
            None
        } else {
            let stream = resp.bytes_stream().map(|chunk| chunk.map_err(map_body_error));
            Some(Box::pin(stream) as crate::transport::ByteStream)
        };

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}

fn map_send_error(e: reqwest::Error) -> ChatError {
    if e.is_timeout() {
        ChatError::Connection("request timed out".into())
    } else {
        ChatError::Connection(e.to_string())
    }
}

fn map_body_error(e: reqwest::Error) -> ChatError {
    if e.is_decode() {
        ChatError::MalformedResponse(e.to_string())
    } else if e.is_timeout() {
        ChatError::Connection("stream timed out".into())
    } else {
        ChatError::Connection(e.to_string())
    }
}
