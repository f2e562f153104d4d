use http::StatusCode;
use thiserror::Error;

/// Core error type for chatstream.
/// Internally, modules can use `anyhow::Result<T>` for convenience,
/// but public boundaries should expose `ChatResult<T>` with this error.
///
/// The `Display` text of each variant is the human-readable message shown to
/// the user when a send fails.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("unable to reach the chat server, check the network connection")]
    NotFound,

    #[error("authentication failed, check that the API key is correct")]
    Unauthorized,

    #[error("too many requests, please try again later")]
    RateLimited { retry_after: Option<u64> },

    #[error("request failed: {status}\n{body}")]
    ServerError { status: u16, body: String },

    #[error("the response contained no data stream")]
    NoBody,

    #[error("malformed response data: {0}")]
    MalformedResponse(String),

    #[error("unable to connect to the server: {0}")]
    Connection(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type ChatResult<T> = std::result::Result<T, ChatError>;

const MAX_ERROR_BODY: usize = 300;

impl ChatError {
    /// Map a non-success transport status to the error taxonomy.
    pub fn from_status(status: StatusCode, retry_after: Option<u64>, body: &str) -> Self {
        match status {
            StatusCode::NOT_FOUND => ChatError::NotFound,
            StatusCode::UNAUTHORIZED => ChatError::Unauthorized,
            StatusCode::TOO_MANY_REQUESTS => ChatError::RateLimited { retry_after },
            s => ChatError::ServerError {
                status: s.as_u16(),
                body: truncate(body, MAX_ERROR_BODY),
            },
        }
    }

    /// Like [`ChatError::from_status`], for a raw status code. Codes outside the
    /// HTTP range are reported as `ServerError` with the code unchanged.
    pub fn from_raw_status(status: u16, retry_after: Option<u64>, body: &str) -> Self {
        match StatusCode::from_u16(status) {
            Ok(s) => Self::from_status(s, retry_after, body),
            Err(_) => ChatError::ServerError {
                status,
                body: truncate(body, MAX_ERROR_BODY),
            },
        }
    }

    /// Stable short name used in logs and telemetry.
    pub fn kind(&self) -> &'static str {
        match self {
            ChatError::NotFound => "not_found",
            ChatError::Unauthorized => "unauthorized",
            ChatError::RateLimited { .. } => "rate_limited",
            ChatError::ServerError { .. } => "server_error",
            ChatError::NoBody => "no_body",
            ChatError::MalformedResponse(_) => "malformed_response",
            ChatError::Connection(_) => "connection",
            ChatError::Validation(_) => "validation",
            ChatError::Io(_) => "io",
            ChatError::Other(_) => "other",
        }
    }
}

/// Keep the first `max` characters, marking the cut with `...`.
fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((end, _)) => format!("{}...", &s[..end]),
        None => s.to_string(),
    }
}
