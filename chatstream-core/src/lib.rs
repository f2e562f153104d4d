pub mod client;
pub mod config;
pub mod conversation;
pub mod error;
pub mod http_client;
pub mod model;
pub mod normalizer;
pub mod session;
pub mod stream;
pub mod telemetry;
pub mod transport;
#[cfg(test)]
pub mod test_util;

pub use client::ChatClient;
pub use error::{ChatError, ChatResult};
pub use session::{CancelHandle, SessionState, StreamController};
pub use stream::{ProgressEvent, StreamOutcome};
