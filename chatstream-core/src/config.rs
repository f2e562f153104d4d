use std::collections::BTreeMap;
use std::{fs, path::Path};

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ApiCfg {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Path of the streaming chat completions endpoint.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Name of the environment variable that contains the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: Option<String>,
    /// Extra headers sent with every request.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl Default for ApiCfg {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            endpoint: default_endpoint(),
            api_key_env: default_api_key_env(),
            headers: BTreeMap::new(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:3000".into()
}
fn default_endpoint() -> String {
    "/v1/chat/completions".into()
}
fn default_api_key_env() -> Option<String> {
    Some("CHATSTREAM_API_KEY".into())
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct HttpCfg {
    /// TCP connect timeout in milliseconds (default 5000ms)
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Total request timeout in milliseconds (default 30000ms), streaming included
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Optional per-host idle connection pool cap (None = reqwest default)
    #[serde(default)]
    pub pool_max_idle_per_host: Option<usize>,
}

impl Default for HttpCfg {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            pool_max_idle_per_host: None,
        }
    }
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}
fn default_request_timeout_ms() -> u64 {
    30_000
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ModelOption {
    pub value: String,
    pub label: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ModelsCfg {
    #[serde(default = "default_model")]
    pub default: String,
    #[serde(default = "default_available_models")]
    pub available: Vec<ModelOption>,
}

impl Default for ModelsCfg {
    fn default() -> Self {
        Self {
            default: default_model(),
            available: default_available_models(),
        }
    }
}

impl ModelsCfg {
    pub fn contains(&self, model: &str) -> bool {
        self.available.iter().any(|m| m.value == model)
    }
}

fn default_model() -> String {
    "gpt-3.5-turbo".into()
}
fn default_available_models() -> Vec<ModelOption> {
    vec![
        ModelOption {
            value: "gpt-3.5-turbo".into(),
            label: "GPT-3.5 Turbo".into(),
        },
        ModelOption {
            value: "gpt-4".into(),
            label: "GPT-4".into(),
        },
    ]
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RequestCfg {
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for RequestCfg {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    2_000
}

/// What to do when the stream closes before any content was accepted.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmptyStreamPolicy {
    /// Complete normally with an empty response.
    #[default]
    Complete,
    /// Fail with `MalformedResponse`.
    Fail,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct StreamCfg {
    #[serde(default)]
    pub on_empty: EmptyStreamPolicy,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiCfg,
    /// HTTP client configuration (timeouts, pooling). Missing → defaults.
    #[serde(default)]
    pub http: HttpCfg,
    #[serde(default)]
    pub models: ModelsCfg,
    #[serde(default)]
    pub request: RequestCfg,
    #[serde(default)]
    pub stream: StreamCfg,
}

impl Config {
    /// Load a Config from a file path (JSON or TOML by extension). If the
    /// extension is missing or unrecognized, try JSON first, then TOML.
    pub fn from_path<P: AsRef<Path>>(path: P) -> crate::error::ChatResult<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(crate::error::ChatError::from)?;
        let s =
            std::str::from_utf8(&bytes).map_err(|e| crate::error::ChatError::Other(e.into()))?;
        let cfg: Self = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str::<Self>(s)
                .map_err(|e| crate::error::ChatError::Other(e.into()))?,
            Some("toml") => toml::from_str::<Self>(s)
                .map_err(|e| crate::error::ChatError::Other(e.into()))?,
            _ => serde_json::from_str::<Self>(s)
                .map_err(|e| crate::error::ChatError::Other(e.into()))
                .or_else(|_| {
                    toml::from_str::<Self>(s)
                        .map_err(|e| crate::error::ChatError::Other(e.into()))
                })?,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject configurations that cannot produce a working client.
    pub fn validate(&self) -> crate::error::ChatResult<()> {
        if !self.models.contains(&self.models.default) {
            return Err(crate::error::ChatError::Validation(format!(
                "default model '{}' is not in the available models",
                self.models.default
            )));
        }
        if !self.api.endpoint.starts_with('/') {
            return Err(crate::error::ChatError::Validation(format!(
                "endpoint '{}' must start with '/'",
                self.api.endpoint
            )));
        }
        Ok(())
    }

    /// Full URL of the streaming endpoint.
    pub fn stream_url(&self) -> String {
        format!("{}{}", self.api.base_url.trim_end_matches('/'), self.api.endpoint)
    }

    /// API key from the configured environment variable, if set and non-empty.
    pub fn api_key(&self) -> Option<SecretString> {
        self.api_key_from(|var| std::env::var(var).ok())
    }

    /// Resolve the API key through `lookup`, given the variable name.
    pub fn api_key_from<F>(&self, lookup: F) -> Option<SecretString>
    where
        F: FnOnce(&str) -> Option<String>,
    {
        let var = self.api.api_key_env.as_deref()?;
        lookup(var)
            .filter(|v| !v.is_empty())
            .map(SecretString::from)
    }
}
