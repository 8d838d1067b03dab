//! Configuration loaded from the environment.
//!
//! - `OPENAI_API_KEY` - Required unless Azure is configured.
//! - `OPENAI_BASE_URL` - Optional. Defaults to `https://api.openai.com/v1`.
//! - `OPENAI_MODEL` - Optional. Defaults to `gpt-4o-mini`.
//! - `AZURE_OPENAI_ENDPOINT` + `AZURE_OPENAI_API_KEY` - Optional. Select Azure OpenAI.
//! - `AZURE_OPENAI_API_VERSION` - Optional. Defaults to `2024-02-15-preview`.
//! - `AZURE_OPENAI_DEPLOYMENT` - Optional. Defaults to the model name.
//! - `ACTIONFLOW_FUNCTION_CALL_LIMIT` - Optional. Defaults to `10`.
//! - `ACTIONFLOW_DB_PATH` - Optional. Defaults to `outputs/actionflow.db`.
//! - `ACTIONFLOW_REQUEST_TIMEOUT_SECS` - Optional. Defaults to `60`.

use crate::budget::DEFAULT_FUNCTION_CALL_LIMIT;
use crate::error::LlmError;
use crate::llm::{DEFAULT_AZURE_API_VERSION, Endpoint, OpenAiChat};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_DB_PATH: &str = "outputs/actionflow.db";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub endpoint: Endpoint,
    pub model: String,
    pub function_call_limit: usize,
    pub db_path: PathBuf,
    pub request_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok().filter(|v| !v.trim().is_empty()))
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let model = get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let endpoint = match (get("AZURE_OPENAI_ENDPOINT"), get("AZURE_OPENAI_API_KEY")) {
            (Some(endpoint), Some(api_key)) => Endpoint::Azure {
                endpoint,
                api_key,
                api_version: get("AZURE_OPENAI_API_VERSION").unwrap_or_else(|| DEFAULT_AZURE_API_VERSION.to_string()),
                deployment: get("AZURE_OPENAI_DEPLOYMENT").unwrap_or_else(|| model.clone()),
            },
            (Some(_), None) => return Err(ConfigError::MissingEnvVar("AZURE_OPENAI_API_KEY".to_string())),
            _ => Endpoint::OpenAi {
                base_url: get("OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
                api_key: get("OPENAI_API_KEY")
                    .ok_or_else(|| ConfigError::MissingEnvVar("OPENAI_API_KEY".to_string()))?,
            },
        };

        let function_call_limit = parse_or(&get, "ACTIONFLOW_FUNCTION_CALL_LIMIT", DEFAULT_FUNCTION_CALL_LIMIT)?;
        let timeout_secs = parse_or(&get, "ACTIONFLOW_REQUEST_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?;
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "ACTIONFLOW_REQUEST_TIMEOUT_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            endpoint,
            model,
            function_call_limit,
            db_path: get("ACTIONFLOW_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH)),
            request_timeout: Duration::from_secs(timeout_secs),
        })
    }

    pub fn build_backend(&self) -> Result<OpenAiChat, LlmError> {
        OpenAiChat::with_timeout(self.endpoint.clone(), self.model.clone(), self.request_timeout)
    }
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get(key)
        .map(|v| {
            v.trim()
                .parse::<T>()
                .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string()))
        })
        .transpose()
        .map(|v| v.unwrap_or(default))
}
