// ABOUTME: Environment-based server configuration with localhost defaults for local runtimes
// ABOUTME: Resolves HTTP port, backend base URLs, API keys, and discovery timeouts
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Environment-based configuration management
//!
//! All configuration is read from environment variables with sensible defaults
//! for development. Local runtime base URLs default to the well-known ports
//! each runtime binds to (LM Studio 1234, Ollama 11434).

use std::env;
use std::time::Duration;

use tracing::warn;

use crate::errors::AppResult;

/// Environment variable for the HTTP listen port
pub const HTTP_PORT_ENV: &str = "TIDECHAT_HTTP_PORT";

/// Environment variable for the LM Studio base URL
pub const LMSTUDIO_BASE_URL_ENV: &str = "LMSTUDIO_BASE_URL";

/// Environment variable for the Ollama base URL
pub const OLLAMA_BASE_URL_ENV: &str = "OLLAMA_BASE_URL";

/// Environment variable for the OpenAI API key
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Environment variable for the model discovery timeout (seconds)
pub const DISCOVERY_TIMEOUT_ENV: &str = "TIDECHAT_DISCOVERY_TIMEOUT_SECS";

const DEFAULT_HTTP_PORT: u16 = 8090;
const DEFAULT_LMSTUDIO_BASE_URL: &str = "http://localhost:1234";
const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434";
const DEFAULT_DISCOVERY_TIMEOUT_SECS: u64 = 3;

/// Server configuration resolved from the environment
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP listen port
    pub http_port: u16,
    /// LM Studio base URL (OpenAI-compatible local runtime)
    pub lmstudio_base_url: String,
    /// Ollama base URL
    pub ollama_base_url: String,
    /// OpenAI API key, if configured
    pub openai_api_key: Option<String>,
    /// Bounded wait applied to model discovery calls against local runtimes
    pub discovery_timeout: Duration,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// Unset variables fall back to development defaults. Malformed numeric
    /// values are logged and replaced with defaults rather than failing
    /// startup.
    ///
    /// # Errors
    ///
    /// Currently infallible; returns `AppResult` so future validation can
    /// fail startup without changing callers.
    pub fn from_env() -> AppResult<Self> {
        let http_port = env::var(HTTP_PORT_ENV)
            .ok()
            .and_then(|v| match v.parse::<u16>() {
                Ok(port) => Some(port),
                Err(_) => {
                    warn!("Invalid {HTTP_PORT_ENV}={v}, using default {DEFAULT_HTTP_PORT}");
                    None
                }
            })
            .unwrap_or(DEFAULT_HTTP_PORT);

        let discovery_timeout_secs = env::var(DISCOVERY_TIMEOUT_ENV)
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_DISCOVERY_TIMEOUT_SECS);

        Ok(Self {
            http_port,
            lmstudio_base_url: env::var(LMSTUDIO_BASE_URL_ENV)
                .unwrap_or_else(|_| DEFAULT_LMSTUDIO_BASE_URL.to_owned()),
            ollama_base_url: env::var(OLLAMA_BASE_URL_ENV)
                .unwrap_or_else(|_| DEFAULT_OLLAMA_BASE_URL.to_owned()),
            openai_api_key: env::var(OPENAI_API_KEY_ENV).ok().filter(|k| !k.is_empty()),
            discovery_timeout: Duration::from_secs(discovery_timeout_secs),
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: DEFAULT_HTTP_PORT,
            lmstudio_base_url: DEFAULT_LMSTUDIO_BASE_URL.to_owned(),
            ollama_base_url: DEFAULT_OLLAMA_BASE_URL.to_owned(),
            openai_api_key: None,
            discovery_timeout: Duration::from_secs(DEFAULT_DISCOVERY_TIMEOUT_SECS),
        }
    }
}
