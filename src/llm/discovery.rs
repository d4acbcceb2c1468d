// ABOUTME: Model discovery adapters querying local runtimes for their loaded models
// ABOUTME: Normalizes LM Studio and Ollama model listings behind a tagged union
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Model Discovery
//!
//! Per-provider reads against a local runtime's HTTP API, returning the
//! currently available models. Calls apply a bounded timeout and degrade to
//! an empty list when the runtime is unreachable; callers treat empty as
//! "no models available, prompt the user to start the runtime".
//!
//! Provider-specific metadata is preserved behind [`DiscoveredModel`]
//! variants; callers that only need the common fields use the normalized
//! [`ModelInfo`] projection.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ServerConfig;
use crate::errors::{AppError, AppResult};
use crate::providers::ids;

// ============================================================================
// Wire Types
// ============================================================================

/// One entry from LM Studio's OpenAI-compatible `GET /v1/models`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LmStudioModel {
    /// Path-like model identifier, e.g. `lmstudio-community/gemma-2-9b-it-GGUF`
    pub id: String,
    /// Owning organization as reported by the runtime
    #[serde(default)]
    pub owned_by: Option<String>,
    /// Object type marker (`model`)
    #[serde(default)]
    pub object: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LmStudioModelList {
    #[serde(default)]
    data: Vec<LmStudioModel>,
}

/// One entry from Ollama's `GET /api/tags`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaModel {
    /// `name:tag` identifier, e.g. `llama3:8b`
    pub name: String,
    /// Model blob size in bytes
    #[serde(default)]
    pub size: Option<u64>,
    /// Content digest
    #[serde(default)]
    pub digest: Option<String>,
    /// Last modification timestamp
    #[serde(default)]
    pub modified_at: Option<String>,
    /// Runtime-specific detail object (family, quantization, ...)
    #[serde(default)]
    pub details: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct OllamaTagList {
    #[serde(default)]
    models: Vec<OllamaModel>,
}

// ============================================================================
// Normalized Projection
// ============================================================================

/// A model as discovered from one provider, full wire fields preserved
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "provider", rename_all = "kebab-case")]
pub enum DiscoveredModel {
    /// From LM Studio's OpenAI-compatible listing
    LmStudio(LmStudioModel),
    /// From Ollama's tag listing
    Ollama(OllamaModel),
}

/// Common projection exposed to API consumers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    /// Identifier to pass back in completion requests
    pub id: String,
    /// Short display name
    pub name: String,
    /// Full provider-side identifier
    pub full_id: String,
    /// Owning organization, if reported
    pub owned_by: String,
    /// Ollama tag (`latest` when absent); `None` for other providers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

impl DiscoveredModel {
    /// Normalize into the common projection
    ///
    /// LM Studio ids are path-like; the display name is the segment after the
    /// last `/`. Ollama names are `name:tag`; a missing tag defaults to
    /// `latest`.
    #[must_use]
    pub fn info(&self) -> ModelInfo {
        match self {
            Self::LmStudio(model) => {
                let name = model
                    .id
                    .rsplit('/')
                    .next()
                    .unwrap_or(model.id.as_str())
                    .to_owned();
                ModelInfo {
                    id: model.id.clone(),
                    name,
                    full_id: model.id.clone(),
                    owned_by: model
                        .owned_by
                        .clone()
                        .unwrap_or_else(|| "organization_owner".to_owned()),
                    tag: None,
                }
            }
            Self::Ollama(model) => {
                let (name, tag) = match model.name.split_once(':') {
                    Some((name, tag)) => (name.to_owned(), tag.to_owned()),
                    None => (model.name.clone(), "latest".to_owned()),
                };
                ModelInfo {
                    id: model.name.clone(),
                    name,
                    full_id: model.name.clone(),
                    owned_by: "ollama".to_owned(),
                    tag: Some(tag),
                }
            }
        }
    }
}

// ============================================================================
// Discovery Client
// ============================================================================

/// Model discovery against the configured local runtimes
pub struct ModelDiscovery {
    client: Client,
    lmstudio_base_url: String,
    ollama_base_url: String,
}

impl ModelDiscovery {
    /// Create a discovery client from server configuration
    ///
    /// The bounded discovery timeout is baked into the HTTP client so a
    /// stopped runtime cannot hang a request.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: &ServerConfig) -> AppResult<Self> {
        let client = Client::builder()
            .connect_timeout(config.discovery_timeout)
            .timeout(config.discovery_timeout)
            .build()
            .map_err(|e| AppError::internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            lmstudio_base_url: config.lmstudio_base_url.clone(),
            ollama_base_url: config.ollama_base_url.clone(),
        })
    }

    /// List available models for a provider
    ///
    /// Unknown providers and providers without a discovery API yield an
    /// empty list, as does any failure talking to the runtime.
    pub async fn list_models(&self, provider_id: &str) -> Vec<DiscoveredModel> {
        match provider_id {
            ids::LOCAL_LLM => self.lmstudio_models().await,
            ids::OLLAMA => self.ollama_models().await,
            _ => Vec::new(),
        }
    }

    async fn lmstudio_models(&self) -> Vec<DiscoveredModel> {
        let url = format!(
            "{}/v1/models",
            self.lmstudio_base_url.trim_end_matches('/')
        );

        let result = async {
            let response = self
                .client
                .get(&url)
                .header("Authorization", "Bearer lm-studio")
                .send()
                .await?
                .error_for_status()?;
            response.json::<LmStudioModelList>().await
        }
        .await;

        match result {
            Ok(list) => {
                debug!("LM Studio reported {} models", list.data.len());
                list.data.into_iter().map(DiscoveredModel::LmStudio).collect()
            }
            Err(e) => {
                warn!("LM Studio model discovery failed: {e}");
                Vec::new()
            }
        }
    }

    async fn ollama_models(&self) -> Vec<DiscoveredModel> {
        let url = format!("{}/api/tags", self.ollama_base_url.trim_end_matches('/'));

        let result = async {
            let response = self.client.get(&url).send().await?.error_for_status()?;
            response.json::<OllamaTagList>().await
        }
        .await;

        match result {
            Ok(list) => {
                debug!("Ollama reported {} models", list.models.len());
                list.models.into_iter().map(DiscoveredModel::Ollama).collect()
            }
            Err(e) => {
                warn!("Ollama model discovery failed: {e}");
                Vec::new()
            }
        }
    }
}
