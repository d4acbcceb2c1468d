// ABOUTME: Model discovery endpoint listing what a provider's runtime can serve
// ABOUTME: Unknown or non-discoverable providers answer with an empty list
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use http::HeaderMap;
use serde::{Deserialize, Serialize};

use crate::errors::AppResult;
use crate::llm::discovery::{DiscoveredModel, ModelInfo};
use crate::server::ServerResources;

/// Query parameters of `GET /models`
#[derive(Debug, Deserialize)]
pub struct ModelsQuery {
    /// Provider id to query
    pub provider: String,
}

/// Response of `GET /models`
#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    /// Echoed provider id
    pub provider: String,
    /// Models the runtime currently offers; empty when unreachable or the
    /// provider has no discovery API
    pub models: Vec<ModelInfo>,
}

/// Handle `GET /models?provider=<id>`
///
/// # Errors
///
/// 401 when unauthenticated. Discovery failures do not error; they produce
/// an empty list.
pub async fn models_handler(
    State(resources): State<Arc<ServerResources>>,
    headers: HeaderMap,
    Query(query): Query<ModelsQuery>,
) -> AppResult<Json<ModelsResponse>> {
    resources.authenticator.authenticate(&headers).await?;

    let models = resources
        .discovery
        .list_models(&query.provider)
        .await
        .iter()
        .map(DiscoveredModel::info)
        .collect();

    Ok(Json(ModelsResponse {
        provider: query.provider,
        models,
    }))
}
