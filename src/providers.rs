// ABOUTME: Immutable provider registry mapping provider ids to display names and plan gates
// ABOUTME: Backs both server-side entitlement checks and the client-facing provider list
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Provider Registry & Entitlement
//!
//! The registry is an explicitly constructed, immutable table passed into the
//! orchestration endpoint and discovery adapters at startup. There is no
//! hidden global state, so tests can inject alternate registries.
//!
//! Entitlement is checked on every completion request: a provider outside
//! [`ProviderRegistry::available_providers`] for the caller's plan is rejected
//! with an authorization error, never silently downgraded.

use serde::Serialize;

use crate::plans::Plan;

/// Well-known provider identifiers
pub mod ids {
    /// OpenAI cloud API
    pub const OPENAI: &str = "openai";
    /// Anthropic stand-in
    pub const ANTHROPIC: &str = "anthropic";
    /// LM Studio local runtime (OpenAI-compatible)
    pub const LOCAL_LLM: &str = "local-llm";
    /// Ollama local runtime
    pub const OLLAMA: &str = "ollama";
}

/// Static description of one LLM backend
#[derive(Debug, Clone)]
pub struct ProviderDescriptor {
    /// Stable string key (e.g. "ollama")
    pub id: &'static str,
    /// Human-readable display name
    pub name: &'static str,
    /// Plans that unlock this provider
    pub enabled_for_plans: &'static [Plan],
    /// Whether the UI lets the user pick a specific model for this provider
    pub supports_model_selection: bool,
}

impl ProviderDescriptor {
    /// Check whether the given plan unlocks this provider
    #[must_use]
    pub fn enabled_for(&self, plan: Plan) -> bool {
        self.enabled_for_plans.contains(&plan)
    }
}

/// Provider entry as exposed to API consumers
#[derive(Debug, Clone, Serialize)]
pub struct ProviderInfo {
    /// Stable provider id
    pub id: &'static str,
    /// Display name
    pub name: &'static str,
    /// Whether explicit model selection is supported
    pub supports_model_selection: bool,
}

/// Immutable registry of provider descriptors
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    providers: Vec<ProviderDescriptor>,
}

impl ProviderRegistry {
    /// Build a registry from an explicit descriptor list
    #[must_use]
    pub fn new(providers: Vec<ProviderDescriptor>) -> Self {
        Self { providers }
    }

    /// The production provider table
    ///
    /// Remote APIs are PRO-only; local runtimes are available from BASIC up.
    /// Only the local runtimes expose explicit model selection.
    #[must_use]
    pub fn standard() -> Self {
        const BASIC_AND_PRO: &[Plan] = &[Plan::Basic, Plan::Pro];
        const PRO_ONLY: &[Plan] = &[Plan::Pro];

        Self::new(vec![
            ProviderDescriptor {
                id: ids::OPENAI,
                name: "OpenAI",
                enabled_for_plans: PRO_ONLY,
                supports_model_selection: false,
            },
            ProviderDescriptor {
                id: ids::ANTHROPIC,
                name: "Anthropic",
                enabled_for_plans: PRO_ONLY,
                supports_model_selection: false,
            },
            ProviderDescriptor {
                id: ids::LOCAL_LLM,
                name: "LM Studio",
                enabled_for_plans: BASIC_AND_PRO,
                supports_model_selection: true,
            },
            ProviderDescriptor {
                id: ids::OLLAMA,
                name: "Ollama",
                enabled_for_plans: BASIC_AND_PRO,
                supports_model_selection: true,
            },
        ])
    }

    /// Look up a provider by id
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&ProviderDescriptor> {
        self.providers.iter().find(|p| p.id == id)
    }

    /// All providers unlocked by the given plan
    #[must_use]
    pub fn available_providers(&self, plan: Plan) -> Vec<ProviderInfo> {
        self.providers
            .iter()
            .filter(|p| p.enabled_for(plan))
            .map(|p| ProviderInfo {
                id: p.id,
                name: p.name,
                supports_model_selection: p.supports_model_selection,
            })
            .collect()
    }

    /// Check entitlement for a completion request
    ///
    /// Distinguishes an unrecognized provider (validation error) from a
    /// recognized but plan-locked one (authorization error) so the route
    /// layer can map them to 400 and 403 respectively.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for unknown ids and `PermissionDenied` when the
    /// caller's plan does not include the provider.
    pub fn check_entitlement(
        &self,
        plan: Plan,
        provider_id: &str,
    ) -> crate::errors::AppResult<&ProviderDescriptor> {
        let descriptor = self.get(provider_id).ok_or_else(|| {
            crate::errors::AppError::invalid_input(format!("Unknown provider '{provider_id}'"))
        })?;

        if !descriptor.enabled_for(plan) {
            return Err(crate::errors::AppError::provider_not_entitled(provider_id));
        }

        Ok(descriptor)
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
