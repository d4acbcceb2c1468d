// ABOUTME: Subscription plan tiers gating which LLM providers a user may access
// ABOUTME: Parsed from billing state by the auth boundary, consumed by the provider registry
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use serde::{Deserialize, Serialize};
use std::fmt;

/// Subscription tier for a user
///
/// Billing state management (checkout, webhooks) lives outside this crate;
/// the plan arrives resolved on the authenticated context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Plan {
    /// No active subscription
    #[default]
    None,
    /// Entry tier: local runtimes only
    Basic,
    /// Full tier: all providers
    Pro,
}

impl Plan {
    /// Parse a plan from its string form, case-insensitively
    ///
    /// Unrecognized values degrade to `None` rather than failing, matching
    /// how a missing subscription row is treated.
    #[must_use]
    pub fn from_str_or_none(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "BASIC" => Self::Basic,
            "PRO" => Self::Pro,
            _ => Self::None,
        }
    }

    /// String form used in API payloads
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Basic => "BASIC",
            Self::Pro => "PRO",
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
