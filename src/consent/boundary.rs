//! Tier boundary policy document
//!
//! External JSON configuration describing, per tier, which scopes are
//! offered, which are explicitly blocked, and which consent requirements
//! apply, plus global validation rules (immutable scopes). Loaded once at
//! resolver construction; a missing or malformed document degrades to an
//! empty policy rather than failing construction.

use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{debug, warn};

use crate::types::RequirementMap;

/// Full tier-boundary document
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TierBoundaryPolicy {
    /// Per-tier boundaries, keyed by tier key (`tier_3`)
    #[serde(default)]
    pub tier_consent_boundaries: HashMap<String, TierBoundary>,

    /// Global validation rules
    #[serde(default)]
    pub consent_validation_rules: ValidationRules,
}

/// Scope boundaries for one tier
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TierBoundary {
    /// Scopes offered to this tier
    #[serde(default)]
    pub available_scopes: Vec<String>,

    /// Scopes explicitly blocked for this tier
    #[serde(default)]
    pub restricted_scopes: Vec<String>,

    /// Per-scope consent requirement objects
    #[serde(default)]
    pub consent_requirements: HashMap<String, RequirementMap>,
}

/// Rules applied across all tiers
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ValidationRules {
    /// Scopes whose required/revocable status no layer may override
    #[serde(default)]
    pub immutable_scopes: HashSet<String>,
}

impl TierBoundaryPolicy {
    /// Load the document from `path`.
    ///
    /// Returns the policy plus a flag telling whether a document was
    /// actually loaded; on any error the resolver degrades to "no tier
    /// restrictions, only scope-level defaults".
    pub fn load(path: &Path) -> (Self, bool) {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) => {
                warn!(path = %path.display(), %err, "tier boundary document unreadable, using empty policy");
                return (Self::default(), false);
            }
        };
        match serde_json::from_str::<Self>(&text) {
            Ok(policy) => {
                debug!(
                    path = %path.display(),
                    tiers = policy.tier_consent_boundaries.len(),
                    "tier boundary policy loaded"
                );
                (policy, true)
            }
            Err(err) => {
                warn!(path = %path.display(), %err, "malformed tier boundary document, using empty policy");
                (Self::default(), false)
            }
        }
    }

    pub(crate) fn boundary_for(&self, tier_key: &str) -> Option<&TierBoundary> {
        self.tier_consent_boundaries.get(tier_key)
    }

    pub(crate) fn is_immutable(&self, scope: &str) -> bool {
        self.consent_validation_rules
            .immutable_scopes
            .contains(scope)
    }
}
