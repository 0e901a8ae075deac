//! Environment-driven configuration surface
//!
//! Both config structs can be built directly (tests, embedding hosts) or
//! from the process environment. `from_env` never fails: malformed values
//! are logged at `warn!` and fall back to defaults so a bad deployment
//! variable degrades instead of crashing the service.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

use crate::types::{OverrideTable, ScopeDefinition, Tier};

/// Default registry refresh interval in seconds
pub const DEFAULT_REFRESH_SECS: u64 = 60;

/// Key registry cache configuration
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Path to a file-backed JSON key registry
    pub file_path: Option<PathBuf>,

    /// Inline JSON registry payload (same schema as the file)
    pub inline_json: Option<String>,

    /// Comma-separated list of pre-hashed keys (lowest precedence)
    pub hash_list: Option<String>,

    /// How long a load cycle stays fresh; zero means "always reload"
    pub refresh_interval: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            file_path: None,
            inline_json: None,
            hash_list: None,
            refresh_interval: Duration::from_secs(DEFAULT_REFRESH_SECS),
        }
    }
}

impl RegistryConfig {
    /// Build from `TIERGATE_API_KEY_FILE`, `TIERGATE_API_KEYS_JSON`,
    /// `TIERGATE_API_KEY_HASHES` and `TIERGATE_KEY_REFRESH_SECS`.
    pub fn from_env() -> Self {
        let refresh_secs = env_var("TIERGATE_KEY_REFRESH_SECS")
            .and_then(|raw| match raw.parse::<u64>() {
                Ok(secs) => Some(secs),
                Err(err) => {
                    warn!(value = %raw, %err, "invalid TIERGATE_KEY_REFRESH_SECS, using default");
                    None
                }
            })
            .unwrap_or(DEFAULT_REFRESH_SECS);

        Self {
            file_path: env_var("TIERGATE_API_KEY_FILE").map(PathBuf::from),
            inline_json: env_var("TIERGATE_API_KEYS_JSON"),
            hash_list: env_var("TIERGATE_API_KEY_HASHES"),
            refresh_interval: Duration::from_secs(refresh_secs),
        }
    }
}

/// Consent scope resolver configuration
#[derive(Debug, Clone)]
pub struct ConsentConfig {
    /// Path to the tier-boundary policy document
    pub boundary_path: Option<PathBuf>,

    /// Tier used when the tier-resolution callback fails
    pub default_tier: Tier,

    /// Deployment override table (scope → tier key → requirement map)
    pub overrides: OverrideTable,

    /// Additional scope definitions registered at construction
    pub extra_scopes: Vec<ScopeDefinition>,
}

impl Default for ConsentConfig {
    fn default() -> Self {
        Self {
            boundary_path: None,
            default_tier: Tier::FLOOR,
            overrides: HashMap::new(),
            extra_scopes: Vec::new(),
        }
    }
}

impl ConsentConfig {
    /// Build from `TIERGATE_TIER_BOUNDARY_FILE`, `TIERGATE_DEFAULT_TIER`,
    /// `TIERGATE_SCOPE_OVERRIDES` and `TIERGATE_EXTRA_SCOPES`.
    pub fn from_env() -> Self {
        let default_tier = env_var("TIERGATE_DEFAULT_TIER")
            .and_then(|raw| match raw.parse::<Tier>() {
                Ok(tier) => Some(tier),
                Err(err) => {
                    warn!(value = %raw, %err, "invalid TIERGATE_DEFAULT_TIER, using floor tier");
                    None
                }
            })
            .unwrap_or(Tier::FLOOR);

        let overrides = env_var("TIERGATE_SCOPE_OVERRIDES")
            .and_then(|raw| match serde_json::from_str::<OverrideTable>(&raw) {
                Ok(table) => Some(table),
                Err(err) => {
                    warn!(%err, "malformed TIERGATE_SCOPE_OVERRIDES, ignoring");
                    None
                }
            })
            .unwrap_or_default();

        let extra_scopes = env_var("TIERGATE_EXTRA_SCOPES")
            .and_then(|raw| match serde_json::from_str::<Vec<ScopeDefinition>>(&raw) {
                Ok(scopes) => Some(scopes),
                Err(err) => {
                    warn!(%err, "malformed TIERGATE_EXTRA_SCOPES, ignoring");
                    None
                }
            })
            .unwrap_or_default();

        Self {
            boundary_path: env_var("TIERGATE_TIER_BOUNDARY_FILE").map(PathBuf::from),
            default_tier,
            overrides,
            extra_scopes,
        }
    }
}

/// Non-empty environment variable, if set
fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}
