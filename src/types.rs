//! Core authorization types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Requirement object attached to a (scope, tier) pair.
///
/// Open-keyed by design: deployments attach arbitrary requirement fields
/// (audit class, retention hints, ...). Only `required` and `revocable`
/// are interpreted by the resolver; everything else is passed through.
pub type RequirementMap = serde_json::Map<String, serde_json::Value>;

/// Deployment override table: scope name → tier key → requirement map.
pub type OverrideTable = HashMap<String, HashMap<String, RequirementMap>>;

/// Ordinal privilege level assigned to a principal.
///
/// Tiers are totally ordered; a higher tier's route set is always a
/// superset of a lower tier's. Parses from `"T3"`, `"tier_3"` or a bare
/// integer.
///
/// # Examples
///
/// ```
/// use tiergate::Tier;
///
/// let tier: Tier = "T3".parse().unwrap();
/// assert_eq!(tier, Tier(3));
/// assert_eq!(tier.key(), "tier_3");
/// assert!(Tier(2) < Tier(4));
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Tier(pub u8);

impl Tier {
    /// Lowest privilege level; the fail-safe fallback everywhere.
    pub const FLOOR: Tier = Tier(1);

    /// Key used for this tier in boundary documents (e.g. `tier_3`).
    pub fn key(&self) -> String {
        format!("tier_{}", self.0)
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

impl FromStr for Tier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("tier_")
            .or_else(|| trimmed.strip_prefix('T'))
            .or_else(|| trimmed.strip_prefix('t'))
            .unwrap_or(trimmed);
        digits
            .parse::<u8>()
            .map(Tier)
            .map_err(|_| Error::InvalidTier(s.to_string()))
    }
}

/// Cached metadata describing one credential.
///
/// Constructed by the registry loader; immutable for a given load cycle and
/// replaced wholesale on the next refresh. Holds the credential's digest,
/// never the raw credential itself.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistryEntry {
    /// Hex-encoded BLAKE3 digest of the raw credential
    pub key_hash: String,

    /// Principal that owns the credential
    pub owner_id: String,

    /// Privilege tier granted by the credential
    pub tier: Tier,

    /// Scope names granted to the credential (ordered, duplicates collapsed)
    pub scopes: Vec<String>,

    /// Optional expiry; at-or-before now counts as expired
    pub expires_at: Option<DateTime<Utc>>,

    /// Whether the credential has been revoked
    pub revoked: bool,

    /// Provenance and extra fields from the backing source
    pub attributes: HashMap<String, String>,
}

impl RegistryEntry {
    /// Minimal entry for a pre-hashed key from the hash-list fallback.
    pub(crate) fn minimal(key_hash: String, source: &str) -> Self {
        let mut attributes = HashMap::new();
        attributes.insert("source".to_string(), source.to_string());
        Self {
            key_hash,
            owner_id: String::new(),
            tier: Tier::FLOOR,
            scopes: Vec::new(),
            expires_at: None,
            revoked: false,
            attributes,
        }
    }

    /// Whether the credential is usable at `now`: not revoked and not
    /// expired (expiry at-or-before `now` is expired).
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && self.expires_at.map_or(true, |expiry| expiry > now)
    }
}

/// Outcome of a registry lookup.
///
/// `Unknown` (hash never loaded) is deliberately distinct from
/// `Present { active: false }` (revoked or expired) so callers can report
/// the two cases differently.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyLookup {
    /// Hash not present in any backing source
    Unknown,

    /// Present in the registry; `active` is false for revoked/expired keys
    Present {
        /// The cached registry entry
        entry: RegistryEntry,
        /// Derived activity status at lookup time
        active: bool,
    },
}

impl KeyLookup {
    /// True only for a present, non-revoked, non-expired credential.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Present { active: true, .. })
    }

    /// The registry entry, if the credential is known at all.
    pub fn entry(&self) -> Option<&RegistryEntry> {
        match self {
            Self::Unknown => None,
            Self::Present { entry, .. } => Some(entry),
        }
    }
}

/// A named capability subject to consent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeDefinition {
    /// Scope name (e.g. "memory_access")
    pub name: String,

    /// Short glyph used in the compact symbolic encoding
    pub symbol: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Per-tier requirement overrides. A key equal to a tier key
    /// (`tier_3`) holds that tier's requirement object; if no tier-specific
    /// entry exists the whole map acts as tier-agnostic defaults.
    #[serde(default)]
    pub tier_requirements: RequirementMap,
}

impl ScopeDefinition {
    /// Create a new scope definition
    pub fn new(
        name: impl Into<String>,
        symbol: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
            description: description.into(),
            tier_requirements: RequirementMap::new(),
        }
    }

    /// Attach a requirement object for one tier
    pub fn with_tier_requirement(mut self, tier: Tier, requirements: RequirementMap) -> Self {
        self.tier_requirements
            .insert(tier.key(), serde_json::Value::Object(requirements));
        self
    }

    /// Requirement object for `tier_key`: the tier-specific entry if one
    /// exists, otherwise the whole table as tier-agnostic defaults.
    pub(crate) fn requirements_for(&self, tier_key: &str) -> RequirementMap {
        match self.tier_requirements.get(tier_key) {
            Some(serde_json::Value::Object(map)) => map.clone(),
            _ => self.tier_requirements.clone(),
        }
    }
}

/// Resolved consent status of one scope for one tier.
///
/// Computed per call by the consent resolver; never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct ScopeStatus {
    /// Scope name the status was computed for
    pub scope: String,

    /// The scope's symbolic glyph (`?` for unregistered scopes)
    pub symbol: String,

    /// Tier the status was computed for
    pub tier: Tier,

    /// Whether the scope is offered to this tier at all
    pub available: bool,

    /// Whether the scope is explicitly blocked for this tier
    pub restricted: bool,

    /// Merged requirement map (scope defaults → boundary → overrides)
    pub requirements: RequirementMap,

    /// Whether the caller must have explicitly consented
    pub required: bool,

    /// Whether consent can be withdrawn
    pub revocable: bool,
}
