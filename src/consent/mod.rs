//! Consent scope resolution
//!
//! Computes, per call, the requirement/availability/revocability of a
//! scope for a tier by merging four layers (later layers override earlier
//! ones, except immutability which always wins last):
//!
//! 1. the scope's own `tier_requirements` (tier-specific entry, else the
//!    whole table as tier-agnostic defaults)
//! 2. the tier-boundary document's `consent_requirements[tier][scope]`
//! 3. the deployment override table
//! 4. immutable scopes: forced `required = true, revocable = false`
//!
//! The resolver holds no mutable shared state after construction (other
//! than explicit [`ConsentResolver::define_scope`] calls) and is safe for
//! unsynchronized concurrent reads.

mod boundary;
mod codec;

pub use boundary::{TierBoundary, TierBoundaryPolicy, ValidationRules};
pub use codec::{SymbolTable, UNKNOWN_SYMBOL};

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Once;
use tracing::{debug, warn};

use crate::config::ConsentConfig;
use crate::error::Result;
use crate::types::{OverrideTable, RequirementMap, ScopeDefinition, ScopeStatus, Tier};

/// Resolves a principal to a tier.
///
/// Failures are caught by the resolver and fall back to the configured
/// default tier; they never propagate to the caller.
pub trait TierResolver: Send + Sync {
    /// Tier held by `principal_id`
    fn resolve_tier(&self, principal_id: &str) -> Result<Tier>;
}

/// Pluggable consent validation, consulted when no grant registry is
/// configured. A failing validator denies access; it never widens it.
pub trait ScopeValidator: Send + Sync {
    /// Whether `principal_id` has valid consent for `scope`
    fn validate(&self, principal_id: &str, scope: &str) -> Result<bool>;
}

/// Consent scope resolver.
///
/// Loads the tier-boundary policy once at construction and keeps an
/// in-memory scope registry (name → symbol, description, per-tier
/// requirements).
pub struct ConsentResolver {
    scopes: HashMap<String, ScopeDefinition>,
    symbols: SymbolTable,
    policy: TierBoundaryPolicy,
    policy_loaded: bool,
    overrides: OverrideTable,
    default_tier: Tier,
    tier_resolver: Box<dyn TierResolver>,
    grants: Option<HashMap<String, Vec<String>>>,
    validator: Option<Box<dyn ScopeValidator>>,
    fail_open_warned: Once,
}

impl ConsentResolver {
    /// Construct a resolver from configuration plus an injected tier
    /// resolution callback.
    ///
    /// The tier-boundary document at `config.boundary_path` is loaded once
    /// here; a missing or malformed document degrades to an empty policy.
    pub fn new(config: ConsentConfig, tier_resolver: Box<dyn TierResolver>) -> Self {
        let (policy, policy_loaded) = match &config.boundary_path {
            Some(path) => TierBoundaryPolicy::load(path),
            None => (TierBoundaryPolicy::default(), false),
        };

        let mut resolver = Self {
            scopes: HashMap::new(),
            symbols: SymbolTable::default(),
            policy,
            policy_loaded,
            overrides: config.overrides,
            default_tier: config.default_tier,
            tier_resolver,
            grants: None,
            validator: None,
            fail_open_warned: Once::new(),
        };
        for definition in default_scopes() {
            resolver.define_scope(definition);
        }
        for definition in config.extra_scopes {
            resolver.define_scope(definition);
        }
        resolver
    }

    /// Use a pre-built boundary policy instead of (or on top of) the one
    /// loaded from disk. Hosts that fetch the document themselves use this.
    pub fn with_boundary_policy(mut self, policy: TierBoundaryPolicy) -> Self {
        self.policy = policy;
        self.policy_loaded = true;
        self
    }

    /// Attach a grant registry: previously-recorded consents per principal.
    pub fn with_grants(mut self, grants: HashMap<String, Vec<String>>) -> Self {
        self.grants = Some(grants);
        self
    }

    /// Attach a pluggable consent validator (used when no grant registry
    /// is configured).
    pub fn with_validator(mut self, validator: Box<dyn ScopeValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Register a scope (or replace an existing definition) and rebuild
    /// the symbolic codec's decode order.
    pub fn define_scope(&mut self, definition: ScopeDefinition) {
        self.symbols.register(&definition.name, &definition.symbol);
        self.scopes.insert(definition.name.clone(), definition);
    }

    /// Registered scope definitions, ordered by name.
    pub fn list_scopes(&self) -> Vec<&ScopeDefinition> {
        let mut scopes: Vec<&ScopeDefinition> = self.scopes.values().collect();
        scopes.sort_by(|a, b| a.name.cmp(&b.name));
        scopes
    }

    /// Resolve the consent status of `scope_name` for `tier`.
    ///
    /// Never fails: unknown scopes and unknown tiers resolve to safe
    /// defaults (`available = false` when a boundary policy is loaded).
    pub fn get_scope_requirements(&self, scope_name: &str, tier: Tier) -> ScopeStatus {
        let tier_key = tier.key();
        let definition = self.scopes.get(scope_name);
        let boundary = self.policy.boundary_for(&tier_key);

        let available = if self.policy_loaded {
            boundary.is_some_and(|b| b.available_scopes.iter().any(|s| s == scope_name))
        } else {
            // No boundary document at all: every registered scope is offered.
            definition.is_some()
        };
        let restricted =
            boundary.is_some_and(|b| b.restricted_scopes.iter().any(|s| s == scope_name));

        let mut requirements = RequirementMap::new();
        if let Some(definition) = definition {
            merge_into(&mut requirements, &definition.requirements_for(&tier_key));
        }
        let boundary_requirements = boundary.and_then(|b| b.consent_requirements.get(scope_name));
        if let Some(map) = boundary_requirements {
            merge_into(&mut requirements, map);
        }
        if let Some(map) = self
            .overrides
            .get(scope_name)
            .and_then(|per_tier| per_tier.get(&tier_key))
        {
            merge_into(&mut requirements, map);
        }

        // `required` defaults to "the boundary table names this scope with
        // actual requirements"; an empty requirement object means offered
        // without explicit consent.
        let mut required = requirements
            .get("required")
            .and_then(Value::as_bool)
            .unwrap_or_else(|| boundary_requirements.is_some_and(|map| !map.is_empty()));

        let immutable = self.policy.is_immutable(scope_name);
        let mut revocable = requirements
            .get("revocable")
            .and_then(Value::as_bool)
            .unwrap_or(!immutable);

        // Immutability wins over every other layer, unconditionally.
        if immutable {
            required = true;
            revocable = false;
            requirements.insert("required".to_string(), Value::Bool(true));
            requirements.insert("revocable".to_string(), Value::Bool(false));
        }

        ScopeStatus {
            scope: scope_name.to_string(),
            symbol: self
                .symbols
                .symbol_for(scope_name)
                .unwrap_or(UNKNOWN_SYMBOL)
                .to_string(),
            tier,
            available,
            restricted,
            requirements,
            required,
            revocable,
        }
    }

    /// Decide whether `principal_id` may use `scope_name`.
    ///
    /// The principal's tier comes from the injected [`TierResolver`]; on
    /// failure the configured default tier is used. A scope that is
    /// unavailable or restricted for the tier is always denied. Otherwise
    /// the grant registry decides if one is configured, then the validator
    /// callback if one is configured.
    ///
    /// **Development-mode default**: with neither a grant registry nor a
    /// validator configured this method allows access (fail-open). That is
    /// deliberate for development and test profiles and is logged once at
    /// `warn!`; production deployments must configure one of the two.
    pub fn validate_scope_access(&self, principal_id: &str, scope_name: &str) -> bool {
        let tier = match self.tier_resolver.resolve_tier(principal_id) {
            Ok(tier) => tier,
            Err(err) => {
                warn!(principal = principal_id, %err, "tier resolution failed, using default tier");
                self.default_tier
            }
        };

        let status = self.get_scope_requirements(scope_name, tier);
        if !status.available || status.restricted {
            debug!(
                scope = scope_name,
                %tier,
                available = status.available,
                restricted = status.restricted,
                "scope denied by tier boundary"
            );
            return false;
        }

        if let Some(grants) = &self.grants {
            return match grants.get(principal_id) {
                // Once a principal has recorded grants, every scope must
                // be in the list, required or not.
                Some(recorded) => recorded.iter().any(|scope| scope == scope_name),
                // No recorded grants: only non-required scopes pass.
                None => !status.required,
            };
        }

        if let Some(validator) = &self.validator {
            return match validator.validate(principal_id, scope_name) {
                Ok(allowed) => allowed,
                Err(err) => {
                    warn!(scope = scope_name, %err, "consent validator failed, denying access");
                    false
                }
            };
        }

        self.fail_open_warned.call_once(|| {
            warn!(
                "no grant registry or consent validator configured; \
                 scope access defaults to allow (development mode only)"
            );
        });
        true
    }

    /// Compact symbolic encoding of a scope set (input order preserved).
    pub fn get_symbolic_representation(&self, scopes: &[String]) -> String {
        self.symbols.encode(scopes)
    }

    /// Decode a symbolic scope string (greedy longest-match, skipping
    /// unrecognized fragments).
    pub fn parse_symbolic_consent(&self, encoded: &str) -> Vec<String> {
        self.symbols.decode(encoded)
    }
}

fn merge_into(target: &mut RequirementMap, source: &RequirementMap) {
    for (key, value) in source {
        target.insert(key.clone(), value.clone());
    }
}

/// Built-in scope table; deployments extend it via config or
/// [`ConsentResolver::define_scope`].
fn default_scopes() -> Vec<ScopeDefinition> {
    vec![
        ScopeDefinition::new("memory_access", "M", "read and search the memory store"),
        ScopeDefinition::new("memory_export", "MX", "bulk export of stored memories"),
        ScopeDefinition::new("biometric", "B", "biometric sensor readings"),
        ScopeDefinition::new("analytics", "A", "usage analytics collection"),
        ScopeDefinition::new("dream_capture", "D", "dream session capture"),
        ScopeDefinition::new("quantum_sim", "Q", "quantum simulation runs"),
    ]
}
