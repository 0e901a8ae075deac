//! # Tiergate
//!
//! Tiered authorization and consent resolution core: decides which tier a
//! caller holds, which routes that tier unlocks, and which consent scopes
//! are granted, required, or revocable for them.
//!
//! Three independent, composable components; none calls the others — the
//! host (HTTP layer, out of scope) orchestrates them:
//!
//! - [`KeyRegistryCache`] — resolves an opaque credential to tier/scope/
//!   expiry metadata, merging up to three backing sources with a TTL
//!   refresh policy.
//! - [`ConsentResolver`] — merges layered tier-based policy (scope
//!   defaults, tier-boundary tables, deployment overrides, immutability
//!   rules) into one decision per (scope, tier) pair, with a compact
//!   symbolic codec for scope sets.
//! - [`RoutePolicy`] — pure tier → allowed-route-pattern table with a
//!   fail-safe floor-tier default.
//!
//! Nothing here raises to its caller under normal misconfiguration:
//! missing or malformed backing documents are logged via `tracing` and
//! degrade to absent sources / empty policies.
//!
//! ## Example
//!
//! ```
//! use tiergate::{ConsentConfig, ConsentResolver, RoutePolicy, Tier, TierResolver};
//!
//! struct StaticTier(Tier);
//!
//! impl TierResolver for StaticTier {
//!     fn resolve_tier(&self, _principal_id: &str) -> tiergate::Result<Tier> {
//!         Ok(self.0)
//!     }
//! }
//!
//! let resolver = ConsentResolver::new(ConsentConfig::default(), Box::new(StaticTier(Tier(3))));
//! // No tier-boundary document loaded: registered scopes are offered.
//! let status = resolver.get_scope_requirements("memory_access", Tier(3));
//! assert!(status.available);
//! assert_eq!(status.symbol, "M");
//!
//! let routes = RoutePolicy::new();
//! assert!(routes.is_route_allowed(Tier(3), "/api/memory"));
//! assert!(!routes.is_route_allowed(Tier(1), "/api/memory"));
//! ```

pub mod config;
pub mod consent;
pub mod error;
pub mod registry;
pub mod routes;
pub mod types;

// Re-export commonly used types
pub use config::{ConsentConfig, RegistryConfig, DEFAULT_REFRESH_SECS};
pub use consent::{
    ConsentResolver, ScopeValidator, SymbolTable, TierBoundary, TierBoundaryPolicy, TierResolver,
    ValidationRules, UNKNOWN_SYMBOL,
};
pub use error::{Error, Result};
pub use registry::{hash_credential, Clock, KeyRegistryCache, SystemClock};
pub use routes::RoutePolicy;
pub use types::{
    KeyLookup, OverrideTable, RegistryEntry, RequirementMap, ScopeDefinition, ScopeStatus, Tier,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
