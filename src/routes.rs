//! Tier → route access policy
//!
//! A static table maps each tier to its allowed route patterns. The table
//! is built once at construction by folding per-tier additions onto the
//! floor set, so every higher tier's set is a superset of the lower tier's
//! by construction. Unknown tiers resolve to the floor tier's set, never
//! to full access.

use regex::Regex;
use std::collections::BTreeMap;

use crate::types::Tier;

/// Routes every authenticated principal can reach
const BASE_ROUTES: &[&str] = &["/health", "/api/status", "/api/profile", "/api/auth/logout"];

/// Per-tier additions, cumulative from the floor upward
const TIER_ADDITIONS: &[(u8, &[&str])] = &[
    (2, &["/api/memory", "/api/memory/search"]),
    (3, &["/api/memory/export", "/api/dream", "/api/dream/*"]),
    (4, &["/api/quantum", "/api/quantum/*", "/api/analytics"]),
    (5, &["/api/admin/keys", "/api/admin/*"]),
];

/// Pure tier → route-pattern policy. No state beyond the table built in
/// [`RoutePolicy::new`]; safe for unsynchronized concurrent reads.
pub struct RoutePolicy {
    table: BTreeMap<u8, Vec<String>>,
}

impl RoutePolicy {
    /// Build the cumulative route table
    pub fn new() -> Self {
        let mut table = BTreeMap::new();
        let mut routes: Vec<String> = BASE_ROUTES.iter().map(|r| (*r).to_string()).collect();
        table.insert(Tier::FLOOR.0, routes.clone());
        for (tier, additions) in TIER_ADDITIONS {
            routes.extend(additions.iter().map(|r| (*r).to_string()));
            table.insert(*tier, routes.clone());
        }
        Self { table }
    }

    /// Ordered route patterns allowed for `tier`. Unknown tier values get
    /// the floor tier's set (fail-safe default).
    pub fn allowed_routes(&self, tier: Tier) -> &[String] {
        self.table
            .get(&tier.0)
            .or_else(|| self.table.get(&Tier::FLOOR.0))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Whether `path` matches any allowed pattern for `tier`
    pub fn is_route_allowed(&self, tier: Tier, path: &str) -> bool {
        self.allowed_routes(tier)
            .iter()
            .any(|pattern| matches_pattern(pattern, path))
    }
}

impl Default for RoutePolicy {
    fn default() -> Self {
        Self::new()
    }
}

/// Match a route pattern against a path (supports `*` wildcards)
fn matches_pattern(pattern: &str, path: &str) -> bool {
    if pattern == path {
        return true;
    }
    if pattern.contains('*') {
        let regex_pattern = pattern.replace('.', r"\.").replace('*', ".*");
        if let Ok(regex) = Regex::new(&format!("^{}$", regex_pattern)) {
            return regex.is_match(path);
        }
    }
    false
}
