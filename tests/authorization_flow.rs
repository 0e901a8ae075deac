//! End-to-end authorization flow
//!
//! Exercises the three components together the way a host would: credential
//! lookup through the file-backed registry, consent resolution against a
//! tier-boundary document, and route gating for the resolved tier.

use std::io::Write;
use std::time::Duration;

use tiergate::{
    hash_credential, ConsentConfig, ConsentResolver, KeyLookup, KeyRegistryCache, RegistryConfig,
    RoutePolicy, Tier, TierResolver,
};

struct StaticTier(Tier);

impl TierResolver for StaticTier {
    fn resolve_tier(&self, _principal_id: &str) -> tiergate::Result<Tier> {
        Ok(self.0)
    }
}

fn write_json(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    write!(file, "{content}").expect("write fixture");
    file.flush().expect("flush fixture");
    file
}

#[test]
fn registry_consent_and_routes_compose() {
    let raw_key = "dream-lab-key-7731";
    let registry_file = write_json(&format!(
        r#"{{"api_keys": [{{
            "hash": "{}",
            "user_id": "user:lab-7731",
            "tier": 3,
            "scopes": ["memory_access"],
            "revoked": false
        }}]}}"#,
        hash_credential(raw_key)
    ));
    let boundary_file = write_json(
        r#"{
            "tier_consent_boundaries": {
                "tier_3": {
                    "available_scopes": ["memory_access"],
                    "restricted_scopes": [],
                    "consent_requirements": {"memory_access": {}}
                }
            },
            "consent_validation_rules": {"immutable_scopes": []}
        }"#,
    );

    let cache = KeyRegistryCache::new(RegistryConfig {
        file_path: Some(registry_file.path().to_path_buf()),
        refresh_interval: Duration::from_secs(60),
        ..Default::default()
    });
    assert!(cache.is_configured());

    // Step 1: credential resolves to tier 3, active.
    let (entry, active) = match cache.lookup(raw_key) {
        KeyLookup::Present { entry, active } => (entry, active),
        KeyLookup::Unknown => panic!("credential should be known"),
    };
    assert!(active);
    assert_eq!(entry.tier, Tier(3));
    assert_eq!(entry.scopes, vec!["memory_access"]);

    // Step 2: consent resolution for the granted scope at the granted tier.
    let resolver = ConsentResolver::new(
        ConsentConfig {
            boundary_path: Some(boundary_file.path().to_path_buf()),
            ..Default::default()
        },
        Box::new(StaticTier(entry.tier)),
    );
    let status = resolver.get_scope_requirements("memory_access", entry.tier);
    assert!(status.available);
    assert!(!status.required, "empty consent requirement means not required");
    assert!(resolver.validate_scope_access(&entry.owner_id, "memory_access"));

    // A scope outside the tier's boundary is denied even though the
    // resolver knows it.
    assert!(!resolver.validate_scope_access(&entry.owner_id, "quantum_sim"));

    // Step 3: route gating for the resolved tier.
    let routes = RoutePolicy::new();
    assert!(routes.is_route_allowed(entry.tier, "/api/memory/export"));
    assert!(!routes.is_route_allowed(entry.tier, "/api/admin/keys"));

    // An unknown credential is a distinct outcome from an inactive one.
    assert_eq!(cache.lookup("stolen-key"), KeyLookup::Unknown);
}

#[test]
fn revoked_credential_is_present_but_denied() {
    let raw_key = "revoked-key-0001";
    let registry_file = write_json(&format!(
        r#"{{"api_keys": [{{
            "key": "{raw_key}",
            "user_id": "user:gone",
            "tier": 2,
            "scopes": ["analytics"],
            "revoked": true
        }}]}}"#
    ));

    let cache = KeyRegistryCache::new(RegistryConfig {
        file_path: Some(registry_file.path().to_path_buf()),
        ..Default::default()
    });

    match cache.lookup(raw_key) {
        KeyLookup::Present { active, entry } => {
            assert!(!active, "revoked keys are present but inactive");
            assert_eq!(entry.tier, Tier(2));
        }
        KeyLookup::Unknown => panic!("revoked key must still be present"),
    }
}

#[test]
fn missing_boundary_document_degrades_not_fails() {
    let resolver = ConsentResolver::new(
        ConsentConfig {
            boundary_path: Some("/nonexistent/boundaries.json".into()),
            ..Default::default()
        },
        Box::new(StaticTier(Tier(2))),
    );

    // Degrades to "no tier restrictions": registered scopes are offered.
    let status = resolver.get_scope_requirements("analytics", Tier(2));
    assert!(status.available);
    assert!(!status.restricted);
}
