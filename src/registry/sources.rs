//! Backing-source loading and merging for the key registry
//!
//! Three ordered sources contribute entries keyed by credential hash:
//! a file-backed JSON document, an inline JSON payload, and a flat
//! comma-separated hash list. File and inline entries both fully apply
//! (inline wins per hash); the hash list only fills in hashes not already
//! present. A missing or malformed source is logged and treated as absent.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use tracing::{debug, warn};

use crate::config::RegistryConfig;
use crate::types::{RegistryEntry, Tier};

/// Hex BLAKE3 digest of a raw credential.
///
/// Every comparison and map access in the registry goes through this; raw
/// credentials are never stored or logged.
pub fn hash_credential(raw: &str) -> String {
    blake3::hash(raw.as_bytes()).to_hex().to_string()
}

/// Top-level schema of a key registry document
#[derive(Debug, Deserialize)]
struct RegistryDocument {
    #[serde(default)]
    api_keys: Vec<RawKeyEntry>,
}

/// One entry as it appears in a registry document
#[derive(Debug, Deserialize)]
struct RawKeyEntry {
    #[serde(default)]
    hash: Option<String>,
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    tier: Option<u8>,
    #[serde(default)]
    scopes: Vec<String>,
    #[serde(default)]
    revoked: bool,
    #[serde(default)]
    expires_at: Option<Value>,
    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

impl RawKeyEntry {
    /// Convert to a registry entry, or drop it with a warning when neither
    /// a direct hash nor a raw key to hash is present.
    fn into_entry(self, source: &str) -> Option<RegistryEntry> {
        let key_hash = match (&self.hash, self.key.as_deref()) {
            (Some(hash), _) => hash.trim().to_lowercase(),
            (None, Some(key)) => hash_credential(key),
            (None, None) => {
                warn!(source, "registry entry has neither 'hash' nor 'key', skipping");
                return None;
            }
        };

        let expires_at = self.expires_at.as_ref().and_then(parse_expiry);

        let mut scopes: Vec<String> = Vec::with_capacity(self.scopes.len());
        for scope in self.scopes {
            if !scopes.contains(&scope) {
                scopes.push(scope);
            }
        }

        let mut attributes = HashMap::new();
        attributes.insert("source".to_string(), source.to_string());
        for (name, value) in self.extra {
            attributes.insert(name, stringify(&value));
        }

        Some(RegistryEntry {
            key_hash,
            owner_id: self.user_id.unwrap_or_default(),
            tier: Tier(self.tier.unwrap_or(Tier::FLOOR.0)),
            scopes,
            expires_at,
            revoked: self.revoked,
            attributes,
        })
    }
}

/// Result of a full reload across all configured sources
#[derive(Debug, Default)]
pub(crate) struct LoadedRegistry {
    pub entries: HashMap<String, RegistryEntry>,
    pub configured: bool,
}

/// Read and merge all configured sources into a fresh map.
pub(crate) fn load(config: &RegistryConfig) -> LoadedRegistry {
    let mut entries = HashMap::new();
    let mut configured = false;

    if let Some(path) = &config.file_path {
        configured = true;
        match fs::read_to_string(path) {
            Ok(text) => merge_document(&mut entries, &text, "file"),
            Err(err) => {
                warn!(path = %path.display(), %err, "unable to read key registry file, treating source as absent");
            }
        }
    }

    if let Some(payload) = &config.inline_json {
        configured = true;
        merge_document(&mut entries, payload, "inline");
    }

    if let Some(list) = &config.hash_list {
        configured = true;
        for hash in list.split(',').map(str::trim).filter(|h| !h.is_empty()) {
            let hash = hash.to_lowercase();
            // Lowest precedence: only fills hashes no other source defined.
            entries
                .entry(hash.clone())
                .or_insert_with(|| RegistryEntry::minimal(hash, "hash_list"));
        }
    }

    debug!(entries = entries.len(), configured, "key registry sources loaded");
    LoadedRegistry { entries, configured }
}

fn merge_document(entries: &mut HashMap<String, RegistryEntry>, text: &str, source: &str) {
    match serde_json::from_str::<RegistryDocument>(text) {
        Ok(document) => {
            for raw in document.api_keys {
                if let Some(entry) = raw.into_entry(source) {
                    entries.insert(entry.key_hash.clone(), entry);
                }
            }
        }
        Err(err) => {
            warn!(source, %err, "malformed key registry document, treating source as absent");
        }
    }
}

/// Parse an expiry value: Unix numeric timestamp or ISO-8601 string.
/// Strings without a timezone are treated as UTC. Malformed values are
/// dropped with a warning rather than failing the whole entry.
fn parse_expiry(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Null => None,
        Value::Number(number) => {
            let secs = number.as_i64().or_else(|| number.as_f64().map(|f| f as i64))?;
            match Utc.timestamp_opt(secs, 0).single() {
                Some(ts) => Some(ts),
                None => {
                    warn!(value = %number, "expires_at timestamp out of range, treating as no expiry");
                    None
                }
            }
        }
        Value::String(text) => parse_expiry_str(text),
        other => {
            warn!(value = %other, "unsupported expires_at value, treating as no expiry");
            None
        }
    }
}

fn parse_expiry_str(text: &str) -> Option<DateTime<Utc>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return date
            .and_hms_opt(0, 0, 0)
            .map(|naive| Utc.from_utc_datetime(&naive));
    }

    if let Ok(secs) = trimmed.parse::<i64>() {
        return Utc.timestamp_opt(secs, 0).single();
    }

    warn!(value = trimmed, "unparseable expires_at, treating as no expiry");
    None
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hash_is_stable_hex() {
        let digest = hash_credential("api-key-123");
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, hash_credential("api-key-123"));
        assert_ne!(digest, hash_credential("api-key-124"));
    }

    #[test]
    fn test_expiry_numeric_and_iso() {
        let unix = parse_expiry(&json!(1_767_225_600)).unwrap();
        assert_eq!(unix.timestamp(), 1_767_225_600);

        let rfc3339 = parse_expiry(&json!("2026-01-01T00:00:00Z")).unwrap();
        assert_eq!(rfc3339.timestamp(), 1_767_225_600);

        // Naive datetime is treated as UTC.
        let naive = parse_expiry(&json!("2026-01-01T00:00:00")).unwrap();
        assert_eq!(naive, rfc3339);

        let date_only = parse_expiry(&json!("2026-01-01")).unwrap();
        assert_eq!(date_only, rfc3339);
    }

    #[test]
    fn test_malformed_expiry_is_dropped() {
        assert!(parse_expiry(&json!("next tuesday")).is_none());
        assert!(parse_expiry(&json!(null)).is_none());
        assert!(parse_expiry(&json!(["2026"])).is_none());
    }

    #[test]
    fn test_entry_without_hash_or_key_is_skipped() {
        let text = r#"{"api_keys": [
            {"user_id": "orphan", "tier": 2},
            {"key": "raw-secret", "user_id": "alice", "tier": 3,
             "scopes": ["memory_access", "memory_access", "analytics"]}
        ]}"#;
        let mut entries = HashMap::new();
        merge_document(&mut entries, text, "inline");

        assert_eq!(entries.len(), 1);
        let entry = entries.get(&hash_credential("raw-secret")).unwrap();
        assert_eq!(entry.owner_id, "alice");
        assert_eq!(entry.tier, Tier(3));
        // Duplicates collapsed, order preserved.
        assert_eq!(entry.scopes, vec!["memory_access", "analytics"]);
        assert_eq!(entry.attributes.get("source").map(String::as_str), Some("inline"));
    }

    #[test]
    fn test_extra_fields_land_in_attributes() {
        let text = r#"{"api_keys": [
            {"hash": "AABB", "user_id": "bob", "team": "dreams", "quota": 42}
        ]}"#;
        let mut entries = HashMap::new();
        merge_document(&mut entries, text, "file");

        let entry = entries.get("aabb").unwrap();
        assert_eq!(entry.attributes.get("team").map(String::as_str), Some("dreams"));
        assert_eq!(entry.attributes.get("quota").map(String::as_str), Some("42"));
    }

    #[test]
    fn test_source_precedence() {
        let config = RegistryConfig {
            inline_json: Some(
                r#"{"api_keys": [{"hash": "cc", "user_id": "inline-user", "tier": 4}]}"#
                    .to_string(),
            ),
            hash_list: Some("cc, dd".to_string()),
            ..Default::default()
        };

        let loaded = load(&config);
        assert!(loaded.configured);
        assert_eq!(loaded.entries.len(), 2);
        // The inline document wins over the hash-list for "cc".
        assert_eq!(loaded.entries.get("cc").unwrap().owner_id, "inline-user");
        assert_eq!(loaded.entries.get("dd").unwrap().tier, Tier::FLOOR);
    }

    #[test]
    fn test_malformed_document_is_absent_not_fatal() {
        let config = RegistryConfig {
            inline_json: Some("{not json".to_string()),
            ..Default::default()
        };
        let loaded = load(&config);
        assert!(loaded.configured);
        assert!(loaded.entries.is_empty());
    }

    #[test]
    fn test_no_sources_means_unconfigured() {
        let loaded = load(&RegistryConfig::default());
        assert!(!loaded.configured);
        assert!(loaded.entries.is_empty());
    }
}
