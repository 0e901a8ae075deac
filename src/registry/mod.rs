//! Key registry cache with TTL-based refresh
//!
//! Resolves an opaque credential to tier/scope/expiry metadata without
//! re-parsing the backing sources on every call. One mutex guards the
//! whole staleness-check → reload → read sequence: readers never observe
//! a half-merged map, and concurrent callers after the interval elapses
//! trigger exactly one reload. Reload is a synchronous lazy pull; the
//! cache owns no background threads.
//!
//! # Examples
//!
//! ```
//! use tiergate::{KeyRegistryCache, KeyLookup, RegistryConfig};
//!
//! let config = RegistryConfig {
//!     inline_json: Some(r#"{"api_keys": [{"key": "demo-key", "user_id": "alice", "tier": 3}]}"#.to_string()),
//!     ..Default::default()
//! };
//! let cache = KeyRegistryCache::new(config);
//!
//! assert!(cache.is_configured());
//! match cache.lookup("demo-key") {
//!     KeyLookup::Present { entry, active } => {
//!         assert!(active);
//!         assert_eq!(entry.owner_id, "alice");
//!     }
//!     KeyLookup::Unknown => unreachable!(),
//! }
//! assert_eq!(cache.lookup("wrong-key"), KeyLookup::Unknown);
//! ```

mod sources;

pub use sources::hash_credential;

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

use crate::config::RegistryConfig;
use crate::types::{KeyLookup, RegistryEntry};

/// Clock abstraction so tests can control staleness
pub trait Clock: Send + Sync {
    /// Current time
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock implementation used outside tests
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Mutable cache state; replaced wholesale on every reload
#[derive(Debug, Default)]
struct RegistryState {
    entries: HashMap<String, RegistryEntry>,
    last_loaded: Option<DateTime<Utc>>,
    configured: bool,
    load_cycles: u64,
}

/// Process-wide credential metadata cache.
///
/// Construct one instance at startup and share it across requests; there
/// is no implicit global. See the module docs for refresh semantics.
pub struct KeyRegistryCache {
    config: RegistryConfig,
    clock: Box<dyn Clock>,
    state: Mutex<RegistryState>,
}

impl KeyRegistryCache {
    /// Create a cache using the system clock
    pub fn new(config: RegistryConfig) -> Self {
        Self::with_clock(config, Box::new(SystemClock))
    }

    /// Create a cache with an injected clock
    pub fn with_clock(config: RegistryConfig, clock: Box<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            state: Mutex::new(RegistryState::default()),
        }
    }

    /// Look up a raw credential.
    ///
    /// The credential is hashed before any comparison; the raw value never
    /// reaches the map or the logs. `Unknown` means the hash was never
    /// loaded, distinct from a present-but-inactive entry.
    pub fn lookup(&self, raw_credential: &str) -> KeyLookup {
        self.lookup_hash(&hash_credential(raw_credential))
    }

    /// Look up a pre-hashed credential (hash-list deployments).
    pub fn lookup_hash(&self, key_hash: &str) -> KeyLookup {
        let now = self.clock.now();
        let mut state = self.lock();
        self.refresh_if_stale(&mut state, now);
        match state.entries.get(&key_hash.trim().to_lowercase()) {
            Some(entry) => KeyLookup::Present {
                active: entry.is_active(now),
                entry: entry.clone(),
            },
            None => KeyLookup::Unknown,
        }
    }

    /// Whether the cache was pointed at any backing source, even an empty
    /// one. Callers use this to tell "auth is disabled" apart from
    /// "credential truly invalid".
    pub fn is_configured(&self) -> bool {
        let now = self.clock.now();
        let mut state = self.lock();
        self.refresh_if_stale(&mut state, now);
        state.configured
    }

    /// Force the next call to reload regardless of TTL.
    pub fn invalidate(&self) {
        self.lock().last_loaded = None;
    }

    /// Number of entries in the current load cycle.
    pub fn entry_count(&self) -> usize {
        let now = self.clock.now();
        let mut state = self.lock();
        self.refresh_if_stale(&mut state, now);
        state.entries.len()
    }

    /// Number of completed reloads. Exposed for freshness tests and
    /// operational introspection.
    pub fn load_cycles(&self) -> u64 {
        self.lock().load_cycles
    }

    // A poisoned lock only means another thread panicked mid-call; state
    // transitions are whole-map replacements, so the data is still
    // consistent and the guard can be recovered.
    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn refresh_if_stale(&self, state: &mut RegistryState, now: DateTime<Utc>) {
        let interval = chrono::Duration::from_std(self.config.refresh_interval)
            .unwrap_or_else(|_| chrono::Duration::zero());
        let stale = match state.last_loaded {
            Some(loaded) => now - loaded >= interval,
            None => true,
        };
        if !stale {
            return;
        }

        let loaded = sources::load(&self.config);
        state.entries = loaded.entries;
        state.configured = loaded.configured;
        state.last_loaded = Some(now);
        state.load_cycles += 1;
        debug!(
            cycle = state.load_cycles,
            entries = state.entries.len(),
            "key registry refreshed"
        );
    }
}
