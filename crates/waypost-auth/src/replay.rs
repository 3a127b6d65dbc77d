//! At-most-once acceptance of token identifiers.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Sweep the cache once it holds this many entries.
const SWEEP_THRESHOLD: usize = 4096;

/// An expiring set of accepted token identifiers.
///
/// Each entry maps a `jti` to the epoch second at which it may be accepted
/// again. Check-and-insert is atomic, so two concurrent requests bearing the
/// same `jti` cannot both pass. Expired entries are reclaimed lazily: on
/// re-use of the same key, and by a bulk sweep once the map grows past a
/// threshold.
#[derive(Debug, Default)]
pub struct ReplayCache {
    entries: DashMap<String, u64>,
}

impl ReplayCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically record `jti` as seen until `now + ttl_secs`.
    ///
    /// Returns `true` if the identifier was fresh (the token is accepted) and
    /// `false` if it was already present and unexpired (a replay).
    pub fn check_and_insert(&self, jti: &str, now: u64, ttl_secs: u64) -> bool {
        let expires_at = now.saturating_add(ttl_secs);
        let fresh = match self.entries.entry(jti.to_owned()) {
            Entry::Occupied(mut occupied) => {
                if *occupied.get() <= now {
                    occupied.insert(expires_at);
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(expires_at);
                true
            }
        };

        if fresh && self.entries.len() > SWEEP_THRESHOLD {
            self.sweep(now);
        }
        fresh
    }

    /// Drop every entry whose window has elapsed.
    pub fn sweep(&self, now: u64) {
        self.entries.retain(|_, expires_at| *expires_at > now);
    }

    /// Number of live entries (including any not yet swept).
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
