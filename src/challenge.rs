//! Short-lived storage for in-flight ceremony state.
//!
//! Each entry is keyed by (purpose, user) and holds the opaque session blob
//! produced by the WebAuthn library between Begin and Finish. Entries expire
//! after their TTL even without explicit deletion, so abandoned ceremonies
//! clean themselves up. Writing to an occupied key silently discards the
//! previous state: only one concurrent ceremony per purpose per user is
//! supported, and starting a second Begin invalidates the first's Finish.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::debug;

/// Which ceremony a stored challenge belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CeremonyPurpose {
    Register,
    Login,
}

impl std::fmt::Display for CeremonyPurpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CeremonyPurpose::Register => f.write_str("register"),
            CeremonyPurpose::Login => f.write_str("login"),
        }
    }
}

struct StoredChallenge {
    state: Vec<u8>,
    expires_at: Instant,
}

impl StoredChallenge {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// TTL'd key/value store for ceremony state.
///
/// Expiry is enforced lazily on read plus an explicit [`ChallengeStore::cleanup`]
/// sweep for callers that run one periodically.
#[derive(Default)]
pub struct ChallengeStore {
    entries: DashMap<String, StoredChallenge>,
}

impl ChallengeStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(purpose: CeremonyPurpose, user_id: &str) -> String {
        format!("webauthn:{}:{}", purpose, user_id)
    }

    /// Store ceremony state, overwriting any prior entry for the same
    /// (purpose, user).
    pub fn put(&self, purpose: CeremonyPurpose, user_id: &str, state: Vec<u8>, ttl: Duration) {
        let key = Self::key(purpose, user_id);
        let replaced = self
            .entries
            .insert(
                key,
                StoredChallenge {
                    state,
                    expires_at: Instant::now() + ttl,
                },
            )
            .is_some();
        if replaced {
            debug!(purpose = %purpose, user_id = %user_id, "superseded pending ceremony");
        }
    }

    /// Read ceremony state without consuming it.
    ///
    /// Returns `None` for missing or expired entries; expired entries are
    /// removed on the way out.
    pub fn get(&self, purpose: CeremonyPurpose, user_id: &str) -> Option<Vec<u8>> {
        let key = Self::key(purpose, user_id);
        if let Some(entry) = self.entries.get(&key) {
            if entry.is_expired() {
                drop(entry);
                self.entries.remove(&key);
                return None;
            }
            return Some(entry.state.clone());
        }
        None
    }

    /// Atomically consume and return ceremony state.
    ///
    /// This is the serialization point for concurrent Finish calls racing
    /// against one pending challenge: exactly one caller receives the state,
    /// every other caller observes `None`.
    pub fn take(&self, purpose: CeremonyPurpose, user_id: &str) -> Option<Vec<u8>> {
        let key = Self::key(purpose, user_id);
        let (_, entry) = self.entries.remove(&key)?;
        if entry.is_expired() {
            return None;
        }
        Some(entry.state)
    }

    /// Delete any entry for (purpose, user). Returns whether one existed.
    pub fn delete(&self, purpose: CeremonyPurpose, user_id: &str) -> bool {
        self.entries.remove(&Self::key(purpose, user_id)).is_some()
    }

    /// Remove all expired entries. Returns the number removed.
    pub fn cleanup(&self) -> usize {
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            if entry.is_expired() {
                removed += 1;
                false
            } else {
                true
            }
        });
        if removed > 0 {
            debug!(entries_removed = removed, "cleaned up expired ceremony challenges");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
