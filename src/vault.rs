//! Vault entry crypto: encrypt-on-write, decrypt-on-read, re-encrypt-on-rotate.
//!
//! Composes the encryption engine with entry persistence. The stored record
//! is only touched after encryption succeeds, so a crypto failure never
//! leaves partial state behind. Cache invalidation after a mutation is
//! best-effort: a failure is logged and swallowed, since a stale cache entry
//! only costs one extra read from primary storage.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::crypto::engine::{decrypt, encrypt, EncryptedRecord};
use crate::crypto::master_key::MasterKey;
use crate::types::{Result, VaultGuardError};

/// One encrypted service credential owned by a vault.
#[derive(Debug, Clone)]
pub struct VaultEntry {
    pub id: Uuid,
    pub vault_id: Uuid,
    pub record: EncryptedRecord,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Persistence boundary for vault entries.
#[async_trait]
pub trait VaultStore: Send + Sync {
    async fn insert(&self, entry: &VaultEntry) -> Result<()>;

    async fn load(&self, id: Uuid) -> Result<VaultEntry>;

    /// Replace an entry's encrypted record wholesale, preserving its id.
    async fn replace_record(&self, id: Uuid, record: &EncryptedRecord) -> Result<()>;

    async fn remove(&self, id: Uuid) -> Result<()>;
}

/// Read-side cache keyed by vault, invalidated after mutations.
#[async_trait]
pub trait VaultCache: Send + Sync {
    async fn invalidate(&self, vault_id: Uuid) -> Result<()>;
}

/// In-process [`VaultStore`] for tests and development.
#[derive(Default)]
pub struct MemoryVaultStore {
    entries: DashMap<Uuid, VaultEntry>,
}

impl MemoryVaultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl VaultStore for MemoryVaultStore {
    async fn insert(&self, entry: &VaultEntry) -> Result<()> {
        self.entries.insert(entry.id, entry.clone());
        Ok(())
    }

    async fn load(&self, id: Uuid) -> Result<VaultEntry> {
        self.entries
            .get(&id)
            .map(|e| e.clone())
            .ok_or_else(|| VaultGuardError::Storage("vault entry not found".to_string()))
    }

    async fn replace_record(&self, id: Uuid, record: &EncryptedRecord) -> Result<()> {
        match self.entries.get_mut(&id) {
            Some(mut entry) => {
                entry.record = record.clone();
                entry.updated_at = Utc::now();
                Ok(())
            }
            None => Err(VaultGuardError::Storage(
                "vault entry not found".to_string(),
            )),
        }
    }

    async fn remove(&self, id: Uuid) -> Result<()> {
        self.entries
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| VaultGuardError::Storage("vault entry not found".to_string()))
    }
}

/// Vault-entry CRUD over the encryption engine.
///
/// Requires a loaded [`MasterKey`]; construction is only possible after the
/// one-time key load has succeeded.
pub struct VaultCrypto {
    key: Arc<MasterKey>,
    store: Arc<dyn VaultStore>,
    cache: Option<Arc<dyn VaultCache>>,
}

impl VaultCrypto {
    pub fn new(key: Arc<MasterKey>, store: Arc<dyn VaultStore>) -> Self {
        Self {
            key,
            store,
            cache: None,
        }
    }

    /// Attach a read-side cache to invalidate after mutations.
    pub fn with_cache(mut self, cache: Arc<dyn VaultCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Encrypt a secret and persist it as a new entry.
    pub async fn add_entry(&self, vault_id: Uuid, plaintext: &[u8]) -> Result<VaultEntry> {
        let record = encrypt(plaintext, self.key.as_bytes())?;

        let now = Utc::now();
        let entry = VaultEntry {
            id: Uuid::new_v4(),
            vault_id,
            record,
            created_at: now,
            updated_at: now,
        };
        self.store.insert(&entry).await?;

        debug!(entry_id = %entry.id, vault_id = %vault_id, "vault entry added");
        self.invalidate_cache(vault_id).await;
        Ok(entry)
    }

    /// Load and decrypt an entry.
    pub async fn read_entry(&self, id: Uuid) -> Result<Vec<u8>> {
        let entry = self.store.load(id).await?;
        decrypt(&entry.record, self.key.as_bytes())
    }

    /// Re-encrypt an entry with a fresh nonce, discarding the old
    /// ciphertext/nonce pair. The entry id is preserved; the store is only
    /// written after encryption succeeds.
    pub async fn rotate_entry(&self, id: Uuid, new_plaintext: &[u8]) -> Result<VaultEntry> {
        // Fails early if the entry is gone.
        let entry = self.store.load(id).await?;

        let record = encrypt(new_plaintext, self.key.as_bytes())?;
        self.store.replace_record(id, &record).await?;

        debug!(entry_id = %id, vault_id = %entry.vault_id, "vault entry rotated");
        self.invalidate_cache(entry.vault_id).await;

        Ok(VaultEntry {
            record,
            updated_at: Utc::now(),
            ..entry
        })
    }

    /// Delete an entry and its encrypted record.
    pub async fn delete_entry(&self, id: Uuid) -> Result<()> {
        let entry = self.store.load(id).await?;
        self.store.remove(id).await?;

        debug!(entry_id = %id, vault_id = %entry.vault_id, "vault entry deleted");
        self.invalidate_cache(entry.vault_id).await;
        Ok(())
    }

    /// Best-effort cache invalidation. A stale cache is safe (the next read
    /// falls back to primary storage), so failures are logged, not raised.
    async fn invalidate_cache(&self, vault_id: Uuid) {
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.invalidate(vault_id).await {
                warn!(vault_id = %vault_id, error = %e, "vault cache invalidation failed");
            }
        }
    }
}
