//! Passkey credential records and their repository boundary.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{Result, VaultGuardError};

/// Authenticator properties tracked per credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatorInfo {
    /// Authenticator model identifier (base64 AAGUID).
    pub aaguid: String,
    /// Monotonic signature counter reported by the authenticator.
    pub sign_count: u32,
    /// Set when a login reported a non-increasing counter (possible clone).
    pub clone_warning: bool,
    /// Whether the credential may be synced to other devices.
    pub backup_eligible: bool,
}

/// A registered passkey credential.
///
/// Owned by exactly one user; `credential_id` (the opaque authenticator
/// handle, base64url) is unique across all users.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub id: Uuid,
    pub user_id: String,
    pub credential_id: String,
    pub public_key: Vec<u8>,
    pub attestation_type: String,
    pub authenticator: AuthenticatorInfo,
    /// Friendly name supplied by the client at registration.
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Persistence boundary for credentials.
///
/// Implementations must enforce `credential_id` uniqueness at the storage
/// layer.
#[async_trait]
pub trait CredentialRepository: Send + Sync {
    /// All credentials owned by a user.
    async fn find_by_user(&self, user_id: &str) -> Result<Vec<Credential>>;

    /// Persist a newly registered credential.
    async fn store(&self, credential: &Credential) -> Result<()>;

    /// Update an existing credential (signature counter, clone warning).
    async fn update(&self, credential: &Credential) -> Result<()>;

    /// Delete a credential by its record id.
    async fn delete(&self, id: Uuid) -> Result<()>;
}

/// In-process [`CredentialRepository`] for tests and development.
#[derive(Default)]
pub struct MemoryCredentialRepository {
    by_id: DashMap<Uuid, Credential>,
}

impl MemoryCredentialRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

#[async_trait]
impl CredentialRepository for MemoryCredentialRepository {
    async fn find_by_user(&self, user_id: &str) -> Result<Vec<Credential>> {
        let mut creds: Vec<Credential> = self
            .by_id
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .map(|entry| entry.clone())
            .collect();
        creds.sort_by_key(|c| c.created_at);
        Ok(creds)
    }

    async fn store(&self, credential: &Credential) -> Result<()> {
        let duplicate = self
            .by_id
            .iter()
            .any(|entry| entry.credential_id == credential.credential_id);
        if duplicate {
            return Err(VaultGuardError::Storage(
                "credential id already exists".to_string(),
            ));
        }
        self.by_id.insert(credential.id, credential.clone());
        Ok(())
    }

    async fn update(&self, credential: &Credential) -> Result<()> {
        match self.by_id.get_mut(&credential.id) {
            Some(mut entry) => {
                *entry = credential.clone();
                Ok(())
            }
            None => Err(VaultGuardError::Storage(
                "credential not found".to_string(),
            )),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.by_id
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| VaultGuardError::Storage("credential not found".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential(user_id: &str, credential_id: &str) -> Credential {
        let now = Utc::now();
        Credential {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            credential_id: credential_id.to_string(),
            public_key: vec![1, 2, 3],
            attestation_type: "none".to_string(),
            authenticator: AuthenticatorInfo {
                aaguid: "AAAA".to_string(),
                sign_count: 0,
                clone_warning: false,
                backup_eligible: false,
            },
            name: "Laptop".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_store_and_find_by_user() {
        let repo = MemoryCredentialRepository::new();

        repo.store(&credential("user-1", "cred-a")).await.unwrap();
        repo.store(&credential("user-1", "cred-b")).await.unwrap();
        repo.store(&credential("user-2", "cred-c")).await.unwrap();

        assert_eq!(repo.find_by_user("user-1").await.unwrap().len(), 2);
        assert_eq!(repo.find_by_user("user-2").await.unwrap().len(), 1);
        assert!(repo.find_by_user("user-3").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_credential_id_uniqueness_enforced() {
        let repo = MemoryCredentialRepository::new();

        repo.store(&credential("user-1", "cred-a")).await.unwrap();
        // Same handle, even for a different user, is rejected.
        let err = repo.store(&credential("user-2", "cred-a")).await;
        assert!(matches!(err, Err(VaultGuardError::Storage(_))));
    }

    #[tokio::test]
    async fn test_update_sign_count() {
        let repo = MemoryCredentialRepository::new();
        let mut cred = credential("user-1", "cred-a");
        repo.store(&cred).await.unwrap();

        cred.authenticator.sign_count = 7;
        repo.update(&cred).await.unwrap();

        let found = repo.find_by_user("user-1").await.unwrap();
        assert_eq!(found[0].authenticator.sign_count, 7);
    }

    #[tokio::test]
    async fn test_delete() {
        let repo = MemoryCredentialRepository::new();
        let cred = credential("user-1", "cred-a");
        repo.store(&cred).await.unwrap();

        repo.delete(cred.id).await.unwrap();
        assert!(repo.find_by_user("user-1").await.unwrap().is_empty());
        assert!(repo.delete(cred.id).await.is_err());
    }
}
