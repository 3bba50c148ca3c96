//! VaultGuard - security core for an encrypted credential vault
//!
//! Provides the security-critical subsystems of a password vault with
//! passkey second-factor authentication:
//!
//! - **Crypto**: AES-256-GCM at-rest encryption of vault secrets with a
//!   process-wide master key
//! - **Limiter**: atomic per-user, per-route rate limiting
//! - **Challenge**: short-lived storage for in-flight WebAuthn ceremony state
//! - **Passkey**: the two-phase registration/login ceremony state machine
//! - **Vault**: encrypt-on-write / decrypt-on-read entry handling
//!
//! HTTP transport, relational persistence, identity-provider token
//! verification and the WebAuthn cryptography itself live behind
//! collaborator traits and are not implemented here.

pub mod challenge;
pub mod config;
pub mod crypto;
pub mod limiter;
pub mod passkey;
pub mod types;
pub mod vault;

pub use challenge::{CeremonyPurpose, ChallengeStore};
pub use config::{Args, RateQuota, RelyingParty};
pub use crypto::{EncryptedRecord, MasterKey, MasterKeyCell};
pub use limiter::{CounterStore, MemoryCounterStore, RateDecision, RateLimiter};
pub use passkey::{
    AttestationVerifier, CeremonyConfig, CeremonyOrchestrator, Credential, CredentialRepository,
    MemoryCredentialRepository, RegistrationPolicy, UserHandle,
};
pub use types::{Result, VaultGuardError};
pub use vault::{MemoryVaultStore, VaultCache, VaultCrypto, VaultEntry, VaultStore};
