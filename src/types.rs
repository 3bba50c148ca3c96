//! Error types shared across the crate.

use std::time::Duration;

use thiserror::Error;

/// Crate-wide error type.
///
/// Authentication-adjacent variants (`AuthenticationFailed`,
/// `AttestationFailed`) deliberately carry no detail: callers must not be
/// able to distinguish a wrong key from tampered data or an unknown
/// credential.
#[derive(Debug, Error)]
pub enum VaultGuardError {
    /// Encryption key has the wrong length (must be exactly 32 bytes).
    #[error("invalid key length: expected 32 bytes, got {0}")]
    InvalidKeyLength(usize),

    /// Master key could not be loaded from configuration.
    ///
    /// Fatal for any caller that needs vault crypto; the failure is cached
    /// for the process lifetime and never retried.
    #[error("master key configuration error: {0}")]
    KeyConfiguration(String),

    /// Generic authentication failure (decrypt or login assertion).
    #[error("authentication failed")]
    AuthenticationFailed,

    /// Registration attestation could not be verified.
    #[error("attestation verification failed")]
    AttestationFailed,

    /// User already has the maximum number of registered devices.
    #[error("device registration limit reached")]
    DeviceLimitReached,

    /// The authenticator presented at registration-finish is already
    /// registered for this user.
    #[error("device already registered")]
    DeviceAlreadyRegistered,

    /// No pending ceremony for this user, or the challenge expired or was
    /// already consumed. Client should restart the ceremony.
    #[error("no ceremony session found")]
    NoSessionFound,

    /// Malformed or incomplete client input.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Per-user rate limit exceeded for a route.
    #[error("rate limit exceeded, retry after {retry_after:?}")]
    RateLimitExceeded {
        /// Remaining time-to-live of the current window.
        retry_after: Duration,
    },

    /// Cipher or record-handling failure inside vault crypto.
    #[error("vault crypto failure: {0}")]
    VaultCrypto(String),

    /// Collaborator storage failure (credential repository, vault store,
    /// counter store).
    #[error("storage error: {0}")]
    Storage(String),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, VaultGuardError>;
