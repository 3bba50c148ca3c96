//! Authenticated encryption of single vault secrets.
//!
//! # Algorithm
//!
//! AES-256-GCM: 32-byte key, 12-byte random nonce, 16-byte auth tag appended
//! to the ciphertext. The nonce is generated fresh from the OS CSPRNG on
//! every call; uniqueness rests on 96 bits of randomness, not a counter.
//!
//! # Security
//!
//! Decryption failure is reported as a single generic
//! [`VaultGuardError::AuthenticationFailed`] whether the ciphertext was
//! tampered with, the nonce was altered, or the key is wrong. Callers must
//! not be given an oracle to tell these apart.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};

use crate::types::{Result, VaultGuardError};

// =============================================================================
// Constants
// =============================================================================

/// Required key length for AES-256 (32 bytes).
pub const KEY_LEN: usize = 32;

/// Nonce length for AES-GCM (12 bytes).
pub const NONCE_LEN: usize = 12;

/// GCM auth tag length (16 bytes).
pub const TAG_LEN: usize = 16;

// =============================================================================
// Encrypted Record
// =============================================================================

/// One encrypted secret as stored at rest.
///
/// Both fields are standard base64. The nonce must be kept alongside the
/// ciphertext; it is required for decryption and replaced wholesale whenever
/// the secret is re-encrypted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedRecord {
    /// Base64 ciphertext (plaintext length + 16-byte auth tag).
    pub ciphertext: String,
    /// Base64 12-byte nonce, unique per encryption under a given key.
    pub nonce: String,
}

// =============================================================================
// Encryption / Decryption
// =============================================================================

/// Encrypt a plaintext secret under a 32-byte key.
///
/// A fresh random nonce is generated for every call.
///
/// # Errors
///
/// - [`VaultGuardError::InvalidKeyLength`] if the key is not exactly 32
///   bytes (checked before any cipher work)
/// - [`VaultGuardError::VaultCrypto`] if the cipher itself fails
pub fn encrypt(plaintext: &[u8], key: &[u8]) -> Result<EncryptedRecord> {
    if key.len() != KEY_LEN {
        return Err(VaultGuardError::InvalidKeyLength(key.len()));
    }

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|_| VaultGuardError::VaultCrypto("encryption failed".into()))?;

    Ok(EncryptedRecord {
        ciphertext: BASE64.encode(ciphertext),
        nonce: BASE64.encode(nonce),
    })
}

/// Decrypt a stored record under a 32-byte key.
///
/// # Errors
///
/// - [`VaultGuardError::InvalidKeyLength`] if the key is not exactly 32
///   bytes (checked before any cipher work)
/// - [`VaultGuardError::AuthenticationFailed`] for everything else: bad
///   base64, wrong nonce length, tampered ciphertext, wrong key
pub fn decrypt(record: &EncryptedRecord, key: &[u8]) -> Result<Vec<u8>> {
    if key.len() != KEY_LEN {
        return Err(VaultGuardError::InvalidKeyLength(key.len()));
    }

    // Any malformed input is treated the same as a failed auth tag.
    let ciphertext = BASE64
        .decode(&record.ciphertext)
        .map_err(|_| VaultGuardError::AuthenticationFailed)?;
    let nonce_bytes = BASE64
        .decode(&record.nonce)
        .map_err(|_| VaultGuardError::AuthenticationFailed)?;
    if nonce_bytes.len() != NONCE_LEN {
        return Err(VaultGuardError::AuthenticationFailed);
    }

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    cipher
        .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_slice())
        .map_err(|_| VaultGuardError::AuthenticationFailed)
}
