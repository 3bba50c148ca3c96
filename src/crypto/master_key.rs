//! Master key lifecycle.
//!
//! The vault master key is a single 32-byte symmetric key supplied as a
//! base64 string in process configuration. It is decoded at most once per
//! process; the first outcome (key or configuration error) is cached and
//! never retried. The key is zeroized when dropped.

use std::sync::OnceLock;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::engine::KEY_LEN;
use crate::types::{Result, VaultGuardError};

/// The process-wide 32-byte vault encryption key.
///
/// Read-only after construction; safe to share behind an `Arc` with any
/// number of concurrent readers.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct MasterKey {
    bytes: [u8; KEY_LEN],
}

impl MasterKey {
    /// Build a key from raw bytes. Intended for tests and key rotation
    /// tooling; production keys come from [`MasterKey::from_base64`].
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    /// Decode a key from its base64 configuration form.
    ///
    /// # Errors
    ///
    /// [`VaultGuardError::KeyConfiguration`] if the string is not valid
    /// base64 or does not decode to exactly 32 bytes.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let mut decoded = BASE64.decode(encoded.trim()).map_err(|e| {
            VaultGuardError::KeyConfiguration(format!("master key is not valid base64: {e}"))
        })?;

        if decoded.len() != KEY_LEN {
            decoded.zeroize();
            return Err(VaultGuardError::KeyConfiguration(format!(
                "master key must decode to exactly {} bytes, got {}",
                KEY_LEN,
                decoded.len()
            )));
        }

        let mut bytes = [0u8; KEY_LEN];
        bytes.copy_from_slice(&decoded);
        decoded.zeroize();
        Ok(Self { bytes })
    }

    /// Raw key bytes for the encryption engine.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material.
        f.write_str("MasterKey(..)")
    }
}

/// One-time initialization cell for the master key.
///
/// Constructed during startup and passed by reference into every component
/// that needs the key. The decode runs at most once even under concurrent
/// first use; a failed decode is cached as fatal and every later access
/// returns the same [`VaultGuardError::KeyConfiguration`].
#[derive(Default)]
pub struct MasterKeyCell {
    cell: OnceLock<std::result::Result<MasterKey, String>>,
}

impl MasterKeyCell {
    pub const fn new() -> Self {
        Self {
            cell: OnceLock::new(),
        }
    }

    /// Load the key from its base64 form, or return the cached outcome of
    /// the first load.
    pub fn load(&self, encoded: &str) -> Result<&MasterKey> {
        self.cell
            .get_or_init(|| MasterKey::from_base64(encoded).map_err(|e| e.to_string()))
            .as_ref()
            .map_err(|msg| VaultGuardError::KeyConfiguration(msg.clone()))
    }

    /// The already-loaded key, if [`MasterKeyCell::load`] succeeded earlier.
    pub fn get(&self) -> Result<&MasterKey> {
        match self.cell.get() {
            Some(Ok(key)) => Ok(key),
            Some(Err(msg)) => Err(VaultGuardError::KeyConfiguration(msg.clone())),
            None => Err(VaultGuardError::KeyConfiguration(
                "master key has not been loaded".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded_key() -> String {
        BASE64.encode([7u8; KEY_LEN])
    }

    #[test]
    fn test_from_base64_roundtrip() {
        let key = MasterKey::from_base64(&encoded_key()).unwrap();
        assert_eq!(key.as_bytes(), &[7u8; KEY_LEN]);
    }

    #[test]
    fn test_wrong_length_rejected() {
        let short = BASE64.encode([1u8; 16]);
        assert!(matches!(
            MasterKey::from_base64(&short),
            Err(VaultGuardError::KeyConfiguration(_))
        ));
    }

    #[test]
    fn test_malformed_base64_rejected() {
        assert!(matches!(
            MasterKey::from_base64("%%% not base64 %%%"),
            Err(VaultGuardError::KeyConfiguration(_))
        ));
    }

    #[test]
    fn test_cell_loads_once() {
        let cell = MasterKeyCell::new();

        let first = cell.load(&encoded_key()).unwrap().as_bytes().to_owned();
        // A second load with different input returns the cached key.
        let second = cell.load(&BASE64.encode([9u8; KEY_LEN])).unwrap();
        assert_eq!(&first, second.as_bytes());
    }

    #[test]
    fn test_cell_caches_failure() {
        let cell = MasterKeyCell::new();

        assert!(cell.load("bogus").is_err());
        // Even a valid key cannot recover a failed cell.
        assert!(cell.load(&encoded_key()).is_err());
        assert!(matches!(
            cell.get(),
            Err(VaultGuardError::KeyConfiguration(_))
        ));
    }

    #[test]
    fn test_get_before_load() {
        let cell = MasterKeyCell::new();
        assert!(cell.get().is_err());
    }

    #[test]
    fn test_debug_hides_key_material() {
        let key = MasterKey::from_bytes([42u8; KEY_LEN]);
        assert_eq!(format!("{:?}", key), "MasterKey(..)");
    }
}
