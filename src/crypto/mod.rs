//! At-rest encryption for vault secrets
//!
//! Provides:
//! - AES-256-GCM authenticated encryption of single secrets
//! - The process-wide master key and its one-time load

pub mod engine;
pub mod master_key;

pub use engine::{decrypt, encrypt, EncryptedRecord, KEY_LEN, NONCE_LEN, TAG_LEN};
pub use master_key::{MasterKey, MasterKeyCell};
