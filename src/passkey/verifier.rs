//! Attestation-verifier boundary.
//!
//! The cryptographic half of WebAuthn (challenge signing, attestation and
//! assertion verification, origin and RP-ID checks) belongs to a dedicated
//! library behind this trait. This crate owns the ceremony state machine
//! around it; options and client responses stay opaque JSON blobs whose wire
//! format is defined by the WebAuthn specification.

use serde::{Deserialize, Serialize};

use crate::passkey::credential::{AuthenticatorInfo, Credential};
use crate::types::Result;

/// Public-key creation/request options returned to the client, as produced
/// by the WebAuthn library.
pub type CeremonyOptions = serde_json::Value;

/// Opaque client response blob (attestation or assertion).
pub type ClientResponse = serde_json::Value;

/// Stable identity of the registering or asserting user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserHandle {
    /// Stable account identifier (never a transient token).
    pub id: String,
    /// Account name, typically the email address.
    pub name: String,
    /// Name shown by authenticator UI.
    pub display_name: String,
}

impl UserHandle {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: id.into(),
            display_name: name.clone(),
            name,
        }
    }
}

/// Authenticator-selection policy for registration ceremonies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationPolicy {
    /// "platform" or "cross-platform".
    pub authenticator_attachment: String,
    /// Resident-key requirement ("required" / "preferred" / "discouraged").
    pub resident_key: String,
    /// User-verification requirement.
    pub user_verification: String,
    /// Attestation conveyance preference.
    pub attestation: String,
}

impl Default for RegistrationPolicy {
    /// Platform authenticator, resident key and user verification required,
    /// direct attestation preferred.
    fn default() -> Self {
        Self {
            authenticator_attachment: "platform".to_string(),
            resident_key: "required".to_string(),
            user_verification: "required".to_string(),
            attestation: "direct".to_string(),
        }
    }
}

/// Reference to an already-registered credential, sent as the
/// allowed-credential list at login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialDescriptor {
    /// Base64url authenticator handle.
    pub credential_id: String,
}

impl From<&Credential> for CredentialDescriptor {
    fn from(cred: &Credential) -> Self {
        Self {
            credential_id: cred.credential_id.clone(),
        }
    }
}

/// Credential material extracted from a verified attestation response.
#[derive(Debug, Clone)]
pub struct RegisteredCredential {
    pub credential_id: String,
    pub public_key: Vec<u8>,
    pub attestation_type: String,
    pub authenticator: AuthenticatorInfo,
}

/// Result of a verified login assertion.
#[derive(Debug, Clone)]
pub struct MatchedCredential {
    /// Handle of the credential that produced the assertion.
    pub credential_id: String,
    /// Post-assertion signature counter.
    pub sign_count: u32,
    /// Set by the verifier when the counter did not increase (possible
    /// cloned authenticator). Login is not rejected for this alone.
    pub clone_warning: bool,
}

/// Wraps the WebAuthn library's four ceremony halves.
///
/// Error contract: cryptographic, origin or RP-ID failures surface as
/// [`crate::VaultGuardError::AttestationFailed`] (registration) or
/// [`crate::VaultGuardError::AuthenticationFailed`] (login). A response that
/// does not belong to the supplied session state - the ceremony it was
/// created for has been superseded - surfaces as
/// [`crate::VaultGuardError::NoSessionFound`].
pub trait AttestationVerifier: Send + Sync {
    /// Produce creation options and opaque session state for a registration
    /// ceremony.
    fn begin_registration(
        &self,
        user: &UserHandle,
        policy: &RegistrationPolicy,
    ) -> Result<(CeremonyOptions, Vec<u8>)>;

    /// Verify an attestation response against stored session state.
    fn finish_registration(
        &self,
        state: &[u8],
        response: &ClientResponse,
    ) -> Result<RegisteredCredential>;

    /// Produce request options and opaque session state for a login
    /// ceremony. `allowed` may be empty, in which case the library falls
    /// back to its username-less (discoverable credential) flow.
    fn begin_login(
        &self,
        user: &UserHandle,
        allowed: &[CredentialDescriptor],
    ) -> Result<(CeremonyOptions, Vec<u8>)>;

    /// Verify an assertion response against stored session state and the
    /// user's known credentials.
    fn finish_login(
        &self,
        state: &[u8],
        response: &ClientResponse,
        known: &[Credential],
    ) -> Result<MatchedCredential>;
}
