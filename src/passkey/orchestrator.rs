//! The two-phase ceremony state machine.
//!
//! Per (purpose, user) a ceremony moves Idle -> Pending -> done. Pending is
//! exactly "a challenge exists in the store"; completion leaves no explicit
//! record beyond its side effect (credential persisted, counter updated) and
//! the absence of the challenge. A fresh Begin supersedes any pending
//! ceremony; an abandoned one times out via the store's TTL.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::challenge::{CeremonyPurpose, ChallengeStore};
use crate::passkey::credential::{Credential, CredentialRepository};
use crate::passkey::verifier::{
    AttestationVerifier, CeremonyOptions, ClientResponse, CredentialDescriptor,
    RegistrationPolicy, UserHandle,
};
use crate::types::{Result, VaultGuardError};

/// Ceremony parameters, from process configuration.
#[derive(Debug, Clone)]
pub struct CeremonyConfig {
    /// How long a Begin stays redeemable.
    pub challenge_ttl: Duration,
    /// Device cap per user.
    pub max_devices: usize,
}

impl Default for CeremonyConfig {
    fn default() -> Self {
        Self {
            challenge_ttl: Duration::from_secs(300),
            max_devices: 2,
        }
    }
}

/// Drives passkey registration and login ceremonies.
pub struct CeremonyOrchestrator {
    verifier: Arc<dyn AttestationVerifier>,
    credentials: Arc<dyn CredentialRepository>,
    challenges: Arc<ChallengeStore>,
    config: CeremonyConfig,
}

impl CeremonyOrchestrator {
    pub fn new(
        verifier: Arc<dyn AttestationVerifier>,
        credentials: Arc<dyn CredentialRepository>,
        challenges: Arc<ChallengeStore>,
        config: CeremonyConfig,
    ) -> Self {
        Self {
            verifier,
            credentials,
            challenges,
            config,
        }
    }

    /// Start a registration ceremony.
    ///
    /// # Errors
    ///
    /// [`VaultGuardError::DeviceLimitReached`] once the user owns the
    /// maximum number of credentials.
    pub async fn begin_registration(&self, user: &UserHandle) -> Result<CeremonyOptions> {
        let existing = self.credentials.find_by_user(&user.id).await?;
        if existing.len() >= self.config.max_devices {
            return Err(VaultGuardError::DeviceLimitReached);
        }

        let (options, state) = self
            .verifier
            .begin_registration(user, &RegistrationPolicy::default())?;

        self.challenges
            .put(CeremonyPurpose::Register, &user.id, state, self.config.challenge_ttl);

        debug!(user_id = %user.id, "registration ceremony started");
        Ok(options)
    }

    /// Complete a registration ceremony and persist the new credential.
    ///
    /// The pending challenge is consumed before verification, so it can
    /// never be replayed - even when persistence fails afterwards.
    pub async fn finish_registration(
        &self,
        user: &UserHandle,
        response: &ClientResponse,
        name: &str,
    ) -> Result<Credential> {
        if name.trim().is_empty() {
            return Err(VaultGuardError::InvalidRequest(
                "missing passkey name".to_string(),
            ));
        }

        let state = self
            .challenges
            .take(CeremonyPurpose::Register, &user.id)
            .ok_or(VaultGuardError::NoSessionFound)?;

        let registered = self.verifier.finish_registration(&state, response)?;

        // Idempotent double-submission protection.
        let existing = self.credentials.find_by_user(&user.id).await?;
        if existing
            .iter()
            .any(|c| c.credential_id == registered.credential_id)
        {
            return Err(VaultGuardError::DeviceAlreadyRegistered);
        }

        let now = Utc::now();
        let credential = Credential {
            id: Uuid::new_v4(),
            user_id: user.id.clone(),
            credential_id: registered.credential_id,
            public_key: registered.public_key,
            attestation_type: registered.attestation_type,
            authenticator: registered.authenticator,
            name: name.to_string(),
            created_at: now,
            updated_at: now,
        };

        self.credentials.store(&credential).await?;

        info!(
            user_id = %user.id,
            credential_id = %credential.credential_id,
            name = %credential.name,
            "passkey registered"
        );
        Ok(credential)
    }

    /// Start a login ceremony.
    ///
    /// The allowed-credential list is built from the user's stored
    /// credentials; an empty list falls through to the verifier's
    /// discoverable-credential flow.
    pub async fn begin_login(&self, user: &UserHandle) -> Result<CeremonyOptions> {
        let known = self.credentials.find_by_user(&user.id).await?;
        let allowed: Vec<CredentialDescriptor> =
            known.iter().map(CredentialDescriptor::from).collect();

        let (options, state) = self.verifier.begin_login(user, &allowed)?;

        self.challenges
            .put(CeremonyPurpose::Login, &user.id, state, self.config.challenge_ttl);

        debug!(user_id = %user.id, allowed = allowed.len(), "login ceremony started");
        Ok(options)
    }

    /// Complete a login ceremony.
    ///
    /// The challenge take is the serialization point: of two Finish calls
    /// racing for the same pending ceremony, exactly one proceeds and the
    /// other observes [`VaultGuardError::NoSessionFound`].
    pub async fn finish_login(
        &self,
        user: &UserHandle,
        response: &ClientResponse,
    ) -> Result<Credential> {
        let state = self
            .challenges
            .take(CeremonyPurpose::Login, &user.id)
            .ok_or(VaultGuardError::NoSessionFound)?;

        let known = self.credentials.find_by_user(&user.id).await?;
        let matched = self.verifier.finish_login(&state, response, &known)?;

        let mut credential = known
            .into_iter()
            .find(|c| c.credential_id == matched.credential_id)
            .ok_or(VaultGuardError::AuthenticationFailed)?;

        // Lenient counter policy: a non-increasing counter raises the clone
        // warning instead of rejecting the login.
        if matched.clone_warning {
            warn!(
                user_id = %user.id,
                credential_id = %credential.credential_id,
                "non-increasing signature counter, possible cloned authenticator"
            );
        }
        credential.authenticator.sign_count = matched.sign_count;
        credential.authenticator.clone_warning = matched.clone_warning;
        credential.updated_at = Utc::now();

        self.credentials.update(&credential).await?;

        info!(user_id = %user.id, credential_id = %credential.credential_id, "passkey login verified");
        Ok(credential)
    }

    /// List a user's registered devices.
    pub async fn list_devices(&self, user: &UserHandle) -> Result<Vec<Credential>> {
        self.credentials.find_by_user(&user.id).await
    }

    /// Remove one of the user's devices.
    ///
    /// # Errors
    ///
    /// [`VaultGuardError::InvalidRequest`] when the credential is owned by
    /// someone else or does not exist. The two cases are not distinguished,
    /// so a caller cannot probe whether a credential id exists.
    pub async fn remove_device(&self, user: &UserHandle, credential_id: Uuid) -> Result<()> {
        let owned = self.credentials.find_by_user(&user.id).await?;
        if !owned.iter().any(|c| c.id == credential_id) {
            return Err(VaultGuardError::InvalidRequest(
                "credential does not belong to this user".to_string(),
            ));
        }

        self.credentials.delete(credential_id).await?;
        info!(user_id = %user.id, %credential_id, "passkey deleted");
        Ok(())
    }
}
