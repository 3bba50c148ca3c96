//! WebAuthn passkey ceremonies
//!
//! Provides:
//! - The credential record and its repository boundary
//! - The attestation-verifier boundary wrapping the WebAuthn library
//! - The two-phase Begin/Finish state machine for registration and login

pub mod credential;
pub mod orchestrator;
pub mod verifier;

pub use credential::{
    AuthenticatorInfo, Credential, CredentialRepository, MemoryCredentialRepository,
};
pub use orchestrator::{CeremonyConfig, CeremonyOrchestrator};
pub use verifier::{
    AttestationVerifier, CeremonyOptions, ClientResponse, CredentialDescriptor, MatchedCredential,
    RegisteredCredential, RegistrationPolicy, UserHandle,
};
