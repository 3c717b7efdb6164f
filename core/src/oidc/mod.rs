//! OIDC (OpenID Connect) module
//!
//! Handles ID token verification including key discovery, JWKS fetching,
//! claim validation and signature checks.

pub mod claims;
mod discovery;
pub mod jwks;
pub mod signature;
mod verifier;

pub use discovery::fetch_discovery;
pub use jwks::KeyDirectory;
pub use signature::SignatureVerifier;
pub use verifier::{IdTokenVerifier, VerifiedClaims};
