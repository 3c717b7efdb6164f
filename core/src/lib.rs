//! idtoken-core: Platform-agnostic OpenID Connect ID token verification
//!
//! This crate decides whether a compact signed ID token is authentic, unexpired
//! and issued for this application, and extracts the verified identity claims.
//! It depends only on abstract platform traits (HttpClient, Clock, Environment)
//! and never imports platform-specific code.

pub mod config;
pub mod error;
pub mod jwt;
pub mod oidc;
pub mod platform;

pub use config::{ClaimPolicy, KeyCachePolicy, KeySource, VerifierConfig};
pub use error::{ConfigError, Result, VerificationError};
pub use oidc::{IdTokenVerifier, VerifiedClaims};

#[cfg(test)]
pub mod test_support;
