//! ID token verification pipeline
//!
//! Decompose, validate claims, resolve the signing key, verify the signature
//! and only then project the payload into [`VerifiedClaims`].

use std::rc::Rc;

use serde::Serialize;
use tracing::{debug, warn};

use super::claims;
use super::jwks::KeyDirectory;
use super::signature::SignatureVerifier;
use crate::config::{ClaimPolicy, VerifierConfig};
use crate::error::{ConfigError, Result, VerificationError};
use crate::jwt::{decompose, TokenClaims};
use crate::platform::{Clock, HttpClient};

/// Identity claims from a token whose signature and claims have been verified
///
/// Only [`IdTokenVerifier`] can construct this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifiedClaims {
    #[serde(rename = "sub")]
    subject: String,
    #[serde(rename = "iss")]
    issuer: String,
    #[serde(rename = "exp")]
    expires_at: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    email_verified: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    picture: Option<String>,
}

impl VerifiedClaims {
    /// Project a payload whose token has passed every check
    fn from_verified(claims: TokenClaims) -> Result<Self> {
        let subject = claims
            .sub
            .filter(|sub| !sub.is_empty())
            .ok_or_else(|| VerificationError::malformed_token("missing sub claim"))?;
        let issuer = claims
            .iss
            .ok_or_else(|| VerificationError::issuer_mismatch("missing iss claim"))?;
        let expires_at = claims
            .exp
            .ok_or_else(|| VerificationError::expired("missing exp claim"))?;

        Ok(Self {
            subject,
            issuer,
            expires_at,
            email: claims.email,
            email_verified: claims.email_verified,
            name: claims.name,
            picture: claims.picture,
        })
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn expires_at(&self) -> u64 {
        self.expires_at
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn email_verified(&self) -> Option<bool> {
        self.email_verified
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn picture(&self) -> Option<&str> {
        self.picture.as_deref()
    }
}

/// Verifies OpenID Connect ID tokens for one audience
pub struct IdTokenVerifier {
    claims: ClaimPolicy,
    signatures: SignatureVerifier,
    keys: KeyDirectory,
}

impl IdTokenVerifier {
    /// Build a verifier; `http` is the caller-owned client used for key fetches
    pub fn new(config: VerifierConfig, http: Rc<dyn HttpClient>) -> std::result::Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            signatures: SignatureVerifier::new(config.algorithms),
            keys: KeyDirectory::new(http, config.key_source, config.key_cache, config.fetch_timeout),
            claims: config.claims,
        })
    }

    /// Verify `token` at time `now` (seconds since the epoch)
    pub async fn verify(&self, token: &str, now: u64) -> Result<VerifiedClaims> {
        match self.verify_inner(token, now).await {
            Ok(verified) => {
                debug!(sub = verified.subject(), "token verified");
                Ok(verified)
            }
            Err(e) => {
                match &e {
                    VerificationError::KeyFetchError { .. } => {
                        warn!(error = e.error_key(), "token rejected: {}", e)
                    }
                    _ => debug!(error = e.error_key(), "token rejected: {}", e),
                }
                Err(e)
            }
        }
    }

    /// Verify `token` against the platform clock
    pub async fn verify_now(&self, token: &str, clock: &dyn Clock) -> Result<VerifiedClaims> {
        self.verify(token, clock.now_secs()).await
    }

    async fn verify_inner(&self, token: &str, now: u64) -> Result<VerifiedClaims> {
        // 1. Split and decode; nothing here is trusted yet
        let parts = decompose(token)?;

        // 2. Cheap claim checks before any network or crypto work
        claims::validate(&parts.claims, &self.claims, now)?;

        // 3. Reject disallowed algorithms before touching the key set
        self.signatures.allowed_algorithm(&parts.header.alg)?;

        // 4. Resolve the signing key
        let kid = parts
            .header
            .kid
            .as_deref()
            .ok_or_else(|| VerificationError::malformed_token("header has no kid"))?;
        let jwks = self.keys.key_set().await?;
        let jwk = KeyDirectory::find(&jwks, kid).ok_or_else(|| VerificationError::key_not_found(kid))?;

        // 5. Verify the signature over the exact signing input
        self.signatures
            .verify(parts.signing_input, parts.signature, jwk, &parts.header.alg)?;

        // 6. Only now may the payload be trusted
        VerifiedClaims::from_verified(parts.claims)
    }
}
