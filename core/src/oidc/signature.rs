//! Signature verification
//!
//! The header's `alg` is attacker controlled. It selects a verification
//! primitive only after it has been matched against the configured allow-list
//! and against the type of the key it claims to be signed with.

use std::str::FromStr;

use jsonwebtoken::jwk::{AlgorithmParameters, EllipticCurve, Jwk, KeyAlgorithm, PublicKeyUse};
use jsonwebtoken::{crypto, Algorithm, DecodingKey};
use tracing::debug;

use crate::error::{Result, VerificationError};
use crate::jwt::codec;

/// Verifies token signatures for a fixed set of asymmetric algorithms
#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    allowed: Vec<Algorithm>,
}

impl SignatureVerifier {
    pub fn new(allowed: Vec<Algorithm>) -> Self {
        Self { allowed }
    }

    /// Map a header `alg` onto an allowed algorithm
    pub fn allowed_algorithm(&self, alg: &str) -> Result<Algorithm> {
        Algorithm::from_str(alg)
            .ok()
            .filter(|parsed| self.allowed.contains(parsed))
            .ok_or_else(|| VerificationError::unsupported_algorithm(alg))
    }

    /// Verify `signature` (base64url) over `signing_input` with `jwk`
    pub fn verify(&self, signing_input: &str, signature: &str, jwk: &Jwk, alg: &str) -> Result<()> {
        let algorithm = self.allowed_algorithm(alg)?;
        ensure_key_matches_algorithm(jwk, algorithm)?;

        let key = DecodingKey::from_jwk(jwk).map_err(|e| {
            debug!(error = %e, "unusable JWK");
            VerificationError::InvalidSignature
        })?;

        // Re-encode so padded input reaches the crypto layer in canonical form
        let raw = codec::decode(signature).map_err(|_| VerificationError::InvalidSignature)?;
        let canonical = codec::encode(&raw);

        match crypto::verify(&canonical, signing_input.as_bytes(), &key, algorithm) {
            Ok(true) => Ok(()),
            Ok(false) => Err(VerificationError::InvalidSignature),
            Err(e) => {
                debug!(error = %e, "signature check errored");
                Err(VerificationError::InvalidSignature)
            }
        }
    }
}

fn ensure_key_matches_algorithm(jwk: &Jwk, alg: Algorithm) -> Result<()> {
    if matches!(jwk.common.public_key_use, Some(PublicKeyUse::Encryption)) {
        debug!("JWK is marked for encryption");
        return Err(VerificationError::InvalidSignature);
    }

    if let Some(declared) = jwk.common.key_algorithm {
        if declared_algorithm(declared) != Some(alg) {
            debug!(declared = ?declared, token_alg = ?alg, "JWK alg mismatch");
            return Err(VerificationError::InvalidSignature);
        }
    }

    let fits = match (&jwk.algorithm, alg) {
        (
            AlgorithmParameters::RSA(_),
            Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512,
        ) => true,
        (AlgorithmParameters::EllipticCurve(params), Algorithm::ES256) => {
            params.curve == EllipticCurve::P256
        }
        (AlgorithmParameters::EllipticCurve(params), Algorithm::ES384) => {
            params.curve == EllipticCurve::P384
        }
        (AlgorithmParameters::OctetKeyPair(params), Algorithm::EdDSA) => {
            params.curve == EllipticCurve::Ed25519
        }
        _ => false,
    };

    if !fits {
        debug!(token_alg = ?alg, "JWK key type does not fit algorithm");
        return Err(VerificationError::InvalidSignature);
    }
    Ok(())
}

fn declared_algorithm(key_alg: KeyAlgorithm) -> Option<Algorithm> {
    match key_alg {
        KeyAlgorithm::RS256 => Some(Algorithm::RS256),
        KeyAlgorithm::RS384 => Some(Algorithm::RS384),
        KeyAlgorithm::RS512 => Some(Algorithm::RS512),
        KeyAlgorithm::PS256 => Some(Algorithm::PS256),
        KeyAlgorithm::PS384 => Some(Algorithm::PS384),
        KeyAlgorithm::PS512 => Some(Algorithm::PS512),
        KeyAlgorithm::ES256 => Some(Algorithm::ES256),
        KeyAlgorithm::ES384 => Some(Algorithm::ES384),
        KeyAlgorithm::EdDSA => Some(Algorithm::EdDSA),
        _ => None,
    }
}
