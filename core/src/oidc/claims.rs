//! Claim validation
//!
//! Time, audience and issuer rules applied to the decoded payload. Rules run in
//! a fixed order and the first violation is reported.

use tracing::debug;

use crate::config::ClaimPolicy;
use crate::error::{Result, VerificationError};
use crate::jwt::TokenClaims;

/// Validate claims against policy at time `now` (seconds since the epoch)
pub fn validate(claims: &TokenClaims, policy: &ClaimPolicy, now: u64) -> Result<()> {
    let leeway = policy.leeway_secs;

    // A token without exp never counts as "never expires"
    let exp = claims
        .exp
        .ok_or_else(|| VerificationError::expired("missing exp claim"))?;
    if exp.saturating_add(leeway) < now {
        return Err(VerificationError::expired(format!("exp {} is before {}", exp, now)));
    }

    if !claims.aud.iter().any(|aud| aud == &policy.audience) {
        return Err(VerificationError::audience_mismatch(if claims.aud.is_empty() {
            "missing aud claim".to_string()
        } else {
            format!("token not issued for '{}'", policy.audience)
        }));
    }

    let iss = claims
        .iss
        .as_deref()
        .ok_or_else(|| VerificationError::issuer_mismatch("missing iss claim"))?;
    if !policy.issuers.iter().any(|allowed| allowed == iss) {
        return Err(VerificationError::issuer_mismatch(format!(
            "issuer '{}' is not allowed",
            iss
        )));
    }

    if policy.check_not_before {
        if let Some(nbf) = claims.nbf {
            if nbf > now.saturating_add(leeway) {
                return Err(VerificationError::not_yet_valid(format!(
                    "nbf {} is after {}",
                    nbf, now
                )));
            }
        }
    }

    if policy.check_issued_at {
        if let Some(iat) = claims.iat {
            if iat > now.saturating_add(leeway) {
                return Err(VerificationError::not_yet_valid(format!(
                    "iat {} is after {}",
                    iat, now
                )));
            }
        }
    }

    debug!(exp, "claims accepted");
    Ok(())
}
