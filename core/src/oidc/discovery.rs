//! OIDC Discovery document fetching
//!
//! Resolves the provider's `jwks_uri` from its OpenID Connect discovery document.

use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use super::jwks::get_with_deadline;
use crate::config::validate_endpoint_url;
use crate::error::{Result, VerificationError};
use crate::platform::HttpClient;

/// OIDC Discovery document (partial)
#[derive(Deserialize)]
struct DiscoveryDocument {
    issuer: String,
    jwks_uri: String,
}

/// Fetch the discovery document for an issuer and return its `jwks_uri`
pub async fn fetch_discovery(
    issuer: &str,
    http: &dyn HttpClient,
    timeout: Duration,
) -> Result<String> {
    let discovery_url = format!(
        "{}/.well-known/openid-configuration",
        issuer.trim_end_matches('/')
    );

    let response = get_with_deadline(http, &discovery_url, timeout).await?;

    if response.status != 200 {
        return Err(VerificationError::key_fetch(format!(
            "failed to fetch discovery document: HTTP {}",
            response.status
        )));
    }

    let doc: DiscoveryDocument = response
        .json()
        .map_err(|e| VerificationError::key_fetch(format!("invalid discovery document: {}", e)))?;

    // Verify issuer matches
    if doc.issuer.trim_end_matches('/') != issuer.trim_end_matches('/') {
        return Err(VerificationError::key_fetch(format!(
            "discovery issuer mismatch: expected '{}', got '{}'",
            issuer, doc.issuer
        )));
    }

    validate_endpoint_url(&doc.jwks_uri)
        .map_err(|e| VerificationError::key_fetch(format!("discovered jwks_uri rejected: {}", e)))?;

    debug!(issuer, jwks_uri = %doc.jwks_uri, "resolved jwks_uri via discovery");
    Ok(doc.jwks_uri)
}
