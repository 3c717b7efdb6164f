//! JWKS (JSON Web Key Set) handling
//!
//! Fetches the provider's signing keys and, when enabled, caches them per
//! endpoint. The cache TTL follows the provider's `Cache-Control` header
//! within configured bounds. Concurrent misses on the same endpoint share a
//! single fetch.

use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use jsonwebtoken::jwk::{Jwk, JwkSet};
use moka::future::Cache;
use moka::Expiry;
use tracing::{debug, info, warn};

use super::discovery::fetch_discovery;
use crate::config::{KeyCachePolicy, KeySource};
use crate::error::{Result, VerificationError};
use crate::platform::{HttpClient, HttpResponse};

const ACCEPT_JSON: (&str, &str) = ("Accept", "application/json");
const USER_AGENT: (&str, &str) = ("User-Agent", "idtoken-rust");

/// Key set plus the freshness window the provider granted it
#[derive(Debug, Clone)]
struct CachedKeySet {
    jwks: Arc<JwkSet>,
    ttl: Duration,
}

/// Per-entry expiry driven by the provider's cache policy
struct KeySetExpiry;

impl Expiry<String, CachedKeySet> for KeySetExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CachedKeySet,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Source of the identity provider's public signing keys
pub struct KeyDirectory {
    http: Rc<dyn HttpClient>,
    source: KeySource,
    policy: KeyCachePolicy,
    timeout: Duration,
    key_sets: Option<Cache<String, CachedKeySet>>,
    discovered: Option<Cache<String, String>>,
}

impl KeyDirectory {
    pub fn new(
        http: Rc<dyn HttpClient>,
        source: KeySource,
        policy: KeyCachePolicy,
        timeout: Duration,
    ) -> Self {
        let (key_sets, discovered) = if policy.enabled {
            (
                Some(
                    Cache::builder()
                        .max_capacity(16)
                        .expire_after(KeySetExpiry)
                        .build(),
                ),
                Some(
                    Cache::builder()
                        .max_capacity(16)
                        .time_to_live(policy.discovery_ttl)
                        .build(),
                ),
            )
        } else {
            (None, None)
        };

        Self {
            http,
            source,
            policy,
            timeout,
            key_sets,
            discovered,
        }
    }

    /// Fetch the current key set from the network, bypassing any cache
    pub async fn fetch(&self) -> Result<JwkSet> {
        let uri = self.resolve_jwks_uri().await?;
        let response = self.fetch_document(&uri).await?;
        parse_jwks(&response)
    }

    /// Key set to verify against: cached while fresh, otherwise fetched
    ///
    /// A `kid` missing from a fresh key set is not a reason to refetch; the
    /// caller reports it as not found until the entry expires.
    pub async fn key_set(&self) -> Result<Arc<JwkSet>> {
        let uri = self.resolve_jwks_uri().await?;

        let Some(cache) = &self.key_sets else {
            let response = self.fetch_document(&uri).await?;
            return parse_jwks(&response).map(Arc::new);
        };

        cache
            .try_get_with(uri.clone(), self.fetch_for_cache(&uri))
            .await
            .map(|cached| cached.jwks)
            .map_err(|e| (*e).clone())
    }

    /// Find a key by its identifier
    pub fn find<'a>(jwks: &'a JwkSet, kid: &str) -> Option<&'a Jwk> {
        jwks.find(kid)
    }

    async fn fetch_for_cache(&self, uri: &str) -> Result<CachedKeySet> {
        let response = self.fetch_document(uri).await?;
        let jwks = parse_jwks(&response)?;
        let ttl = ttl_from_headers(&response, &self.policy);
        info!(
            jwks_uri = uri,
            keys = jwks.keys.len(),
            ttl_secs = ttl.as_secs(),
            "refreshed signing keys"
        );
        Ok(CachedKeySet {
            jwks: Arc::new(jwks),
            ttl,
        })
    }

    async fn fetch_document(&self, uri: &str) -> Result<HttpResponse> {
        let response = get_with_deadline(self.http.as_ref(), uri, self.timeout).await?;
        if response.status != 200 {
            warn!(jwks_uri = uri, status = response.status, "JWKS fetch rejected");
            return Err(VerificationError::key_fetch(format!(
                "failed to fetch JWKS: HTTP {}",
                response.status
            )));
        }
        Ok(response)
    }

    async fn resolve_jwks_uri(&self) -> Result<String> {
        let issuer = match &self.source {
            KeySource::Jwks(uri) => return Ok(uri.clone()),
            KeySource::Discovery { issuer } => issuer,
        };

        match &self.discovered {
            Some(cache) => cache
                .try_get_with(
                    issuer.clone(),
                    fetch_discovery(issuer, self.http.as_ref(), self.timeout),
                )
                .await
                .map_err(|e| (*e).clone()),
            None => fetch_discovery(issuer, self.http.as_ref(), self.timeout).await,
        }
    }
}

/// GET a JSON document, failing with `KeyFetchError` once `timeout` elapses
pub(super) async fn get_with_deadline(
    http: &dyn HttpClient,
    url: &str,
    timeout: Duration,
) -> Result<HttpResponse> {
    debug!(url, "fetching provider document");
    match tokio::time::timeout(timeout, http.get(url, &[ACCEPT_JSON, USER_AGENT])).await {
        Ok(Ok(response)) => Ok(response),
        Ok(Err(e)) => {
            warn!(url, error = %e, "provider request failed");
            Err(VerificationError::key_fetch(e.to_string()))
        }
        Err(_) => {
            warn!(url, timeout_ms = timeout.as_millis() as u64, "provider request timed out");
            Err(VerificationError::key_fetch(format!(
                "request timed out after {}ms",
                timeout.as_millis()
            )))
        }
    }
}

fn parse_jwks(response: &HttpResponse) -> Result<JwkSet> {
    response
        .json()
        .map_err(|e| VerificationError::key_fetch(format!("invalid JWKS: {}", e)))
}

/// Freshness window from `Cache-Control` and `Age`, clamped to policy bounds
fn ttl_from_headers(response: &HttpResponse, policy: &KeyCachePolicy) -> Duration {
    let Some(cache_control) = response.header("cache-control") else {
        return bounded(policy.default_ttl, policy);
    };

    let mut max_age = None;
    for directive in cache_control.split(',').map(str::trim) {
        let lower = directive.to_ascii_lowercase();
        if lower == "no-store" || lower == "no-cache" {
            return policy.min_ttl;
        }
        if let Some(value) = lower.strip_prefix("max-age=") {
            max_age = value.trim_matches('"').parse::<u64>().ok();
        }
    }

    let Some(max_age) = max_age else {
        return bounded(policy.default_ttl, policy);
    };

    let age = response
        .header("age")
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(0);

    bounded(Duration::from_secs(max_age.saturating_sub(age)), policy)
}

fn bounded(ttl: Duration, policy: &KeyCachePolicy) -> Duration {
    ttl.max(policy.min_ttl).min(policy.max_ttl)
}
