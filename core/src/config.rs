//! Verifier configuration
//!
//! Everything the verifier trusts is fixed here at construction time: the
//! audience, the issuer and algorithm allow-lists and where signing keys come
//! from. Nothing in a presented token can widen these.

use std::str::FromStr;
use std::time::Duration;

use jsonwebtoken::Algorithm;

use crate::error::ConfigError;
use crate::platform::Environment;

/// Google's published signing keys
pub const GOOGLE_JWKS_URI: &str = "https://www.googleapis.com/oauth2/v3/certs";

/// Both issuer spellings Google puts in ID tokens
pub const GOOGLE_ISSUERS: [&str; 2] = ["accounts.google.com", "https://accounts.google.com"];

/// Default key set TTL when the provider sends no usable Cache-Control (1 hour)
pub const DEFAULT_KEYS_TTL_SECS: u64 = 3600;

/// Lower bound on key set TTL, limits refetch rate (1 minute)
pub const MIN_KEYS_TTL_SECS: u64 = 60;

/// Upper bound on key set TTL, limits staleness after rotation (24 hours)
pub const MAX_KEYS_TTL_SECS: u64 = 24 * 60 * 60;

/// Default deadline for a key set or discovery fetch
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;

/// Where the verifier obtains the provider's signing keys
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    /// Fixed JWKS endpoint
    Jwks(String),
    /// Resolve `jwks_uri` from `{issuer}/.well-known/openid-configuration`
    Discovery { issuer: String },
}

/// Key set caching behaviour
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCachePolicy {
    /// When false every verification fetches a fresh key set
    pub enabled: bool,
    pub default_ttl: Duration,
    pub min_ttl: Duration,
    pub max_ttl: Duration,
    /// How long a discovered `jwks_uri` is reused
    pub discovery_ttl: Duration,
}

impl Default for KeyCachePolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            default_ttl: Duration::from_secs(DEFAULT_KEYS_TTL_SECS),
            min_ttl: Duration::from_secs(MIN_KEYS_TTL_SECS),
            max_ttl: Duration::from_secs(MAX_KEYS_TTL_SECS),
            discovery_ttl: Duration::from_secs(DEFAULT_KEYS_TTL_SECS),
        }
    }
}

impl KeyCachePolicy {
    /// Always fetch, never cache
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

/// Claim rules beyond signature verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimPolicy {
    pub audience: String,
    pub issuers: Vec<String>,
    /// Clock skew tolerated on every time comparison
    pub leeway_secs: u64,
    /// Reject tokens whose `nbf` lies in the future
    pub check_not_before: bool,
    /// Reject tokens whose `iat` lies in the future
    pub check_issued_at: bool,
}

/// Complete verifier configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifierConfig {
    pub claims: ClaimPolicy,
    pub algorithms: Vec<Algorithm>,
    pub key_source: KeySource,
    pub key_cache: KeyCachePolicy,
    pub fetch_timeout: Duration,
}

impl VerifierConfig {
    /// Configuration with RS256 only, caching on and time checks enabled
    pub fn new(
        audience: impl Into<String>,
        issuers: impl IntoIterator<Item = impl Into<String>>,
        key_source: KeySource,
    ) -> Self {
        Self {
            claims: ClaimPolicy {
                audience: audience.into(),
                issuers: issuers.into_iter().map(Into::into).collect(),
                leeway_secs: 0,
                check_not_before: true,
                check_issued_at: true,
            },
            algorithms: vec![Algorithm::RS256],
            key_source,
            key_cache: KeyCachePolicy::default(),
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
        }
    }

    /// Preset for Google Sign-In ID tokens issued to `client_id`
    pub fn google(client_id: impl Into<String>) -> Self {
        Self::new(
            client_id,
            GOOGLE_ISSUERS,
            KeySource::Jwks(GOOGLE_JWKS_URI.to_string()),
        )
    }

    /// Replace the algorithm allow-list from names such as `"RS256"`
    pub fn with_algorithms(mut self, names: &[&str]) -> Result<Self, ConfigError> {
        self.algorithms = parse_algorithms(names.iter().copied())?;
        Ok(self)
    }

    /// Load configuration from platform environment
    pub fn from_env(env: &dyn Environment) -> Result<Self, ConfigError> {
        let audience = required(env, "IDTOKEN_AUDIENCE")?;
        let issuers = split_list(&required(env, "IDTOKEN_ISSUERS")?);

        let key_source = match (
            env.get_var("IDTOKEN_JWKS_URI"),
            env.get_var("IDTOKEN_DISCOVERY_ISSUER"),
        ) {
            (Some(uri), _) if !uri.trim().is_empty() => KeySource::Jwks(uri.trim().to_string()),
            (_, Some(issuer)) if !issuer.trim().is_empty() => KeySource::Discovery {
                issuer: issuer.trim().to_string(),
            },
            _ => return Err(ConfigError::missing("IDTOKEN_JWKS_URI or IDTOKEN_DISCOVERY_ISSUER")),
        };

        let mut config = Self::new(audience, issuers, key_source);

        if let Some(algs) = env.get_var("IDTOKEN_ALGORITHMS") {
            config.algorithms = parse_algorithms(split_list(&algs).iter().map(String::as_str))?;
        }
        if let Some(value) = env.get_var("IDTOKEN_CACHE_KEYS") {
            config.key_cache.enabled = parse_bool("IDTOKEN_CACHE_KEYS", &value)?;
        }
        if let Some(value) = env.get_var("IDTOKEN_KEYS_TTL_SECS") {
            config.key_cache.default_ttl =
                Duration::from_secs(parse_u64("IDTOKEN_KEYS_TTL_SECS", &value)?);
        }
        if let Some(value) = env.get_var("IDTOKEN_FETCH_TIMEOUT_SECS") {
            config.fetch_timeout =
                Duration::from_secs(parse_u64("IDTOKEN_FETCH_TIMEOUT_SECS", &value)?);
        }
        if let Some(value) = env.get_var("IDTOKEN_LEEWAY_SECS") {
            config.claims.leeway_secs = parse_u64("IDTOKEN_LEEWAY_SECS", &value)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check internal consistency; called by the verifier constructor
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.claims.audience.trim().is_empty() {
            return Err(ConfigError::missing("audience"));
        }
        if self.claims.issuers.iter().all(|i| i.trim().is_empty()) {
            return Err(ConfigError::EmptyAllowList("issuer"));
        }
        if self.algorithms.is_empty() {
            return Err(ConfigError::EmptyAllowList("algorithm"));
        }
        if let Some(alg) = self.algorithms.iter().find(|alg| is_symmetric(**alg)) {
            return Err(ConfigError::SymmetricAlgorithm(format!("{:?}", alg)));
        }
        if self.fetch_timeout.is_zero() {
            return Err(ConfigError::invalid("fetch_timeout", "must be positive"));
        }
        if self.key_cache.min_ttl > self.key_cache.max_ttl {
            return Err(ConfigError::invalid("key_cache", "min_ttl exceeds max_ttl"));
        }
        match &self.key_source {
            KeySource::Jwks(uri) => validate_endpoint_url(uri)?,
            KeySource::Discovery { issuer } => validate_endpoint_url(issuer)?,
        }
        Ok(())
    }
}

fn required(env: &dyn Environment, name: &str) -> Result<String, ConfigError> {
    env.get_var(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigError::missing(name))
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_bool(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::invalid(name, format!("'{}' is not a boolean", other))),
    }
}

fn parse_u64(name: &str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::invalid(name, format!("'{}' is not a number", value.trim())))
}

fn parse_algorithms<'a>(names: impl Iterator<Item = &'a str>) -> Result<Vec<Algorithm>, ConfigError> {
    let mut algorithms = Vec::new();
    for name in names {
        let alg =
            Algorithm::from_str(name).map_err(|_| ConfigError::UnknownAlgorithm(name.to_string()))?;
        if is_symmetric(alg) {
            return Err(ConfigError::SymmetricAlgorithm(name.to_string()));
        }
        if !algorithms.contains(&alg) {
            algorithms.push(alg);
        }
    }
    if algorithms.is_empty() {
        return Err(ConfigError::EmptyAllowList("algorithm"));
    }
    Ok(algorithms)
}

fn is_symmetric(alg: Algorithm) -> bool {
    matches!(alg, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512)
}

/// Validate an endpoint or issuer URL per RFC 8414 and OpenID Connect Core 1.0
pub(crate) fn validate_endpoint_url(endpoint: &str) -> Result<(), ConfigError> {
    let url = url::Url::parse(endpoint)
        .map_err(|e| ConfigError::invalid_url(endpoint, e.to_string()))?;

    let is_localhost = matches!(
        url.host_str(),
        Some("localhost") | Some("127.0.0.1") | Some("[::1]")
    );
    if url.scheme() != "https" && !(url.scheme() == "http" && is_localhost) {
        return Err(ConfigError::invalid_url(endpoint, "must use HTTPS"));
    }

    if url.fragment().is_some() {
        return Err(ConfigError::invalid_url(endpoint, "must not have a fragment"));
    }

    if !url.username().is_empty() || url.password().is_some() {
        return Err(ConfigError::invalid_url(endpoint, "must not have userinfo"));
    }

    Ok(())
}
