//! Error types for token verification and configuration
//!
//! Every [`VerificationError`] is a normal rejection of the presented token.
//! Messages carry enough context for logs but never the token or signature.

use thiserror::Error;

/// Result type alias for verification operations
pub type Result<T> = std::result::Result<T, VerificationError>;

/// Reasons a token is rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerificationError {
    #[error("malformed encoding: {message}")]
    MalformedEncoding { message: String },

    #[error("malformed token: {message}")]
    MalformedToken { message: String },

    #[error("key fetch failed: {message}")]
    KeyFetchError { message: String },

    #[error("signing key '{kid}' not found")]
    KeyNotFound { kid: String },

    #[error("unsupported algorithm '{alg}'")]
    UnsupportedAlgorithm { alg: String },

    #[error("token expired: {message}")]
    ClaimExpired { message: String },

    #[error("audience mismatch: {message}")]
    ClaimAudienceMismatch { message: String },

    #[error("issuer mismatch: {message}")]
    ClaimIssuerMismatch { message: String },

    #[error("token not yet valid: {message}")]
    ClaimNotYetValid { message: String },

    #[error("invalid signature")]
    InvalidSignature,
}

impl VerificationError {
    pub fn malformed_encoding(message: impl Into<String>) -> Self {
        Self::MalformedEncoding {
            message: message.into(),
        }
    }

    pub fn malformed_token(message: impl Into<String>) -> Self {
        Self::MalformedToken {
            message: message.into(),
        }
    }

    pub fn key_fetch(message: impl Into<String>) -> Self {
        Self::KeyFetchError {
            message: message.into(),
        }
    }

    pub fn key_not_found(kid: impl Into<String>) -> Self {
        Self::KeyNotFound { kid: kid.into() }
    }

    pub fn unsupported_algorithm(alg: impl Into<String>) -> Self {
        Self::UnsupportedAlgorithm { alg: alg.into() }
    }

    pub fn expired(message: impl Into<String>) -> Self {
        Self::ClaimExpired {
            message: message.into(),
        }
    }

    pub fn audience_mismatch(message: impl Into<String>) -> Self {
        Self::ClaimAudienceMismatch {
            message: message.into(),
        }
    }

    pub fn issuer_mismatch(message: impl Into<String>) -> Self {
        Self::ClaimIssuerMismatch {
            message: message.into(),
        }
    }

    pub fn not_yet_valid(message: impl Into<String>) -> Self {
        Self::ClaimNotYetValid {
            message: message.into(),
        }
    }

    /// Stable identifier for this error kind, for logs and transport mapping
    pub fn error_key(&self) -> &'static str {
        match self {
            Self::MalformedEncoding { .. } => "malformed_encoding",
            Self::MalformedToken { .. } => "malformed_token",
            Self::KeyFetchError { .. } => "key_fetch_error",
            Self::KeyNotFound { .. } => "key_not_found",
            Self::UnsupportedAlgorithm { .. } => "unsupported_algorithm",
            Self::ClaimExpired { .. } => "claim_expired",
            Self::ClaimAudienceMismatch { .. } => "claim_audience_mismatch",
            Self::ClaimIssuerMismatch { .. } => "claim_issuer_mismatch",
            Self::ClaimNotYetValid { .. } => "claim_not_yet_valid",
            Self::InvalidSignature => "invalid_signature",
        }
    }
}

/// Construction-time configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} not configured")]
    Missing { name: String },

    #[error("invalid value for {name}: {message}")]
    Invalid { name: String, message: String },

    #[error("invalid endpoint URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("unknown algorithm '{0}'")]
    UnknownAlgorithm(String),

    #[error("symmetric algorithm '{0}' cannot be verified against a public key set")]
    SymmetricAlgorithm(String),

    #[error("{0} allow-list must not be empty")]
    EmptyAllowList(&'static str),
}

impl ConfigError {
    pub fn missing(name: impl Into<String>) -> Self {
        Self::Missing { name: name.into() }
    }

    pub fn invalid(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn invalid_url(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            message: message.into(),
        }
    }
}
