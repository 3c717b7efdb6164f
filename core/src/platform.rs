//! Platform abstraction traits
//!
//! These traits define the boundary between the platform-agnostic verifier and
//! platform-specific implementations (native reqwest client, test mocks, etc.)

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::error::Result;

/// HTTP client for outbound requests (JWKS and discovery documents)
#[async_trait(?Send)]
pub trait HttpClient {
    async fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<HttpResponse>;
}

/// HTTP response from an outbound request
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Look up a response header (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Parse body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> std::result::Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// Clock for current time (enables testing with deterministic timestamps)
pub trait Clock {
    fn now_secs(&self) -> u64;
}

/// Environment variable access
pub trait Environment {
    fn get_var(&self, name: &str) -> Option<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_lookup_ignores_case() {
        let response = HttpResponse {
            status: 200,
            headers: vec![("Cache-Control".to_string(), "max-age=60".to_string())],
            body: Vec::new(),
        };
        assert_eq!(response.header("cache-control"), Some("max-age=60"));
        assert_eq!(response.header("etag"), None);
    }
}
