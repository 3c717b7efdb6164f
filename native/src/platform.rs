//! Native platform implementations
//!
//! Implements core platform traits using native Rust libraries:
//! - HttpClient: reqwest
//! - Clock: std::time::SystemTime
//! - Environment: std::env

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use idtoken_core::error::{Result, VerificationError};
use idtoken_core::platform::{Clock, Environment, HttpClient, HttpResponse};

/// Largest provider document accepted (JWKS and discovery documents are a few KB)
const MAX_BODY_SIZE: usize = 1024 * 1024;

/// reqwest-based HTTP client
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    pub fn new() -> std::result::Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(3))
            .connect_timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait(?Send)]
impl HttpClient for ReqwestHttpClient {
    async fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<HttpResponse> {
        let mut builder = self.client.get(url);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let mut response = builder
            .send()
            .await
            .map_err(|e| VerificationError::key_fetch(format!("HTTP GET failed: {}", e)))?;

        let status = response.status().as_u16();
        let headers = collect_headers(response.headers());

        if let Some(declared) = response.content_length() {
            if declared > MAX_BODY_SIZE as u64 {
                return Err(body_too_large());
            }
        }

        let mut body = BodyBuffer::new(MAX_BODY_SIZE);
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| VerificationError::key_fetch(format!("failed to read response: {}", e)))?
        {
            body.push(&chunk)?;
        }
        let body = body.into_inner();

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

/// Response body accumulator that refuses to grow past `limit`
struct BodyBuffer {
    limit: usize,
    bytes: Vec<u8>,
}

impl BodyBuffer {
    fn new(limit: usize) -> Self {
        Self {
            limit,
            bytes: Vec::new(),
        }
    }

    fn push(&mut self, chunk: &[u8]) -> Result<()> {
        if self.bytes.len() + chunk.len() > self.limit {
            return Err(body_too_large());
        }
        self.bytes.extend_from_slice(chunk);
        Ok(())
    }

    fn into_inner(self) -> Vec<u8> {
        self.bytes
    }
}

fn body_too_large() -> VerificationError {
    VerificationError::key_fetch(format!(
        "response body exceeds {} bytes",
        MAX_BODY_SIZE
    ))
}

/// Flatten response headers, skipping values that are not visible ASCII
fn collect_headers(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}

/// System clock using std::time
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_secs()
    }
}

/// Process environment variables
pub struct ProcessEnv;

impl Environment for ProcessEnv {
    fn get_var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}
