//! Compact JWS serialization: base64url codec and token decomposition

pub mod codec;
mod decompose;

pub use decompose::{decompose, DecomposedToken, TokenClaims, TokenHeader};
