//! URL-safe base64 codec used by the compact token serialization

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;

use crate::error::{Result, VerificationError};

/// URL-safe alphabet, unpadded on encode, padding optional on decode
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Encode bytes as unpadded base64url
pub fn encode(bytes: impl AsRef<[u8]>) -> String {
    URL_SAFE_LENIENT.encode(bytes)
}

/// Decode base64url, with or without trailing `=` padding
pub fn decode(input: &str) -> Result<Vec<u8>> {
    URL_SAFE_LENIENT
        .decode(input)
        .map_err(|e| VerificationError::malformed_encoding(e.to_string()))
}
