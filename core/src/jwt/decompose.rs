//! Compact token decomposition
//!
//! Splits a `header.payload.signature` token, decodes the header and payload
//! into typed structures and keeps the exact signing input for the verifier.
//! Nothing produced here is trusted until the signature has been checked.

use serde::Deserialize;

use super::codec;
use crate::error::{Result, VerificationError};

/// JOSE header fields the verifier reads
#[derive(Debug, Clone, Deserialize)]
pub struct TokenHeader {
    /// Signing algorithm as declared by the token (attacker controlled)
    pub alg: String,

    /// Key identifier
    #[serde(default)]
    pub kid: Option<String>,

    #[serde(default)]
    pub typ: Option<String>,
}

/// Unverified payload claims
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenClaims {
    #[serde(default)]
    pub iss: Option<String>,

    #[serde(default)]
    pub sub: Option<String>,

    /// Audience (can be string or array)
    #[serde(default, deserialize_with = "deserialize_audience")]
    pub aud: Vec<String>,

    #[serde(default, deserialize_with = "deserialize_numeric_date")]
    pub exp: Option<u64>,

    #[serde(default, deserialize_with = "deserialize_numeric_date")]
    pub nbf: Option<u64>,

    #[serde(default, deserialize_with = "deserialize_numeric_date")]
    pub iat: Option<u64>,

    /// Authorized party
    #[serde(default)]
    pub azp: Option<String>,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default, deserialize_with = "deserialize_flexible_bool")]
    pub email_verified: Option<bool>,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub picture: Option<String>,
}

/// A token split into its parts
///
/// `signing_input` and `signature` borrow the raw, still-encoded segments.
#[derive(Debug, Clone)]
pub struct DecomposedToken<'a> {
    pub header: TokenHeader,
    pub claims: TokenClaims,
    pub signing_input: &'a str,
    pub signature: &'a str,
}

/// Split and decode a compact token
pub fn decompose(token: &str) -> Result<DecomposedToken<'_>> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(VerificationError::malformed_token(format!(
            "expected 3 segments, found {}",
            parts.len()
        )));
    }
    let (header_segment, payload_segment, signature) = (parts[0], parts[1], parts[2]);

    if signature.is_empty() {
        return Err(VerificationError::malformed_token("missing signature"));
    }

    let header: TokenHeader = decode_segment(header_segment, "header")?;
    let claims: TokenClaims = decode_segment(payload_segment, "payload")?;

    let signing_input = &token[..header_segment.len() + 1 + payload_segment.len()];

    Ok(DecomposedToken {
        header,
        claims,
        signing_input,
        signature,
    })
}

fn decode_segment<T: serde::de::DeserializeOwned>(segment: &str, what: &str) -> Result<T> {
    let bytes = codec::decode(segment)
        .map_err(|_| VerificationError::malformed_token(format!("{} is not base64url", what)))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| {
            VerificationError::malformed_token(format!(
                "invalid {} at line {} column {}",
                what,
                e.line(),
                e.column()
            ))
        })
}

/// Deserialize audience as either string or array
fn deserialize_audience<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::{self, Visitor};

    struct AudienceVisitor;

    impl<'de> Visitor<'de> for AudienceVisitor {
        type Value = Vec<String>;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("string or array of strings")
        }

        fn visit_str<E>(self, value: &str) -> std::result::Result<Vec<String>, E>
        where
            E: de::Error,
        {
            Ok(vec![value.to_string()])
        }

        fn visit_seq<A>(self, mut seq: A) -> std::result::Result<Vec<String>, A::Error>
        where
            A: de::SeqAccess<'de>,
        {
            let mut values = Vec::new();
            while let Some(value) = seq.next_element()? {
                values.push(value);
            }
            Ok(values)
        }
    }

    deserializer.deserialize_any(AudienceVisitor)
}

/// NumericDate: integral or fractional seconds, floored; dates before the epoch become 0
fn deserialize_numeric_date<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::{self, Visitor};

    struct NumericDateVisitor;

    impl<'de> Visitor<'de> for NumericDateVisitor {
        type Value = Option<u64>;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("seconds since the epoch")
        }

        fn visit_u64<E>(self, value: u64) -> std::result::Result<Option<u64>, E>
        where
            E: de::Error,
        {
            Ok(Some(value))
        }

        fn visit_i64<E>(self, value: i64) -> std::result::Result<Option<u64>, E>
        where
            E: de::Error,
        {
            Ok(Some(value.max(0) as u64))
        }

        fn visit_f64<E>(self, value: f64) -> std::result::Result<Option<u64>, E>
        where
            E: de::Error,
        {
            if !value.is_finite() {
                return Err(E::custom("date is not a finite number"));
            }
            // `as` saturates at u64::MAX
            Ok(Some(value.floor().max(0.0) as u64))
        }

        fn visit_unit<E>(self) -> std::result::Result<Option<u64>, E>
        where
            E: de::Error,
        {
            Ok(None)
        }

        fn visit_none<E>(self) -> std::result::Result<Option<u64>, E>
        where
            E: de::Error,
        {
            Ok(None)
        }
    }

    deserializer.deserialize_any(NumericDateVisitor)
}

/// Some providers send `email_verified` as the string "true"
fn deserialize_flexible_bool<'de, D>(deserializer: D) -> std::result::Result<Option<bool>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolOrString {
        Bool(bool),
        Str(String),
    }

    match Option::<BoolOrString>::deserialize(deserializer)? {
        None => Ok(None),
        Some(BoolOrString::Bool(b)) => Ok(Some(b)),
        Some(BoolOrString::Str(s)) => match s.as_str() {
            "true" => Ok(Some(true)),
            "false" => Ok(Some(false)),
            other => Err(serde::de::Error::custom(format!(
                "expected boolean, found '{}'",
                other
            ))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn segment(value: serde_json::Value) -> String {
        codec::encode(serde_json::to_vec(&value).unwrap())
    }

    fn token(header: serde_json::Value, payload: serde_json::Value, sig: &str) -> String {
        format!("{}.{}.{}", segment(header), segment(payload), sig)
    }

    #[test]
    fn test_decompose_valid_token() {
        let raw = token(
            json!({"alg": "RS256", "kid": "k1", "typ": "JWT"}),
            json!({"iss": "https://accounts.google.com", "sub": "42", "aud": "app", "exp": 1000}),
            "c2ln",
        );
        let parts = decompose(&raw).unwrap();

        assert_eq!(parts.header.alg, "RS256");
        assert_eq!(parts.header.kid.as_deref(), Some("k1"));
        assert_eq!(parts.claims.sub.as_deref(), Some("42"));
        assert_eq!(parts.claims.aud, vec!["app".to_string()]);
        assert_eq!(parts.claims.exp, Some(1000));
        assert_eq!(parts.signature, "c2ln");

        let dot = raw.rfind('.').unwrap();
        assert_eq!(parts.signing_input, &raw[..dot]);
    }

    #[test]
    fn test_decompose_audience_array() {
        let raw = token(
            json!({"alg": "RS256"}),
            json!({"aud": ["a", "b"]}),
            "c2ln",
        );
        let parts = decompose(&raw).unwrap();
        assert_eq!(parts.claims.aud, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_decompose_email_verified_as_string() {
        let raw = token(
            json!({"alg": "RS256"}),
            json!({"email_verified": "true"}),
            "c2ln",
        );
        assert_eq!(decompose(&raw).unwrap().claims.email_verified, Some(true));

        let raw = token(
            json!({"alg": "RS256"}),
            json!({"email_verified": "maybe"}),
            "c2ln",
        );
        assert!(matches!(
            decompose(&raw).unwrap_err(),
            VerificationError::MalformedToken { .. }
        ));
    }

    #[test]
    fn test_decompose_rejects_wrong_segment_count() {
        for raw in ["abc", "a.b", "a.b.c.d", ""] {
            let err = decompose(raw).unwrap_err();
            assert!(matches!(err, VerificationError::MalformedToken { .. }), "{}", raw);
        }
    }

    #[test]
    fn test_decompose_rejects_empty_signature() {
        let raw = token(json!({"alg": "none"}), json!({"sub": "x"}), "");
        assert!(matches!(
            decompose(&raw).unwrap_err(),
            VerificationError::MalformedToken { .. }
        ));
    }

    #[test]
    fn test_decompose_rejects_bad_base64_and_json() {
        let payload = segment(json!({"sub": "x"}));
        let bad_b64 = format!("***.{}.c2ln", payload);
        assert!(matches!(
            decompose(&bad_b64).unwrap_err(),
            VerificationError::MalformedToken { .. }
        ));

        let not_json = format!("{}.{}.c2ln", codec::encode(b"not json"), payload);
        assert!(matches!(
            decompose(&not_json).unwrap_err(),
            VerificationError::MalformedToken { .. }
        ));
    }

    #[test]
    fn test_decompose_requires_alg() {
        let raw = token(json!({"kid": "k1"}), json!({}), "c2ln");
        assert!(matches!(
            decompose(&raw).unwrap_err(),
            VerificationError::MalformedToken { .. }
        ));
    }

    #[test]
    fn test_decompose_fractional_and_negative_dates() {
        let raw = token(
            json!({"alg": "RS256"}),
            json!({"exp": 1706900100.5, "iat": 1706900000.999, "nbf": -5}),
            "c2ln",
        );
        let claims = decompose(&raw).unwrap().claims;
        assert_eq!(claims.exp, Some(1706900100));
        assert_eq!(claims.iat, Some(1706900000));
        assert_eq!(claims.nbf, Some(0));

        let raw = token(json!({"alg": "RS256"}), json!({"exp": null}), "c2ln");
        assert_eq!(decompose(&raw).unwrap().claims.exp, None);

        let raw = token(json!({"alg": "RS256"}), json!({"exp": "tomorrow"}), "c2ln");
        assert!(matches!(
            decompose(&raw).unwrap_err(),
            VerificationError::MalformedToken { .. }
        ));
    }

    #[test]
    fn test_malformed_payload_message_omits_claim_values() {
        let raw = token(
            json!({"alg": "RS256"}),
            json!({"email_verified": "<script>secret-value</script>"}),
            "c2ln",
        );
        match decompose(&raw).unwrap_err() {
            VerificationError::MalformedToken { message } => {
                assert!(message.starts_with("invalid payload"), "{}", message);
                assert!(!message.contains("secret-value"), "{}", message);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
