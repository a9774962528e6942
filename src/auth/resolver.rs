//! Bearer credential resolution.
//!
//! Both transports present the user token the same way:
//! `authorization: Bearer <token>`. The value is split on the first run of
//! ASCII whitespace; the scheme must be `Bearer` (any ASCII case) and the
//! token must be a single non-empty word.

use super::{CredentialError, TokenCodec, UserId, AUTHORIZATION_KEY};
use axum::http::HeaderMap;
use std::collections::HashMap;

/// Read access to inbound call metadata with case-insensitive keys.
pub trait CallMetadata {
    /// Raw value bytes for `key`, if present. `key` is lowercase.
    fn get_raw(&self, key: &str) -> Option<&[u8]>;
}

impl CallMetadata for HeaderMap {
    fn get_raw(&self, key: &str) -> Option<&[u8]> {
        self.get(key).map(|value| value.as_bytes())
    }
}

/// RPC metadata as carried in the request envelope.
///
/// An exact (lowercase) key wins. Otherwise, among keys that differ only in
/// case, the lexicographically smallest one is used, so the choice never
/// depends on map iteration order.
impl CallMetadata for HashMap<String, String> {
    fn get_raw(&self, key: &str) -> Option<&[u8]> {
        if let Some(value) = self.get(key) {
            return Some(value.as_bytes());
        }
        self.iter()
            .filter(|(name, _)| name.eq_ignore_ascii_case(key))
            .min_by(|(a, _), (b, _)| a.cmp(b))
            .map(|(_, value)| value.as_bytes())
    }
}

/// Turns the authorization entry of a call into a verified principal.
#[derive(Debug, Clone)]
pub struct PrincipalResolver {
    codec: TokenCodec,
}

impl PrincipalResolver {
    pub fn new(codec: TokenCodec) -> Self {
        Self { codec }
    }

    pub fn resolve(&self, metadata: &impl CallMetadata) -> Result<UserId, CredentialError> {
        let raw = metadata
            .get_raw(AUTHORIZATION_KEY)
            .ok_or(CredentialError::Missing)?;
        let value = std::str::from_utf8(raw)
            .map_err(|_| CredentialError::Malformed("authorization is not valid text"))?;
        let token = parse_bearer(value)?;
        self.codec.verify(token)
    }
}

/// Extract the token from a `Bearer <token>` value.
pub fn parse_bearer(value: &str) -> Result<&str, CredentialError> {
    let value = value.trim();
    let Some((scheme, rest)) = value.split_once(|c: char| c.is_ascii_whitespace()) else {
        return Err(CredentialError::Malformed("expected `<scheme> <token>`"));
    };
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(CredentialError::Malformed("unsupported authorization scheme"));
    }
    let token = rest.trim_start();
    if token.is_empty() || token.contains(|c: char| c.is_ascii_whitespace()) {
        return Err(CredentialError::Malformed("expected a single token"));
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::token::DEFAULT_TOKEN_TTL;
    use crate::auth::InvalidReason;
    use axum::http::HeaderValue;

    fn resolver() -> (TokenCodec, PrincipalResolver) {
        let codec = TokenCodec::new(b"0123456789abcdef0123456789abcdef", DEFAULT_TOKEN_TTL);
        (codec.clone(), PrincipalResolver::new(codec))
    }

    #[test]
    fn parse_bearer_accepts_any_scheme_case() {
        assert_eq!(parse_bearer("Bearer abc").unwrap(), "abc");
        assert_eq!(parse_bearer("bearer abc").unwrap(), "abc");
        assert_eq!(parse_bearer("BEARER   abc ").unwrap(), "abc");
    }

    #[test]
    fn parse_bearer_rejects_malformed_values() {
        for value in ["", "abc", "Bearer", "Bearer ", "Basic abc", "Bearer a b"] {
            assert!(
                matches!(parse_bearer(value), Err(CredentialError::Malformed(_))),
                "value {value:?}"
            );
        }
    }

    #[test]
    fn resolves_principal_from_headers() {
        let (codec, resolver) = resolver();
        let mut headers = HeaderMap::new();
        let value = format!("Bearer {}", codec.issue(UserId(11)));
        headers.insert("Authorization", HeaderValue::from_str(&value).unwrap());
        assert_eq!(resolver.resolve(&headers).unwrap(), UserId(11));
    }

    #[test]
    fn resolves_principal_from_rpc_metadata_any_key_case() {
        let (codec, resolver) = resolver();
        let mut metadata = HashMap::new();
        metadata.insert(
            "AUTHORIZATION".to_string(),
            format!("Bearer {}", codec.issue(UserId(12))),
        );
        assert_eq!(resolver.resolve(&metadata).unwrap(), UserId(12));
    }

    #[test]
    fn lowercase_key_wins_over_other_spellings() {
        let (codec, resolver) = resolver();
        let mut metadata = HashMap::new();
        metadata.insert(
            "authorization".to_string(),
            format!("Bearer {}", codec.issue(UserId(21))),
        );
        metadata.insert(
            "Authorization".to_string(),
            format!("Bearer {}", codec.issue(UserId(22))),
        );
        metadata.insert("AUTHORIZATION".to_string(), "Bearer junk".to_string());
        for _ in 0..16 {
            assert_eq!(resolver.resolve(&metadata).unwrap(), UserId(21));
        }
    }

    #[test]
    fn mixed_case_duplicates_resolve_the_same_way_every_time() {
        let mut metadata = HashMap::new();
        metadata.insert("Authorization".to_string(), "first".to_string());
        metadata.insert("AUTHORIZATION".to_string(), "second".to_string());
        metadata.insert("AuThOrIzAtIoN".to_string(), "third".to_string());
        // "AUTHORIZATION" sorts first
        for _ in 0..16 {
            assert_eq!(metadata.get_raw(AUTHORIZATION_KEY), Some(&b"second"[..]));
        }
    }

    #[test]
    fn missing_entry_is_missing_credential() {
        let (_, resolver) = resolver();
        assert_eq!(
            resolver.resolve(&HeaderMap::new()),
            Err(CredentialError::Missing)
        );
        assert_eq!(
            resolver.resolve(&HashMap::<String, String>::new()),
            Err(CredentialError::Missing)
        );
    }

    #[test]
    fn bare_token_without_scheme_is_malformed() {
        let (codec, resolver) = resolver();
        let mut metadata = HashMap::new();
        metadata.insert("authorization".to_string(), codec.issue(UserId(1)));
        assert!(matches!(
            resolver.resolve(&metadata),
            Err(CredentialError::Malformed(_))
        ));
    }

    #[test]
    fn invalid_token_propagates_unchanged() {
        let (_, resolver) = resolver();
        let mut metadata = HashMap::new();
        metadata.insert("authorization".to_string(), "Bearer x.y.z".to_string());
        assert_eq!(
            resolver.resolve(&metadata),
            Err(CredentialError::Invalid(InvalidReason::MalformedToken))
        );
    }
}
