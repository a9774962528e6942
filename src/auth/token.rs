//! Session token codec.
//!
//! Tokens are compact three-part strings, `header.claims.signature`, each
//! part base64url without padding. The header is fixed to HS256; claims
//! carry the user id (`sub`), issue time and expiry in Unix seconds. The
//! signature is HMAC-SHA256 over `header.claims` with the process signing
//! key. There is no server-side session table: expiry is the only way a
//! token stops working.

use super::{CredentialError, InvalidReason, UserId};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

type HmacSha256 = Hmac<Sha256>;

/// Fixed session lifetime: 24 hours.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(24 * 3600);

/// Shortest signing key accepted at startup.
pub const MIN_SIGNING_KEY_BYTES: usize = 32;

const ALGORITHM: &str = "HS256";

#[derive(Deserialize)]
struct Header {
    alg: String,
}

#[derive(Deserialize)]
struct Claims {
    sub: i64,
    exp: u64,
}

/// Issues and verifies session tokens with one immutable key.
#[derive(Clone)]
pub struct TokenCodec {
    key: Arc<[u8]>,
    ttl: Duration,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("key", &"[redacted]")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl TokenCodec {
    /// Build a codec around an already validated key.
    pub fn new(signing_key: &[u8], ttl: Duration) -> Self {
        Self {
            key: Arc::from(signing_key),
            ttl,
        }
    }

    pub fn from_config(auth: &crate::config::AuthConfig) -> Self {
        Self::new(
            auth.signing_key.as_bytes(),
            Duration::from_secs(auth.token_ttl_secs),
        )
    }

    /// Issue a token for `principal` expiring `ttl` from now.
    pub fn issue(&self, principal: UserId) -> String {
        self.issue_at(principal, epoch_secs())
    }

    pub(crate) fn issue_at(&self, principal: UserId, now: u64) -> String {
        let header = serde_json::json!({ "alg": ALGORITHM, "typ": "JWT" }).to_string();
        let claims = serde_json::json!({
            "sub": principal.get(),
            "iat": now,
            "exp": now.saturating_add(self.ttl.as_secs()),
        })
        .to_string();

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header),
            URL_SAFE_NO_PAD.encode(claims)
        );
        let mut mac = self.mac();
        mac.update(signing_input.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        format!("{signing_input}.{signature}")
    }

    /// Verify signature, shape and expiry, returning the embedded principal.
    pub fn verify(&self, token: &str) -> Result<UserId, CredentialError> {
        self.verify_at(token, epoch_secs())
    }

    pub(crate) fn verify_at(&self, token: &str, now: u64) -> Result<UserId, CredentialError> {
        let invalid = |reason| CredentialError::Invalid(reason);

        let mut parts = token.split('.');
        let (Some(header_b64), Some(claims_b64), Some(signature_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid(InvalidReason::MalformedToken));
        };

        let header: Header = decode_json(header_b64).ok_or(invalid(InvalidReason::MalformedToken))?;
        if header.alg != ALGORITHM {
            return Err(invalid(InvalidReason::UnsupportedAlgorithm));
        }

        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| invalid(InvalidReason::MalformedToken))?;
        let signing_input_len = header_b64.len() + 1 + claims_b64.len();
        let mut mac = self.mac();
        mac.update(&token.as_bytes()[..signing_input_len]);
        // verify_slice compares in constant time
        mac.verify_slice(&signature)
            .map_err(|_| invalid(InvalidReason::BadSignature))?;

        let claims: Claims = decode_json(claims_b64).ok_or(invalid(InvalidReason::MalformedToken))?;
        if claims.exp <= now {
            return Err(invalid(InvalidReason::Expired));
        }

        Ok(UserId(claims.sub))
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(&self.key).expect("HMAC can accept any key length")
    }
}

fn decode_json<T: serde::de::DeserializeOwned>(part: &str) -> Option<T> {
    let bytes = URL_SAFE_NO_PAD.decode(part).ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Current Unix epoch in seconds.
pub(crate) fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &[u8] = b"0123456789abcdef0123456789abcdef";
    const OTHER_KEY: &[u8] = b"fedcba9876543210fedcba9876543210";

    fn codec() -> TokenCodec {
        TokenCodec::new(KEY, DEFAULT_TOKEN_TTL)
    }

    #[test]
    fn verify_returns_issued_principal() {
        let codec = codec();
        for id in [1, 42, i64::MAX, -3] {
            let token = codec.issue(UserId(id));
            assert_eq!(codec.verify(&token).unwrap(), UserId(id));
        }
    }

    #[test]
    fn token_is_valid_until_just_before_ttl() {
        let codec = codec();
        let token = codec.issue_at(UserId(5), 1_000);
        let last_valid = 1_000 + DEFAULT_TOKEN_TTL.as_secs() - 1;
        assert_eq!(codec.verify_at(&token, last_valid).unwrap(), UserId(5));
    }

    #[test]
    fn expired_token_fails_even_with_valid_signature() {
        let codec = codec();
        let token = codec.issue_at(UserId(5), 1_000);
        let after_expiry = 1_000 + DEFAULT_TOKEN_TTL.as_secs();
        assert_eq!(
            codec.verify_at(&token, after_expiry),
            Err(CredentialError::Invalid(InvalidReason::Expired))
        );
    }

    #[test]
    fn token_from_other_key_fails() {
        let token = TokenCodec::new(OTHER_KEY, DEFAULT_TOKEN_TTL).issue(UserId(9));
        assert_eq!(
            codec().verify(&token),
            Err(CredentialError::Invalid(InvalidReason::BadSignature))
        );
    }

    #[test]
    fn tampered_claims_fail_signature_check() {
        let codec = codec();
        let token = codec.issue(UserId(1));
        let forged = URL_SAFE_NO_PAD.encode(r#"{"sub":2,"iat":0,"exp":99999999999}"#);
        let mut parts: Vec<&str> = token.split('.').collect();
        parts[1] = &forged;
        let forged_token = parts.join(".");
        assert_eq!(
            codec.verify(&forged_token),
            Err(CredentialError::Invalid(InvalidReason::BadSignature))
        );
    }

    #[test]
    fn malformed_tokens_are_invalid() {
        let codec = codec();
        for token in ["", "abc", "a.b", "a.b.c.d", "!!.??.**"] {
            assert_eq!(
                codec.verify(token),
                Err(CredentialError::Invalid(InvalidReason::MalformedToken)),
                "token {token:?}"
            );
        }
    }

    #[test]
    fn other_algorithms_are_rejected() {
        let codec = codec();
        let token = codec.issue(UserId(1));
        let mut parts: Vec<String> = token.split('.').map(str::to_owned).collect();
        parts[0] = URL_SAFE_NO_PAD.encode(r#"{"alg":"none","typ":"JWT"}"#);
        assert_eq!(
            codec.verify(&parts.join(".")),
            Err(CredentialError::Invalid(InvalidReason::UnsupportedAlgorithm))
        );
    }

    #[test]
    fn debug_output_redacts_key() {
        let rendered = format!("{:?}", codec());
        assert!(!rendered.contains("0123456789abcdef"));
        assert!(rendered.contains("redacted"));
    }
}
