//! Request authentication for every inbound call.
//!
//! Provides:
//! - Signed, time-bounded session tokens (HMAC-SHA256 compact tokens, 24h TTL)
//! - Bearer credential resolution from call metadata
//! - A static per-operation policy table (Public / DeviceAuth / UserAuth)
//! - Device pre-shared secret validation
//! - The [`AuthGate`], the one decision function both transports call
//! - Password hashing for user records (PBKDF2-HMAC-SHA256 + per-user salt)
//!
//! ## Design Decisions
//! - The signing key and device secrets come from the immutable [`Config`]
//!   built at startup; nothing here reads the environment per call.
//! - Outward errors are collapsed by the gate. [`CredentialError`] keeps the
//!   detail for logs only.
//!
//! [`Config`]: crate::config::Config

pub mod device;
pub mod gate;
pub mod password;
pub mod policy;
pub mod principal;
pub mod resolver;
pub mod token;

pub use device::DeviceValidator;
pub use gate::AuthGate;
pub use policy::{AuthRequirement, PolicyTable};
pub use principal::{AuthenticatedCall, CallerIdentity, UserId};
pub use resolver::{CallMetadata, PrincipalResolver};
pub use token::TokenCodec;

use std::fmt;

/// Metadata key carrying `Bearer <token>` on both transports.
pub const AUTHORIZATION_KEY: &str = "authorization";

/// Metadata key carrying a raw device secret on both transports.
pub const DEVICE_SECRET_KEY: &str = "x-device-secret";

/// Why a credential was not accepted. Never shown to callers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CredentialError {
    #[error("credential missing")]
    Missing,
    #[error("credential malformed: {0}")]
    Malformed(&'static str),
    #[error("credential invalid: {0}")]
    Invalid(InvalidReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReason {
    MalformedToken,
    UnsupportedAlgorithm,
    BadSignature,
    Expired,
    UnknownDevice,
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InvalidReason::MalformedToken => "malformed token",
            InvalidReason::UnsupportedAlgorithm => "unsupported algorithm",
            InvalidReason::BadSignature => "bad signature",
            InvalidReason::Expired => "expired",
            InvalidReason::UnknownDevice => "unknown device secret",
        })
    }
}

/// Constant-time byte comparison to prevent timing attacks.
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_time_eq_works() {
        assert!(constant_time_eq(b"hello", b"hello"));
        assert!(!constant_time_eq(b"hello", b"world"));
        assert!(!constant_time_eq(b"short", b"longer"));
    }

    #[test]
    fn credential_errors_render_reason() {
        let err = CredentialError::Invalid(InvalidReason::Expired);
        assert_eq!(err.to_string(), "credential invalid: expired");
    }
}
