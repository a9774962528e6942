//! Password hashing for user records.
//!
//! PBKDF2-HMAC-SHA256 with a per-user random salt. The encoded form is
//! `pbkdf2-sha256$<iterations>$<salt hex>$<hash hex>` so the iteration count
//! can be raised later without invalidating stored hashes.

use super::constant_time_eq;
use rand::RngCore;
use sha2::Sha256;

/// Default PBKDF2 rounds for new hashes.
pub const DEFAULT_ITERATIONS: u32 = 100_000;

/// Salt byte length for password hashing.
const SALT_BYTES: usize = 16;

const SCHEME: &str = "pbkdf2-sha256";

/// Fixed salt used to burn the same time when the account does not exist.
const DUMMY_SALT: [u8; SALT_BYTES] = [0u8; SALT_BYTES];

pub fn hash_password(password: &str, iterations: u32) -> String {
    let mut salt = [0u8; SALT_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    encode(password, &salt, iterations)
}

fn encode(password: &str, salt: &[u8], iterations: u32) -> String {
    let hash = derive(password, salt, iterations);
    format!(
        "{SCHEME}${iterations}${}${}",
        hex::encode(salt),
        hex::encode(hash)
    )
}

fn derive(password: &str, salt: &[u8], iterations: u32) -> [u8; 32] {
    pbkdf2::pbkdf2_hmac_array::<Sha256, 32>(password.as_bytes(), salt, iterations)
}

/// Check `password` against an encoded hash. Unparseable hashes never match.
pub fn verify_password(password: &str, encoded: &str) -> bool {
    let mut parts = encoded.split('$');
    let (Some(scheme), Some(iterations), Some(salt), Some(expected), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return false;
    };
    if scheme != SCHEME {
        return false;
    }
    let (Ok(iterations), Ok(salt), Ok(expected)) = (
        iterations.parse::<u32>(),
        hex::decode(salt),
        hex::decode(expected),
    ) else {
        return false;
    };
    if iterations == 0 {
        return false;
    }

    let attempt = derive(password, &salt, iterations);
    constant_time_eq(&attempt, &expected)
}

/// Spend the cost of one verification without a stored hash.
pub fn dummy_verify(password: &str, iterations: u32) {
    let _ = derive(password, &DUMMY_SALT, iterations);
}
