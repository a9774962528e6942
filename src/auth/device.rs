//! Device pre-shared secret validation.
//!
//! A device secret identifies a trusted client installation (the sorting
//! robot, the mobile app), not an end user. Secrets are kept only as SHA-256
//! digests (hex-encoded), never plaintext, and checked by membership.

use super::{constant_time_eq, CallMetadata, CredentialError, InvalidReason, DEVICE_SECRET_KEY};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Default)]
pub struct DeviceValidator {
    digests: Vec<String>,
}

fn hash_device_secret(value: &str) -> String {
    hex::encode(Sha256::digest(value.as_bytes()))
}

impl DeviceValidator {
    /// Blank entries are skipped; config validation rejects them earlier.
    pub fn new<S: AsRef<str>>(secrets: &[S]) -> Self {
        Self {
            digests: secrets
                .iter()
                .map(|s| s.as_ref().trim())
                .filter(|s| !s.is_empty())
                .map(hash_device_secret)
                .collect(),
        }
    }

    pub fn from_config(auth: &crate::config::AuthConfig) -> Self {
        Self::new(&auth.device_secrets)
    }

    pub fn len(&self) -> usize {
        self.digests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.digests.is_empty()
    }

    pub fn validate(&self, metadata: &impl CallMetadata) -> Result<(), CredentialError> {
        let raw = metadata
            .get_raw(DEVICE_SECRET_KEY)
            .ok_or(CredentialError::Missing)?;
        let value = std::str::from_utf8(raw)
            .map_err(|_| CredentialError::Malformed("device secret is not valid text"))?;
        let provided = hash_device_secret(value.trim());

        // Compare against every entry so timing does not reveal the match position.
        let mut matched = false;
        for digest in &self.digests {
            matched |= constant_time_eq(provided.as_bytes(), digest.as_bytes());
        }

        if matched {
            Ok(())
        } else {
            Err(CredentialError::Invalid(InvalidReason::UnknownDevice))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn metadata(secret: &str) -> HashMap<String, String> {
        HashMap::from([(DEVICE_SECRET_KEY.to_string(), secret.to_string())])
    }

    #[test]
    fn configured_secret_is_accepted() {
        let validator = DeviceValidator::new(&["robot-1", "phone-app"]);
        assert!(validator.validate(&metadata("phone-app")).is_ok());
        assert!(validator.validate(&metadata("robot-1")).is_ok());
    }

    #[test]
    fn unknown_secret_is_invalid() {
        let validator = DeviceValidator::new(&["robot-1"]);
        assert_eq!(
            validator.validate(&metadata("robot-2")),
            Err(CredentialError::Invalid(InvalidReason::UnknownDevice))
        );
    }

    #[test]
    fn absent_header_is_missing() {
        let validator = DeviceValidator::new(&["robot-1"]);
        assert_eq!(
            validator.validate(&HashMap::<String, String>::new()),
            Err(CredentialError::Missing)
        );
    }

    #[test]
    fn empty_configuration_accepts_nothing() {
        let validator = DeviceValidator::new::<&str>(&[]);
        assert!(validator.is_empty());
        assert!(validator.validate(&metadata("")).is_err());
        assert!(validator.validate(&metadata("anything")).is_err());
    }

    #[test]
    fn blank_entries_are_ignored() {
        let validator = DeviceValidator::new(&["  ", "robot-1"]);
        assert_eq!(validator.len(), 1);
        assert!(validator.validate(&metadata("")).is_err());
    }

    #[test]
    fn secrets_are_not_kept_in_plaintext() {
        let validator = DeviceValidator::new(&["robot-1"]);
        assert!(!format!("{validator:?}").contains("robot-1"));
    }
}
