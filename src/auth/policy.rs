//! Static per-operation authentication requirements.

use crate::inventory::ops;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthRequirement {
    /// No credential inspected.
    Public,
    /// A configured device secret is required; no user is resolved.
    DeviceAuth,
    /// A valid session token is required.
    UserAuth,
}

/// Every operation either transport exposes, with its requirement.
pub const STANDARD_POLICY: &[(&str, AuthRequirement)] = &[
    (ops::HEALTH_CHECK, AuthRequirement::Public),
    (ops::LOGIN, AuthRequirement::Public),
    (ops::CREATE_USER, AuthRequirement::DeviceAuth),
    (ops::CREATE_LIBRARY, AuthRequirement::UserAuth),
    (ops::GET_LIBRARIES, AuthRequirement::UserAuth),
    (ops::GET_LIBRARY, AuthRequirement::UserAuth),
    (ops::DELETE_LIBRARY, AuthRequirement::UserAuth),
    (ops::CREATE_CARD, AuthRequirement::UserAuth),
    (ops::GET_CARDS, AuthRequirement::UserAuth),
    (ops::GET_CARD, AuthRequirement::UserAuth),
    (ops::MOVE_CARD, AuthRequirement::UserAuth),
    (ops::DELETE_CARD, AuthRequirement::UserAuth),
];

#[derive(Debug, thiserror::Error)]
#[error("operation {0} has more than one policy entry")]
pub struct DuplicatePolicy(pub String);

/// Immutable lookup table; unknown operations require a user.
#[derive(Debug, Clone)]
pub struct PolicyTable {
    entries: HashMap<String, AuthRequirement>,
}

impl PolicyTable {
    pub fn standard() -> Self {
        Self {
            entries: STANDARD_POLICY
                .iter()
                .map(|(op, req)| ((*op).to_string(), *req))
                .collect(),
        }
    }

    pub fn from_entries(entries: &[(&str, AuthRequirement)]) -> Result<Self, DuplicatePolicy> {
        let mut map = HashMap::with_capacity(entries.len());
        for (op, req) in entries {
            if map.insert((*op).to_string(), *req).is_some() {
                return Err(DuplicatePolicy((*op).to_string()));
            }
        }
        Ok(Self { entries: map })
    }

    pub fn lookup(&self, operation: &str) -> AuthRequirement {
        self.entries
            .get(operation)
            .copied()
            .unwrap_or(AuthRequirement::UserAuth)
    }

    /// Whether `operation` has an explicit entry (as opposed to the default).
    pub fn contains(&self, operation: &str) -> bool {
        self.entries.contains_key(operation)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_policy_has_one_entry_per_operation() {
        let table = PolicyTable::from_entries(STANDARD_POLICY).unwrap();
        assert_eq!(table.len(), STANDARD_POLICY.len());
    }

    #[test]
    fn every_served_operation_has_an_explicit_entry() {
        let table = PolicyTable::standard();
        for op in ops::ALL {
            assert!(table.contains(op), "op {op} missing from policy");
        }
    }

    #[test]
    fn duplicate_entries_are_rejected() {
        let entries = [
            ("/a", AuthRequirement::Public),
            ("/a", AuthRequirement::UserAuth),
        ];
        let err = PolicyTable::from_entries(&entries).unwrap_err();
        assert_eq!(err.0, "/a");
    }

    #[test]
    fn unknown_operations_require_user_auth() {
        let table = PolicyTable::standard();
        for op in ["", "/unknown.v1.Svc/Do", "/user.v1.UserService/login", "GET /api/secret"] {
            assert!(!table.contains(op));
            assert_eq!(table.lookup(op), AuthRequirement::UserAuth, "op {op:?}");
        }
    }

    #[test]
    fn login_is_public_and_registration_is_device_only() {
        let table = PolicyTable::standard();
        assert_eq!(table.lookup(ops::LOGIN), AuthRequirement::Public);
        assert_eq!(table.lookup(ops::HEALTH_CHECK), AuthRequirement::Public);
        assert_eq!(table.lookup(ops::CREATE_USER), AuthRequirement::DeviceAuth);
    }

    #[test]
    fn every_resource_operation_requires_a_user() {
        let table = PolicyTable::standard();
        for op in [
            ops::CREATE_LIBRARY,
            ops::GET_LIBRARIES,
            ops::GET_LIBRARY,
            ops::DELETE_LIBRARY,
            ops::CREATE_CARD,
            ops::GET_CARDS,
            ops::GET_CARD,
            ops::MOVE_CARD,
            ops::DELETE_CARD,
        ] {
            assert_eq!(table.lookup(op), AuthRequirement::UserAuth, "op {op}");
        }
    }
}
