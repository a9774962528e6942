use crate::error::Status;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Authenticated end user. Only produced by token verification or by the
/// record store when a user is created or logs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl UserId {
    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who the gate let through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallerIdentity {
    /// Public operation, no credential inspected.
    Anonymous,
    /// Trusted client installation; acts on behalf of no user.
    Device,
    User(UserId),
}

/// A call that passed the [`AuthGate`](super::AuthGate).
///
/// Handlers receive this value explicitly; there is no ambient per-call
/// context to look the caller up in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedCall {
    operation: String,
    identity: CallerIdentity,
}

impl AuthenticatedCall {
    pub(crate) fn new(operation: impl Into<String>, identity: CallerIdentity) -> Self {
        Self {
            operation: operation.into(),
            identity,
        }
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn identity(&self) -> CallerIdentity {
        self.identity
    }

    /// The calling user, or `Unauthenticated` for anonymous/device calls.
    pub fn principal(&self) -> Result<UserId, Status> {
        match self.identity {
            CallerIdentity::User(user) => Ok(user),
            CallerIdentity::Anonymous | CallerIdentity::Device => {
                tracing::warn!(
                    operation = %self.operation,
                    identity = ?self.identity,
                    "handler required a user principal the gate did not attach"
                );
                Err(Status::unauthenticated())
            }
        }
    }

    pub fn is_device(&self) -> bool {
        self.identity == CallerIdentity::Device
    }

    #[cfg(test)]
    pub(crate) fn for_user(operation: &str, user: UserId) -> Self {
        Self::new(operation, CallerIdentity::User(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Code;

    #[test]
    fn principal_is_available_for_user_calls() {
        let call = AuthenticatedCall::for_user("/x", UserId(7));
        assert_eq!(call.principal().unwrap(), UserId(7));
        assert!(!call.is_device());
    }

    #[test]
    fn device_call_has_no_principal() {
        let call = AuthenticatedCall::new("/x", CallerIdentity::Device);
        assert!(call.is_device());
        assert_eq!(call.principal().unwrap_err().code(), Code::Unauthenticated);
    }

    #[test]
    fn anonymous_call_has_no_principal() {
        let call = AuthenticatedCall::new("/x", CallerIdentity::Anonymous);
        assert!(call.principal().is_err());
    }
}
