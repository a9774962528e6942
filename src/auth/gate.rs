//! The auth gate: one decision function for every inbound call.
//!
//! The RPC dispatcher and the HTTP middleware are thin adapters that hand
//! the operation name and the call metadata to [`AuthGate::authorize`].
//! A rejected call never reaches a handler.

use super::{
    AuthRequirement, AuthenticatedCall, CallMetadata, CallerIdentity, DeviceValidator,
    PolicyTable, PrincipalResolver, TokenCodec,
};
use crate::error::Status;

#[derive(Debug, Clone)]
pub struct AuthGate {
    policy: PolicyTable,
    devices: DeviceValidator,
    resolver: PrincipalResolver,
}

impl AuthGate {
    pub fn new(policy: PolicyTable, devices: DeviceValidator, resolver: PrincipalResolver) -> Self {
        Self {
            policy,
            devices,
            resolver,
        }
    }

    /// Standard policy table plus the key and device secrets from config.
    pub fn from_config(auth: &crate::config::AuthConfig) -> Self {
        Self::new(
            PolicyTable::standard(),
            DeviceValidator::from_config(auth),
            PrincipalResolver::new(TokenCodec::from_config(auth)),
        )
    }

    /// Decide whether `operation` may proceed with the given metadata.
    ///
    /// Every rejection is `Unauthenticated` with the same message; the
    /// specific reason is only logged.
    pub fn authorize(
        &self,
        operation: &str,
        metadata: &impl CallMetadata,
    ) -> Result<AuthenticatedCall, Status> {
        let requirement = self.policy.lookup(operation);
        let identity = match requirement {
            AuthRequirement::Public => CallerIdentity::Anonymous,
            AuthRequirement::DeviceAuth => match self.devices.validate(metadata) {
                Ok(()) => CallerIdentity::Device,
                Err(reason) => {
                    tracing::warn!(operation, %reason, "device credential rejected");
                    return Err(Status::unauthenticated());
                }
            },
            AuthRequirement::UserAuth => match self.resolver.resolve(metadata) {
                Ok(user) => CallerIdentity::User(user),
                Err(reason) => {
                    tracing::warn!(operation, %reason, "user credential rejected");
                    return Err(Status::unauthenticated());
                }
            },
        };

        tracing::debug!(operation, ?requirement, ?identity, "call forwarded");
        Ok(AuthenticatedCall::new(operation, identity))
    }
}
