//! Capabilities the notification core consumes from the rest of the LMS:
//! bearer token validation and the privilege/role policy.

pub mod error;
pub mod jwt;
pub mod policy;

use realtime::{ConnectionRegistry, GroupResolver, Lifecycle};
use service::config::Config;
use std::sync::Arc;

/// Builds the connection lifecycle from configuration with a fresh registry.
pub fn build_lifecycle(config: &Config) -> Result<Lifecycle, error::Error> {
    let validator = jwt::JwtCredentialValidator::from_config(config)?;
    let policy = policy::StaffOrRolePolicy::from_config(config);
    let resolver =
        GroupResolver::new(Arc::new(policy)).with_max_group_name_len(config.max_group_name_len());

    Ok(Lifecycle::new(
        Arc::new(ConnectionRegistry::new()),
        resolver,
        Arc::new(validator),
    ))
}
