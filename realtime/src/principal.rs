//! Authenticated identities and the capabilities the core consumes to produce them.
//!
//! Token parsing and role naming live outside this crate: the `domain` layer
//! supplies a `CredentialValidator` and a `PrivilegePolicy`.

use crate::error::Error;
use events::Id;

/// An authenticated user identity attached to a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: Id,
    pub is_staff: bool,
    /// Names of the role groups the user belongs to (e.g. "Instructors").
    pub roles: Vec<String>,
}

impl Principal {
    pub fn new(id: Id) -> Self {
        Self {
            id,
            is_staff: false,
            roles: Vec::new(),
        }
    }

    pub fn staff(mut self) -> Self {
        self.is_staff = true;
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Privilege {
    Standard,
    Elevated,
}

/// Validates a bearer credential and returns the principal it identifies.
///
/// Implementations may block (e.g. a user-store lookup); the lifecycle runs
/// them on the blocking pool.
pub trait CredentialValidator: Send + Sync {
    fn validate(&self, token: &str) -> Result<Principal, Error>;
}

/// Decides what a principal is allowed to hear about.
pub trait PrivilegePolicy: Send + Sync {
    /// Elevated when any qualifying condition holds.
    fn privilege(&self, principal: &Principal) -> Result<Privilege, Error>;

    /// Broadcast role group names (without the `role:` prefix) the principal joins.
    fn role_groups(&self, principal: &Principal) -> Vec<String>;
}
