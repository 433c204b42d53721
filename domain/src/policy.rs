//! Role naming for the LMS: who counts as privileged and which broadcast role
//! groups a user joins.

use realtime::error::Error as RealtimeError;
use realtime::{Principal, Privilege, PrivilegePolicy};
use service::config::Config;

const STUDENTS: &str = "students";

/// Staff users, or members of any configured privileged role, are elevated.
/// Role names match case-insensitively.
pub struct StaffOrRolePolicy {
    privileged_roles: Vec<String>,
    broadcast_roles: Vec<String>,
}

impl StaffOrRolePolicy {
    pub fn new(privileged_roles: Vec<String>, broadcast_roles: Vec<String>) -> Self {
        Self {
            privileged_roles,
            broadcast_roles,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.privileged_roles.clone(),
            config.broadcast_roles.clone(),
        )
    }

    fn listed(role: &str, names: &[String]) -> bool {
        names.iter().any(|name| name.eq_ignore_ascii_case(role))
    }

    fn is_privileged(&self, principal: &Principal) -> bool {
        principal.is_staff
            || principal
                .roles
                .iter()
                .any(|role| Self::listed(role, &self.privileged_roles))
    }
}

impl PrivilegePolicy for StaffOrRolePolicy {
    fn privilege(&self, principal: &Principal) -> Result<Privilege, RealtimeError> {
        Ok(if self.is_privileged(principal) {
            Privilege::Elevated
        } else {
            Privilege::Standard
        })
    }

    /// Lowercased names of the broadcast roles the principal holds. A
    /// non-privileged principal with none of them is treated as a student.
    fn role_groups(&self, principal: &Principal) -> Vec<String> {
        let mut groups: Vec<String> = principal
            .roles
            .iter()
            .filter(|role| Self::listed(role, &self.broadcast_roles))
            .map(|role| role.to_lowercase())
            .collect();
        groups.dedup();

        if groups.is_empty() && !self.is_privileged(principal) {
            groups.push(STUDENTS.to_string());
        }
        groups
    }
}
