//! Group names and the resolver that decides which groups a principal joins.
//!
//! Membership is computed once, when the connection is accepted, and is fixed
//! for the connection's lifetime.

use crate::error::{AuthenticationErrorKind, Error, ErrorKind, GroupNameErrorKind};
use crate::principal::{Principal, Privilege, PrivilegePolicy};
use events::Id;
use log::*;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Default upper bound on generated group identifiers.
pub const DEFAULT_MAX_GROUP_NAME_LEN: usize = 100;

const EDITORS: &str = "editors";
const STUDENTS: &str = "students";

/// A named delivery target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GroupName {
    /// Every authenticated connection.
    Public,
    /// All connections of exactly one user.
    Private(Id),
    /// Connections of users holding a role, e.g. `role:editors`.
    Role(String),
}

impl GroupName {
    pub fn editors() -> Self {
        GroupName::Role(EDITORS.to_string())
    }

    pub fn students() -> Self {
        GroupName::Role(STUDENTS.to_string())
    }

    /// Optional sanity bound on the rendered identifier. `None` disables the check.
    pub fn check_len(&self, max: Option<usize>) -> Result<(), Error> {
        let Some(max) = max else {
            return Ok(());
        };
        let len = self.to_string().len();
        if len > max {
            return Err(Error::new(ErrorKind::GroupName(GroupNameErrorKind::TooLong {
                len,
                max,
            })));
        }
        Ok(())
    }
}

impl fmt::Display for GroupName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            GroupName::Public => write!(f, "public"),
            GroupName::Private(user_id) => write!(f, "private:{user_id}"),
            GroupName::Role(role) => write!(f, "role:{role}"),
        }
    }
}

impl FromStr for GroupName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed =
            || Error::new(ErrorKind::GroupName(GroupNameErrorKind::Malformed(s.to_string())));

        if s == "public" {
            return Ok(GroupName::Public);
        }
        if let Some(user_id) = s.strip_prefix("private:") {
            return user_id
                .parse::<Id>()
                .map(GroupName::Private)
                .map_err(|_| malformed());
        }
        match s.strip_prefix("role:") {
            Some(role) if !role.is_empty() => Ok(GroupName::Role(role.to_string())),
            _ => Err(malformed()),
        }
    }
}

/// Computes the group set for an authenticated principal.
#[derive(Clone)]
pub struct GroupResolver {
    policy: Arc<dyn PrivilegePolicy>,
    max_group_name_len: Option<usize>,
}

impl GroupResolver {
    pub fn new(policy: Arc<dyn PrivilegePolicy>) -> Self {
        Self {
            policy,
            max_group_name_len: Some(DEFAULT_MAX_GROUP_NAME_LEN),
        }
    }

    pub fn with_max_group_name_len(mut self, max: Option<usize>) -> Self {
        self.max_group_name_len = max;
        self
    }

    /// Returns the groups to join, in join order, without duplicates.
    ///
    /// Anonymous principals are refused. A policy failure degrades to standard
    /// privilege; the base groups are always joined.
    pub fn resolve(&self, principal: Option<&Principal>) -> Result<Vec<GroupName>, Error> {
        let principal = principal
            .ok_or_else(|| Error::authentication(AuthenticationErrorKind::Missing))?;

        let mut groups = vec![GroupName::Public, GroupName::Private(principal.id)];

        let privilege = self.policy.privilege(principal).unwrap_or_else(|e| {
            warn!(
                "Could not determine privilege for user {}: {e}. Falling back to standard.",
                principal.id
            );
            Privilege::Standard
        });
        if privilege == Privilege::Elevated {
            groups.push(GroupName::editors());
        }

        for role in self.policy.role_groups(principal) {
            let group = GroupName::Role(role);
            if let Err(e) = group.check_len(self.max_group_name_len) {
                warn!("Skipping role group {group} for user {}: {e}", principal.id);
                continue;
            }
            if !groups.contains(&group) {
                groups.push(group);
            }
        }

        debug!("Resolved groups for user {}: {:?}", principal.id, groups);
        Ok(groups)
    }
}
