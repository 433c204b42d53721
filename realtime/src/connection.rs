use crate::error::{Error, ErrorKind, SendErrorKind};
use crate::group::GroupName;
use crate::principal::Principal;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use log::*;
use std::collections::HashSet;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::Sender;

/// Bounded channel half the transport task drains; items are encoded JSON frames.
/// The capacity is the connection's outbound buffer.
pub type FrameSender = Sender<String>;

/// Unique identifier for a connection (server-generated)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Connection information (no redundant connection_id)
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub principal: Principal,
    pub sender: FrameSender,
    /// Groups joined, in join order.
    pub groups: Vec<GroupName>,
    pub created_at: DateTime<Utc>,
}

/// Connection registry with two indices: connections by id, and group membership.
///
/// Each group's member set lives behind its own DashMap entry lock, so `join`,
/// `leave` and `members` on one group are linearizable with respect to each
/// other. No lock is held while a caller serializes payloads or waits on I/O.
pub struct ConnectionRegistry {
    /// Primary storage: lookup by connection_id for registration/cleanup - O(1)
    connections: DashMap<ConnectionId, ConnectionInfo>,

    /// Secondary index: group name to member connections - O(1)
    groups: DashMap<GroupName, HashSet<ConnectionId>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            groups: DashMap::new(),
        }
    }

    /// Register an authenticated connection. It belongs to no group yet.
    pub fn register(&self, principal: Principal, sender: FrameSender) -> ConnectionId {
        let connection_id = ConnectionId::new();

        self.connections.insert(
            connection_id.clone(),
            ConnectionInfo {
                principal,
                sender,
                groups: Vec::new(),
                created_at: Utc::now(),
            },
        );

        connection_id
    }

    /// Add a connection to a group. Returns `false` if it was already a member.
    pub fn join(&self, group: &GroupName, connection_id: &ConnectionId) -> Result<bool, Error> {
        // The connection entry stays locked until the group index is updated, so a
        // concurrent unregister either sees the new group or runs before the insert.
        // Lock order is always connections then groups.
        let mut info = self
            .connections
            .get_mut(connection_id)
            .ok_or_else(|| Error::send(SendErrorKind::UnknownConnection))?;

        let added = self
            .groups
            .entry(group.clone())
            .or_default()
            .insert(connection_id.clone());
        if !info.groups.contains(group) {
            info.groups.push(group.clone());
        }
        drop(info);

        if added {
            trace!("Connection {connection_id} joined {group}");
        }
        Ok(added)
    }

    /// Remove a connection from a group. Returns `false` if it was not a member.
    /// A group left empty is dropped.
    pub fn leave(&self, group: &GroupName, connection_id: &ConnectionId) -> bool {
        let removed = match self.groups.get_mut(group) {
            Some(mut members) => members.remove(connection_id),
            None => false,
        };
        self.groups.remove_if(group, |_, members| members.is_empty());

        if let Some(mut info) = self.connections.get_mut(connection_id) {
            info.groups.retain(|g| g != group);
        }

        if removed {
            trace!("Connection {connection_id} left {group}");
        }
        removed
    }

    /// Snapshot of a group's members.
    pub fn members(&self, group: &GroupName) -> HashSet<ConnectionId> {
        self.groups
            .get(group)
            .map(|members| members.value().clone())
            .unwrap_or_default()
    }

    /// Groups a connection currently belongs to, in join order.
    pub fn groups_of(&self, connection_id: &ConnectionId) -> Vec<GroupName> {
        self.connections
            .get(connection_id)
            .map(|info| info.groups.clone())
            .unwrap_or_default()
    }

    /// Deliver one encoded frame to one connection.
    ///
    /// Never waits: a connection whose outbound buffer is full misses the frame.
    /// Failures are soft: the caller logs them and carries on with its fan-out.
    pub fn send(&self, connection_id: &ConnectionId, payload: &str) -> Result<(), Error> {
        let info = self
            .connections
            .get(connection_id)
            .ok_or_else(|| Error::send(SendErrorKind::UnknownConnection))?;

        info.sender.try_send(payload.to_string()).map_err(|e| {
            let kind = match &e {
                TrySendError::Full(_) => SendErrorKind::QueueFull,
                TrySendError::Closed(_) => SendErrorKind::ConnectionClosed,
            };
            Error::with_source(ErrorKind::Send(kind), e.to_string())
        })
    }

    /// Unregister a connection, dropping its sender and any group membership it still holds.
    pub fn unregister(&self, connection_id: &ConnectionId) -> Option<ConnectionInfo> {
        let (_, info) = self.connections.remove(connection_id)?;

        for group in &info.groups {
            if let Some(mut members) = self.groups.get_mut(group) {
                members.remove(connection_id);
            }
            self.groups.remove_if(group, |_, members| members.is_empty());
        }

        Some(info)
    }

    pub fn contains(&self, connection_id: &ConnectionId) -> bool {
        self.connections.contains_key(connection_id)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    fn register(
        registry: &ConnectionRegistry,
        user_id: i64,
    ) -> (ConnectionId, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(8);
        (registry.register(Principal::new(user_id), tx), rx)
    }

    #[test]
    fn test_join_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let (id, _rx) = register(&registry, 1);

        assert!(registry.join(&GroupName::Public, &id).unwrap());
        assert!(!registry.join(&GroupName::Public, &id).unwrap());

        assert_eq!(registry.members(&GroupName::Public).len(), 1);
        assert_eq!(registry.groups_of(&id), vec![GroupName::Public]);
    }

    #[test]
    fn test_leave_is_idempotent_and_collects_empty_groups() {
        let registry = ConnectionRegistry::new();
        let (id, _rx) = register(&registry, 1);
        registry.join(&GroupName::Private(1), &id).unwrap();
        assert_eq!(registry.group_count(), 1);

        assert!(registry.leave(&GroupName::Private(1), &id));
        let once = registry.members(&GroupName::Private(1));
        assert!(!registry.leave(&GroupName::Private(1), &id));
        let twice = registry.members(&GroupName::Private(1));

        assert_eq!(once, twice);
        assert!(twice.is_empty());
        assert_eq!(registry.group_count(), 0);
        assert!(registry.groups_of(&id).is_empty());
    }

    #[test]
    fn test_leave_keeps_group_with_remaining_members() {
        let registry = ConnectionRegistry::new();
        let (a, _rx_a) = register(&registry, 1);
        let (b, _rx_b) = register(&registry, 2);
        registry.join(&GroupName::Public, &a).unwrap();
        registry.join(&GroupName::Public, &b).unwrap();

        registry.leave(&GroupName::Public, &a);

        assert_eq!(registry.members(&GroupName::Public), HashSet::from([b]));
    }

    #[test]
    fn test_join_unknown_connection_fails() {
        let registry = ConnectionRegistry::new();
        let err = registry
            .join(&GroupName::Public, &ConnectionId::new())
            .unwrap_err();
        assert_eq!(
            err.error_kind,
            ErrorKind::Send(SendErrorKind::UnknownConnection)
        );
        assert_eq!(registry.group_count(), 0);
    }

    #[test]
    fn test_send_delivers_payload() {
        let registry = ConnectionRegistry::new();
        let (id, mut rx) = register(&registry, 1);

        registry.send(&id, "{\"type\":\"x\"}").unwrap();

        assert_eq!(rx.try_recv().unwrap(), "{\"type\":\"x\"}");
    }

    #[test]
    fn test_send_to_closed_connection_is_soft_error() {
        let registry = ConnectionRegistry::new();
        let (id, rx) = register(&registry, 1);
        drop(rx);

        let err = registry.send(&id, "payload").unwrap_err();
        assert_eq!(err.error_kind, ErrorKind::Send(SendErrorKind::ConnectionClosed));
        // The stale connection stays registered until its lifecycle closes it.
        assert!(registry.contains(&id));
    }

    #[test]
    fn test_send_to_full_buffer_is_soft_error() {
        let registry = ConnectionRegistry::new();
        let (tx, mut rx) = mpsc::channel(1);
        let id = registry.register(Principal::new(1), tx);

        registry.send(&id, "first").unwrap();
        let err = registry.send(&id, "second").unwrap_err();

        assert_eq!(err.error_kind, ErrorKind::Send(SendErrorKind::QueueFull));
        assert!(registry.contains(&id));
        assert_eq!(rx.try_recv().unwrap(), "first");

        // Delivery resumes once the transport drains the buffer.
        registry.send(&id, "third").unwrap();
        assert_eq!(rx.try_recv().unwrap(), "third");
    }

    #[test]
    fn test_unregister_removes_connection_from_all_groups() {
        let registry = ConnectionRegistry::new();
        let (id, _rx) = register(&registry, 7);
        let (other, _rx_other) = register(&registry, 8);
        for group in [GroupName::Public, GroupName::Private(7), GroupName::editors()] {
            registry.join(&group, &id).unwrap();
        }
        registry.join(&GroupName::Public, &other).unwrap();

        let info = registry.unregister(&id).unwrap();

        assert_eq!(info.principal.id, 7);
        assert!(!registry.contains(&id));
        assert_eq!(registry.members(&GroupName::Public), HashSet::from([other]));
        assert!(registry.members(&GroupName::Private(7)).is_empty());
        assert_eq!(registry.group_count(), 1);
        assert!(registry.unregister(&id).is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_joins_and_leaves_are_not_lost() {
        let registry = Arc::new(ConnectionRegistry::new());
        let mut handles = Vec::new();

        for user_id in 0..64 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                let (tx, rx) = mpsc::channel(8);
                let id = registry.register(Principal::new(user_id), tx);
                registry.join(&GroupName::Public, &id).unwrap();
                registry.join(&GroupName::Private(user_id), &id).unwrap();
                if user_id % 2 == 0 {
                    registry.leave(&GroupName::Public, &id);
                }
                (id, rx)
            }));
        }

        let mut receivers = Vec::new();
        for handle in handles {
            receivers.push(handle.await.unwrap());
        }

        assert_eq!(registry.connection_count(), 64);
        assert_eq!(registry.members(&GroupName::Public).len(), 32);
        assert_eq!(registry.group_count(), 65);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_join_racing_unregister_leaves_no_orphaned_members() {
        let registry = Arc::new(ConnectionRegistry::new());
        let mut handles = Vec::new();

        for user_id in 0..500 {
            let (tx, _rx) = mpsc::channel(1);
            let id = registry.register(Principal::new(user_id), tx);
            let group = GroupName::Private(user_id % 8);

            let joiner = registry.clone();
            let joining_id = id.clone();
            handles.push(tokio::spawn(async move {
                // Losing the race to unregister is an UnknownConnection error.
                let _ = joiner.join(&GroupName::Public, &joining_id);
                let _ = joiner.join(&group, &joining_id);
            }));

            let unregisterer = registry.clone();
            handles.push(tokio::spawn(async move {
                unregisterer.unregister(&id);
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(registry.connection_count(), 0);
        assert_eq!(registry.group_count(), 0);
        assert!(registry.members(&GroupName::Public).is_empty());
    }
}
