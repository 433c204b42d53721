//! Event dispatcher: turns a domain event into frames and fans them out to groups.
//!
//! Routing is table driven. Each `EventKind` maps to a rule function that returns
//! the ordered list of deliveries (a frame and the groups that receive it). The
//! dispatcher encodes each frame once, collects the distinct member connections
//! across its groups and sends to each exactly once.

use crate::connection::{ConnectionId, ConnectionRegistry};
use crate::group::GroupName;
use crate::message::Frame;
use events::{DomainEvent, EventKind};
use log::*;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;

/// Frame type for the user-facing notification record that accompanies an enrollment.
pub const NOTIFICATION_FRAME: &str = "notification";
/// Frame type for the enrollment summary sent back to the enroller.
pub const ENROLLMENT_DETAILS_FRAME: &str = "enrollment_details";

/// One frame and the groups it is delivered to.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub frame: Frame,
    pub groups: Vec<GroupName>,
}

impl Delivery {
    fn new(frame: Frame, groups: Vec<GroupName>) -> Self {
        Self { frame, groups }
    }
}

type RoutingRule = fn(&DomainEvent) -> Vec<Delivery>;

const ROUTING_TABLE: [(EventKind, RoutingRule); 5] = [
    (EventKind::CommentCreated, route_comment_created),
    (EventKind::CommentDeleted, route_comment_deleted),
    (EventKind::EnrollmentCreated, route_enrollment_created),
    (EventKind::EnrollmentDeleted, route_enrollment_deleted),
    (EventKind::PublicMessage, route_public_message),
];

/// Resolves the deliveries for an event without touching any connection.
pub fn route(event: &DomainEvent) -> Vec<Delivery> {
    let kind = event.kind();
    match ROUTING_TABLE.iter().find(|(k, _)| *k == kind) {
        Some((_, rule)) => rule(event),
        None => {
            error!("No routing rule registered for event type {kind}");
            Vec::new()
        }
    }
}

fn route_comment_created(event: &DomainEvent) -> Vec<Delivery> {
    let DomainEvent::CommentCreated {
        comment,
        author_id,
        author_is_privileged,
        reply_to,
        ..
    } = event
    else {
        return Vec::new();
    };

    let mut groups = Vec::new();

    // Notify the original commentor, unless they are replying to themselves.
    if let Some(target) = reply_to {
        if target.commentor_id != *author_id {
            groups.push(GroupName::Private(target.commentor_id));
        }
    }

    if !author_is_privileged {
        groups.push(GroupName::Private(*author_id));
    } else if reply_to.is_none() {
        groups.push(GroupName::students());
    }

    groups.push(GroupName::editors());

    vec![Delivery::new(
        Frame::for_kind(EventKind::CommentCreated, comment.clone()),
        groups,
    )]
}

fn route_comment_deleted(event: &DomainEvent) -> Vec<Delivery> {
    let DomainEvent::CommentDeleted { comment_id } = event else {
        return Vec::new();
    };

    vec![Delivery::new(
        Frame::for_kind(EventKind::CommentDeleted, json!({ "comment_id": comment_id })),
        vec![GroupName::Public],
    )]
}

fn route_enrollment_created(event: &DomainEvent) -> Vec<Delivery> {
    let DomainEvent::EnrollmentCreated {
        enrollment,
        notification,
        enrollment_details,
        enrolled_user_id,
        enroller_id,
        ..
    } = event
    else {
        return Vec::new();
    };

    let enrolled = GroupName::Private(*enrolled_user_id);
    vec![
        Delivery::new(
            Frame::for_kind(EventKind::EnrollmentCreated, enrollment.clone()),
            vec![enrolled.clone()],
        ),
        Delivery::new(
            Frame::new(NOTIFICATION_FRAME, notification.clone()),
            vec![enrolled],
        ),
        Delivery::new(
            Frame::new(ENROLLMENT_DETAILS_FRAME, enrollment_details.clone()),
            vec![GroupName::Private(*enroller_id)],
        ),
    ]
}

fn route_enrollment_deleted(event: &DomainEvent) -> Vec<Delivery> {
    let DomainEvent::EnrollmentDeleted {
        enrollment_id,
        enrolled_user_id,
        enroller_id,
    } = event
    else {
        return Vec::new();
    };

    let mut groups = vec![GroupName::Private(*enrolled_user_id)];
    if enroller_id != enrolled_user_id {
        groups.push(GroupName::Private(*enroller_id));
    }

    vec![Delivery::new(
        Frame::for_kind(
            EventKind::EnrollmentDeleted,
            json!({ "enrollment_id": enrollment_id }),
        ),
        groups,
    )]
}

fn route_public_message(event: &DomainEvent) -> Vec<Delivery> {
    let DomainEvent::ChatMessageReceived { message, .. } = event else {
        return Vec::new();
    };

    vec![Delivery::new(
        Frame::for_kind(EventKind::PublicMessage, Value::String(message.clone())),
        vec![GroupName::Public],
    )]
}

/// Outcome of a single dispatch. Informational only; dispatch never fails.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Routes domain events to the live connections of their destination groups.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<ConnectionRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Deliver an event, best effort. Per-target failures are logged and counted.
    pub fn dispatch(&self, event: &DomainEvent) -> DispatchReport {
        let mut report = DispatchReport::default();

        for delivery in route(event) {
            let payload = match delivery.frame.encode() {
                Ok(payload) => payload,
                Err(e) => {
                    error!(
                        "Failed to serialize {} frame: {e}",
                        delivery.frame.event_type
                    );
                    continue;
                }
            };

            for connection_id in self.targets(&delivery.groups) {
                match self.registry.send(&connection_id, &payload) {
                    Ok(()) => report.delivered += 1,
                    Err(e) => {
                        warn!(
                            "Failed to send {} to connection {}: {e}",
                            delivery.frame.event_type, connection_id
                        );
                        report.failed += 1;
                    }
                }
            }
        }

        debug!(
            "Dispatched {} event: delivered={}, failed={}",
            event.kind(),
            report.delivered,
            report.failed
        );
        report
    }

    /// Distinct member connections across the groups, first-seen order.
    fn targets(&self, groups: &[GroupName]) -> Vec<ConnectionId> {
        let mut seen = HashSet::new();
        let mut targets = Vec::new();
        for group in groups {
            for connection_id in self.registry.members(group) {
                if seen.insert(connection_id.clone()) {
                    targets.push(connection_id);
                }
            }
        }
        targets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::principal::Principal;
    use events::ReplyTarget;
    use tokio::sync::mpsc::{self, Receiver};

    struct Client {
        id: ConnectionId,
        rx: Receiver<String>,
    }

    impl Client {
        fn frames(&mut self) -> Vec<Value> {
            let mut frames = Vec::new();
            while let Ok(text) = self.rx.try_recv() {
                frames.push(serde_json::from_str(&text).unwrap());
            }
            frames
        }
    }

    fn connect(registry: &ConnectionRegistry, user_id: i64, groups: &[GroupName]) -> Client {
        let (tx, rx) = mpsc::channel(16);
        let id = registry.register(Principal::new(user_id), tx);
        for group in groups {
            registry.join(group, &id).unwrap();
        }
        Client { id, rx }
    }

    fn comment(
        author_id: i64,
        author_is_privileged: bool,
        reply_to: Option<ReplyTarget>,
    ) -> DomainEvent {
        DomainEvent::CommentCreated {
            comment_id: 6,
            comment: json!({"id": 6, "text": "hello"}),
            author_id,
            author_is_privileged,
            reply_to,
        }
    }

    fn groups_of(deliveries: &[Delivery]) -> Vec<Vec<GroupName>> {
        deliveries.iter().map(|d| d.groups.clone()).collect()
    }

    #[test]
    fn test_every_event_kind_has_a_routing_rule() {
        for kind in EventKind::ALL {
            assert!(ROUTING_TABLE.iter().any(|(k, _)| *k == kind), "{kind}");
        }
    }

    #[test]
    fn test_reply_to_own_comment_is_not_a_reply_notification() {
        // User 3 wrote comment 5 and replies to it.
        let event = comment(
            3,
            true,
            Some(ReplyTarget {
                comment_id: 5,
                commentor_id: 3,
            }),
        );
        assert_eq!(groups_of(&route(&event)), vec![vec![GroupName::editors()]]);
    }

    #[test]
    fn test_non_privileged_reply_to_own_comment_still_echoes() {
        let event = comment(
            3,
            false,
            Some(ReplyTarget {
                comment_id: 5,
                commentor_id: 3,
            }),
        );
        assert_eq!(
            groups_of(&route(&event)),
            vec![vec![GroupName::Private(3), GroupName::editors()]]
        );
    }

    #[test]
    fn test_reply_notifies_original_commentor() {
        let event = comment(
            4,
            false,
            Some(ReplyTarget {
                comment_id: 5,
                commentor_id: 3,
            }),
        );
        assert_eq!(
            groups_of(&route(&event)),
            vec![vec![
                GroupName::Private(3),
                GroupName::Private(4),
                GroupName::editors()
            ]]
        );
    }

    #[test]
    fn test_privileged_top_level_comment_broadcasts_to_students() {
        let deliveries = route(&comment(1, true, None));
        assert_eq!(
            groups_of(&deliveries),
            vec![vec![GroupName::students(), GroupName::editors()]]
        );
        assert_eq!(deliveries[0].frame.event_type, "comment_created");
    }

    #[test]
    fn test_privileged_reply_does_not_broadcast_to_students() {
        let event = comment(
            1,
            true,
            Some(ReplyTarget {
                comment_id: 5,
                commentor_id: 3,
            }),
        );
        assert_eq!(
            groups_of(&route(&event)),
            vec![vec![GroupName::Private(3), GroupName::editors()]]
        );
    }

    #[test]
    fn test_comment_deleted_goes_to_public() {
        let deliveries = route(&DomainEvent::CommentDeleted { comment_id: 9 });
        assert_eq!(groups_of(&deliveries), vec![vec![GroupName::Public]]);
        assert_eq!(deliveries[0].frame.message, json!({"comment_id": 9}));
    }

    #[test]
    fn test_enrollment_created_targets_student_and_enroller() {
        let event = DomainEvent::EnrollmentCreated {
            enrollment_id: 11,
            enrollment: json!({"id": 11}),
            notification: json!({"id": 2, "message": "You were enrolled"}),
            enrollment_details: json!({"course": "Rust"}),
            enrolled_user_id: 20,
            enroller_id: 1,
        };
        let deliveries = route(&event);

        let types: Vec<&str> = deliveries
            .iter()
            .map(|d| d.frame.event_type.as_str())
            .collect();
        assert_eq!(
            types,
            vec!["enrollment_created", NOTIFICATION_FRAME, ENROLLMENT_DETAILS_FRAME]
        );

        let distinct: HashSet<GroupName> =
            deliveries.iter().flat_map(|d| d.groups.clone()).collect();
        assert_eq!(
            distinct,
            HashSet::from([GroupName::Private(20), GroupName::Private(1)])
        );
    }

    #[test]
    fn test_enrollment_deleted_targets_both_parties_once() {
        let deliveries = route(&DomainEvent::EnrollmentDeleted {
            enrollment_id: 11,
            enrolled_user_id: 20,
            enroller_id: 1,
        });
        assert_eq!(
            groups_of(&deliveries),
            vec![vec![GroupName::Private(20), GroupName::Private(1)]]
        );

        let self_service = route(&DomainEvent::EnrollmentDeleted {
            enrollment_id: 11,
            enrolled_user_id: 20,
            enroller_id: 20,
        });
        assert_eq!(groups_of(&self_service), vec![vec![GroupName::Private(20)]]);
    }

    #[test]
    fn test_dispatch_enrollment_sends_two_payloads_to_student_one_to_enroller() {
        let registry = Arc::new(ConnectionRegistry::new());
        let mut student = connect(&registry, 20, &[GroupName::Public, GroupName::Private(20)]);
        let mut staff = connect(
            &registry,
            1,
            &[GroupName::Public, GroupName::Private(1), GroupName::editors()],
        );
        let dispatcher = Dispatcher::new(registry);

        let report = dispatcher.dispatch(&DomainEvent::EnrollmentCreated {
            enrollment_id: 11,
            enrollment: json!({"id": 11}),
            notification: json!({"message": "You were enrolled"}),
            enrollment_details: json!({"course": "Rust"}),
            enrolled_user_id: 20,
            enroller_id: 1,
        });

        assert_eq!(report, DispatchReport { delivered: 3, failed: 0 });
        assert_eq!(
            student.frames(),
            vec![
                json!({"type": "enrollment_created", "message": {"id": 11}}),
                json!({"type": "notification", "message": {"message": "You were enrolled"}}),
            ]
        );
        assert_eq!(
            staff.frames(),
            vec![json!({"type": "enrollment_details", "message": {"course": "Rust"}})]
        );
    }

    #[test]
    fn test_dispatch_dedupes_connections_reachable_through_two_groups() {
        let registry = Arc::new(ConnectionRegistry::new());
        // Commentor 3 is also an editor: reachable via private:3 and role:editors.
        let mut editor = connect(&registry, 3, &[GroupName::Private(3), GroupName::editors()]);
        let dispatcher = Dispatcher::new(registry);

        let report = dispatcher.dispatch(&comment(
            4,
            false,
            Some(ReplyTarget {
                comment_id: 5,
                commentor_id: 3,
            }),
        ));

        assert_eq!(report.delivered, 1);
        assert_eq!(editor.frames().len(), 1);
    }

    #[test]
    fn test_dispatch_continues_past_closed_connections() {
        let registry = Arc::new(ConnectionRegistry::new());
        let stale = connect(&registry, 1, &[GroupName::Public]);
        let mut live = connect(&registry, 2, &[GroupName::Public]);
        drop(stale.rx);
        let dispatcher = Dispatcher::new(registry);

        let report = dispatcher.dispatch(&DomainEvent::CommentDeleted { comment_id: 9 });

        assert_eq!(report, DispatchReport { delivered: 1, failed: 1 });
        assert_eq!(
            live.frames(),
            vec![json!({"type": "comment_deleted", "message": {"comment_id": 9}})]
        );
    }

    #[test]
    fn test_dispatch_does_not_wait_on_a_full_buffer() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (tx, _backlogged_rx) = mpsc::channel(1);
        let backlogged = registry.register(Principal::new(1), tx);
        registry.join(&GroupName::Public, &backlogged).unwrap();
        let mut live = connect(&registry, 2, &[GroupName::Public]);
        let dispatcher = Dispatcher::new(registry);

        let first = dispatcher.dispatch(&DomainEvent::CommentDeleted { comment_id: 1 });
        let second = dispatcher.dispatch(&DomainEvent::CommentDeleted { comment_id: 2 });

        assert_eq!(first, DispatchReport { delivered: 2, failed: 0 });
        assert_eq!(second, DispatchReport { delivered: 1, failed: 1 });
        assert_eq!(live.frames().len(), 2);
    }

    #[test]
    fn test_dispatch_preserves_order_for_one_caller() {
        let registry = Arc::new(ConnectionRegistry::new());
        let mut client = connect(&registry, 1, &[GroupName::Public]);
        let dispatcher = Dispatcher::new(registry);

        for text in ["one", "two", "three"] {
            dispatcher.dispatch(&DomainEvent::ChatMessageReceived {
                sender_id: 2,
                message: text.to_string(),
            });
        }

        let messages: Vec<Value> = client
            .frames()
            .into_iter()
            .map(|frame| frame["message"].clone())
            .collect();
        assert_eq!(messages, vec![json!("one"), json!("two"), json!("three")]);
    }

    #[test]
    fn test_dispatch_skips_disconnected_members() {
        let registry = Arc::new(ConnectionRegistry::new());
        let gone = connect(&registry, 1, &[GroupName::Public, GroupName::Private(1)]);
        registry.unregister(&gone.id);
        let dispatcher = Dispatcher::new(registry);

        let report = dispatcher.dispatch(&DomainEvent::EnrollmentDeleted {
            enrollment_id: 1,
            enrolled_user_id: 1,
            enroller_id: 1,
        });

        assert_eq!(report, DispatchReport::default());
    }
}
