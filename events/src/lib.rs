//! Event system infrastructure for the LMS platform.
//!
//! This crate provides the event system that decouples request handling
//! (course, comment and enrollment mutations) from the real-time notification
//! core that pushes updates to live connections.
//!
//! # Architecture
//!
//! - **DomainEvent**: Enum representing every business event that produces a live notification
//! - **EventKind**: Fieldless tag of a `DomainEvent`, doubling as the wire event-type string
//! - **EventHandler**: Trait for implementing event handlers
//! - **EventPublisher**: Publishes events to registered handlers
//!
//! This crate has no dependencies on internal crates, avoiding circular
//! dependencies. Entity data is carried as serialized JSON values.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// A type alias that represents any entity's id field data type (users, comments, enrollments).
pub type Id = i64;

/// The comment a reply was posted against, along with who wrote it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyTarget {
    pub comment_id: Id,
    pub commentor_id: Id,
}

/// Domain events that represent business-level changes in the system.
/// These events are emitted after the mutating operation has committed.
///
/// Events carry the user IDs and the privilege facts needed for routing; the
/// request layer that emits them is responsible for computing those facts.
#[derive(Debug, Clone)]
pub enum DomainEvent {
    /// Emitted when a comment (top-level or reply) is posted on a module.
    CommentCreated {
        comment_id: Id,
        /// Complete serialized comment as returned to the HTTP client.
        comment: Value,
        author_id: Id,
        /// Whether the author is staff or holds an administrative role.
        author_is_privileged: bool,
        /// Present when the comment is a reply to an earlier comment.
        reply_to: Option<ReplyTarget>,
    },
    /// Emitted when a comment is removed.
    CommentDeleted { comment_id: Id },
    /// Emitted when a user is enrolled into a course by another user (or themselves).
    EnrollmentCreated {
        enrollment_id: Id,
        /// Serialized enrollment, pushed to the enrolled user.
        enrollment: Value,
        /// Serialized notification record, pushed to the enrolled user.
        notification: Value,
        /// Enrollment details (course, enrolled user), pushed to the enroller.
        enrollment_details: Value,
        enrolled_user_id: Id,
        enroller_id: Id,
    },
    /// Emitted when an enrollment is removed.
    EnrollmentDeleted {
        enrollment_id: Id,
        enrolled_user_id: Id,
        enroller_id: Id,
    },
    /// Emitted when a live connection sends a chat frame.
    ChatMessageReceived { sender_id: Id, message: String },
}

impl DomainEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            DomainEvent::CommentCreated { .. } => EventKind::CommentCreated,
            DomainEvent::CommentDeleted { .. } => EventKind::CommentDeleted,
            DomainEvent::EnrollmentCreated { .. } => EventKind::EnrollmentCreated,
            DomainEvent::EnrollmentDeleted { .. } => EventKind::EnrollmentDeleted,
            DomainEvent::ChatMessageReceived { .. } => EventKind::PublicMessage,
        }
    }
}

/// Tag of a `DomainEvent`. The string form is the `type` field of outbound frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    CommentCreated,
    CommentDeleted,
    EnrollmentCreated,
    EnrollmentDeleted,
    PublicMessage,
}

impl EventKind {
    pub const ALL: [EventKind; 5] = [
        EventKind::CommentCreated,
        EventKind::CommentDeleted,
        EventKind::EnrollmentCreated,
        EventKind::EnrollmentDeleted,
        EventKind::PublicMessage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::CommentCreated => "comment_created",
            EventKind::CommentDeleted => "comment_deleted",
            EventKind::EnrollmentCreated => "enrollment_created",
            EventKind::EnrollmentDeleted => "enrollment_deleted",
            EventKind::PublicMessage => "public_message",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct EventKindParseError(pub String);

impl FromStr for EventKind {
    type Err = EventKindParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| EventKindParseError(s.to_string()))
    }
}

/// Trait for handling domain events.
/// Implementations perform side effects like pushing live notifications.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &DomainEvent);
}

/// Publishes domain events to registered handlers.
/// Handlers are called sequentially in registration order.
#[derive(Clone)]
pub struct EventPublisher {
    handlers: Arc<Vec<Arc<dyn EventHandler>>>,
}

impl EventPublisher {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(Vec::new()),
        }
    }

    /// Register a new event handler.
    /// Note: This creates a new publisher instance with the additional handler.
    /// Store the returned publisher in your application state.
    pub fn with_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        let mut handlers = (*self.handlers).clone();
        handlers.push(handler);
        self.handlers = Arc::new(handlers);
        self
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Publish an event to all registered handlers.
    /// Handlers do not return errors; delivery problems are theirs to log.
    pub async fn publish(&self, event: DomainEvent) {
        for handler in self.handlers.iter() {
            handler.handle(&event).await;
        }
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}
