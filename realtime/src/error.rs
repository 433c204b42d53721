//! Error types for the `realtime` crate.
//!
//! Follows the same pattern as the other layers: a root `Error` struct holding an
//! `error_kind` tree and an optional `source` for chaining. Nothing in this crate
//! is fatal to the process; callers decide whether a kind is soft (send failures)
//! or terminal for one connection (authentication failures).

use std::error::Error as StdError;
use std::fmt;

#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

/// Major categories of errors in the notification core.
#[derive(Debug, PartialEq)]
pub enum ErrorKind {
    Authentication(AuthenticationErrorKind),
    Send(SendErrorKind),
    Lifecycle(LifecycleErrorKind),
    GroupName(GroupNameErrorKind),
    /// The privilege policy could not determine a principal's privilege state.
    Policy(String),
}

/// Credential problems. The connection is refused; the client must reconnect
/// with a fresh credential.
#[derive(Debug, PartialEq)]
pub enum AuthenticationErrorKind {
    Missing,
    Invalid,
    Expired,
}

/// Delivery to a single connection failed.
#[derive(Debug, PartialEq)]
pub enum SendErrorKind {
    /// The connection's transport has gone away.
    ConnectionClosed,
    /// The connection id is not (or no longer) registered.
    UnknownConnection,
    /// The connection's outbound buffer is full; the frame is dropped for it.
    QueueFull,
}

#[derive(Debug, PartialEq)]
pub enum LifecycleErrorKind {
    InvalidTransition { from: String, to: String },
    /// Inbound traffic on a connection that is not in the `Joined` state.
    NotJoined { state: String },
}

#[derive(Debug, PartialEq)]
pub enum GroupNameErrorKind {
    TooLong { len: usize, max: usize },
    Malformed(String),
}

impl Error {
    pub fn new(error_kind: ErrorKind) -> Self {
        Self {
            source: None,
            error_kind,
        }
    }

    pub fn with_source(
        error_kind: ErrorKind,
        source: impl Into<Box<dyn StdError + Send + Sync>>,
    ) -> Self {
        Self {
            source: Some(source.into()),
            error_kind,
        }
    }

    pub fn authentication(kind: AuthenticationErrorKind) -> Self {
        Self::new(ErrorKind::Authentication(kind))
    }

    pub fn send(kind: SendErrorKind) -> Self {
        Self::new(ErrorKind::Send(kind))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Realtime Error: {self:?}")
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}
