//! Error types for the `domain` layer.
use realtime::error::{
    AuthenticationErrorKind as RealtimeAuthenticationErrorKind, Error as RealtimeError,
    ErrorKind as RealtimeErrorKind,
};
use std::error::Error as StdError;
use std::fmt;

/// Top-level domain error type.
/// Errors in the Domain layer are modeled as a tree structure
/// with `domain::error::Error` as the root type holding a tree of `error_kind`
/// enums that represent the kinds of errors that can occur in the domain layer or
/// in lower layers. The `source` field is used to hold the original error that caused
/// the domain error. `web` depends on `domain` and maps these kinds to HTTP status
/// codes, without depending on `realtime`'s error tree directly.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: DomainErrorKind,
}

/// Enum representing the major categories of errors that can occur in the `domain` layer.
#[derive(Debug, PartialEq)]
pub enum DomainErrorKind {
    Internal(InternalErrorKind),
    Authentication(AuthenticationErrorKind),
}

/// Enum representing the various kinds of internal errors that can occur in the `domain` layer.
#[derive(Debug, PartialEq)]
pub enum InternalErrorKind {
    Config,
    Realtime,
}

/// Why a live connection was refused.
#[derive(Debug, PartialEq)]
pub enum AuthenticationErrorKind {
    MissingCredential,
    InvalidCredential,
    ExpiredCredential,
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        let message: String = message.into();
        Error {
            source: Some(message.into()),
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Config),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Domain Error: {self:?}")
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

// This is where we translate errors from the `realtime` layer to the `domain` layer.
impl From<RealtimeError> for Error {
    fn from(err: RealtimeError) -> Self {
        let error_kind = match &err.error_kind {
            RealtimeErrorKind::Authentication(kind) => {
                DomainErrorKind::Authentication(match kind {
                    RealtimeAuthenticationErrorKind::Missing => {
                        AuthenticationErrorKind::MissingCredential
                    }
                    RealtimeAuthenticationErrorKind::Invalid => {
                        AuthenticationErrorKind::InvalidCredential
                    }
                    RealtimeAuthenticationErrorKind::Expired => {
                        AuthenticationErrorKind::ExpiredCredential
                    }
                })
            }
            _ => DomainErrorKind::Internal(InternalErrorKind::Realtime),
        };

        Error {
            source: Some(Box::new(err)),
            error_kind,
        }
    }
}
