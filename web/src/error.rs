use std::error::Error as StdError;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use log::*;

use domain::error::{AuthenticationErrorKind, DomainErrorKind, Error as DomainError};

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug)]
pub struct Error(DomainError);

impl StdError for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> core::result::Result<(), std::fmt::Error> {
        write!(fmt, "{self:?}")
    }
}

// A refused live connection never reaches the upgrade, so the client sees a plain
// HTTP status on the handshake request.
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self.0.error_kind {
            DomainErrorKind::Authentication(authentication_error_kind) => {
                debug!("Rejecting connection: {authentication_error_kind:?}");
                match authentication_error_kind {
                    AuthenticationErrorKind::MissingCredential => {
                        (StatusCode::UNAUTHORIZED, "MISSING CREDENTIAL").into_response()
                    }
                    AuthenticationErrorKind::InvalidCredential => {
                        (StatusCode::UNAUTHORIZED, "INVALID CREDENTIAL").into_response()
                    }
                    AuthenticationErrorKind::ExpiredCredential => {
                        (StatusCode::UNAUTHORIZED, "EXPIRED CREDENTIAL").into_response()
                    }
                }
            }
            DomainErrorKind::Internal(internal_error_kind) => {
                error!("Internal error: {internal_error_kind:?}");
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL SERVER ERROR").into_response()
            }
        }
    }
}

impl<E> From<E> for Error
where
    E: Into<DomainError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
