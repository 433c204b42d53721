//! Bearer token validation for live connections.
//!
//! The notification core consumes credential validation as a capability
//! (`realtime::CredentialValidator`). This module provides the HS256 JWT
//! implementation of it, configured from the service `Config`.
//!
//! # Example
//!
//! ```rust,ignore
//! use domain::jwt::JwtCredentialValidator;
//! use realtime::CredentialValidator;
//!
//! let validator = JwtCredentialValidator::from_config(&config)?;
//! let principal = validator.validate(token)?;
//! ```

use crate::error::Error;
use claims::AccessClaims;
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use log::*;
use realtime::error::{
    AuthenticationErrorKind, Error as RealtimeError, ErrorKind as RealtimeErrorKind,
};
use realtime::{CredentialValidator, Principal};
use service::config::Config;

pub(crate) mod claims;

pub struct JwtCredentialValidator {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtCredentialValidator {
    pub fn new(signing_key: &str, issuer: Option<&str>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        if let Some(issuer) = issuer {
            validation.set_issuer(&[issuer]);
        }

        Self {
            decoding_key: DecodingKey::from_secret(signing_key.as_bytes()),
            validation,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, Error> {
        let signing_key = config.jwt_signing_key().ok_or_else(|| {
            warn!("Failed to get JWT signing key from config");
            Error::config("No JWT signing key provided")
        })?;

        Ok(Self::new(&signing_key, config.jwt_issuer().as_deref()))
    }
}

impl CredentialValidator for JwtCredentialValidator {
    fn validate(&self, token: &str) -> Result<Principal, RealtimeError> {
        let token_data = decode::<AccessClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| {
                let kind = match e.kind() {
                    JwtErrorKind::ExpiredSignature => AuthenticationErrorKind::Expired,
                    _ => AuthenticationErrorKind::Invalid,
                };
                RealtimeError::with_source(RealtimeErrorKind::Authentication(kind), e)
            })?;

        let claims = token_data.claims;
        Ok(Principal {
            id: claims.user_id,
            is_staff: claims.is_staff,
            roles: claims.groups,
        })
    }
}
