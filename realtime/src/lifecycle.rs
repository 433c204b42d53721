//! Per-connection lifecycle: `Connecting -> Authenticating -> Joined -> Closed`.
//!
//! The transport drives a `Session` through the `Lifecycle` methods. Credential
//! validation runs on the blocking pool so a slow user-store lookup does not
//! stall other connections, and no registry lock is held across it.

use crate::connection::{ConnectionId, ConnectionRegistry, FrameSender};
use crate::dispatcher::{DispatchReport, Dispatcher};
use crate::error::{AuthenticationErrorKind, Error, ErrorKind, LifecycleErrorKind};
use crate::group::{GroupName, GroupResolver};
use crate::message::InboundFrame;
use crate::principal::{CredentialValidator, Principal};
use chrono::{DateTime, Utc};
use events::DomainEvent;
use log::*;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Authenticating,
    Joined,
    Closed,
}

impl ConnectionState {
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, next),
            (Connecting, Authenticating)
                | (Connecting, Closed)
                | (Authenticating, Joined)
                | (Authenticating, Closed)
                | (Joined, Closed)
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Authenticating => write!(f, "authenticating"),
            ConnectionState::Joined => write!(f, "joined"),
            ConnectionState::Closed => write!(f, "closed"),
        }
    }
}

/// State of one live connection as seen by the transport task that owns it.
#[derive(Debug)]
pub struct Session {
    state: ConnectionState,
    principal: Option<Principal>,
    connection_id: Option<ConnectionId>,
    groups: Vec<GroupName>,
    created_at: DateTime<Utc>,
}

impl Session {
    fn new() -> Self {
        Self {
            state: ConnectionState::Connecting,
            principal: None,
            connection_id: None,
            groups: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    pub fn connection_id(&self) -> Option<&ConnectionId> {
        self.connection_id.as_ref()
    }

    pub fn groups(&self) -> &[GroupName] {
        &self.groups
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn transition(&mut self, next: ConnectionState) -> Result<(), Error> {
        if !self.state.can_transition_to(next) {
            return Err(Error::new(ErrorKind::Lifecycle(
                LifecycleErrorKind::InvalidTransition {
                    from: self.state.to_string(),
                    to: next.to_string(),
                },
            )));
        }
        trace!("Session {} -> {}", self.state, next);
        self.state = next;
        Ok(())
    }
}

/// Drives sessions through the lifecycle against a shared registry.
#[derive(Clone)]
pub struct Lifecycle {
    registry: Arc<ConnectionRegistry>,
    resolver: GroupResolver,
    validator: Arc<dyn CredentialValidator>,
    dispatcher: Dispatcher,
}

impl Lifecycle {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        resolver: GroupResolver,
        validator: Arc<dyn CredentialValidator>,
    ) -> Self {
        let dispatcher = Dispatcher::new(registry.clone());
        Self {
            registry,
            resolver,
            validator,
            dispatcher,
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Transport handshake started.
    pub fn connect(&self) -> Session {
        Session::new()
    }

    /// Validate the bearer credential taken from the connection's query parameters.
    ///
    /// On failure the session is `Closed` and the transport must refuse the connection.
    pub async fn authenticate(
        &self,
        session: &mut Session,
        token: Option<&str>,
    ) -> Result<(), Error> {
        session.transition(ConnectionState::Authenticating)?;

        let result = match token.map(str::trim).filter(|token| !token.is_empty()) {
            None => Err(Error::authentication(AuthenticationErrorKind::Missing)),
            Some(token) => {
                let validator = self.validator.clone();
                let token = token.to_string();
                tokio::task::spawn_blocking(move || validator.validate(&token))
                    .await
                    .unwrap_or_else(|e| {
                        Err(Error::with_source(
                            ErrorKind::Authentication(AuthenticationErrorKind::Invalid),
                            e,
                        ))
                    })
            }
        };

        match result {
            Ok(principal) => {
                debug!("Authenticated connection for user {}", principal.id);
                session.principal = Some(principal);
                Ok(())
            }
            Err(e) => {
                warn!("Refusing connection: {e}");
                session.transition(ConnectionState::Closed)?;
                Err(e)
            }
        }
    }

    /// Register the authenticated connection and join every resolved group.
    /// The transport accepts the connection once this returns.
    pub fn join(&self, session: &mut Session, sender: FrameSender) -> Result<ConnectionId, Error> {
        if session.state != ConnectionState::Authenticating {
            return Err(Error::new(ErrorKind::Lifecycle(
                LifecycleErrorKind::InvalidTransition {
                    from: session.state.to_string(),
                    to: ConnectionState::Joined.to_string(),
                },
            )));
        }

        let (principal, groups) = match session.principal.clone() {
            Some(principal) => match self.resolver.resolve(Some(&principal)) {
                Ok(groups) => (principal, groups),
                Err(e) => {
                    session.transition(ConnectionState::Closed)?;
                    return Err(e);
                }
            },
            None => {
                session.transition(ConnectionState::Closed)?;
                return Err(Error::authentication(AuthenticationErrorKind::Missing));
            }
        };

        let user_id = principal.id;
        let connection_id = self.registry.register(principal, sender);
        for group in &groups {
            if let Err(e) = self.registry.join(group, &connection_id) {
                warn!("Connection {connection_id} could not join {group}: {e}");
            }
        }

        session.transition(ConnectionState::Joined)?;
        session.connection_id = Some(connection_id.clone());
        session.groups = groups;

        info!(
            "Registered connection {connection_id} for user {user_id} in {} group(s)",
            session.groups.len()
        );
        Ok(connection_id)
    }

    /// Handle one inbound text frame as a chat message routed to `public`.
    pub fn receive(&self, session: &Session, text: &str) -> Result<DispatchReport, Error> {
        let principal = match (session.state, session.principal.as_ref()) {
            (ConnectionState::Joined, Some(principal)) => principal,
            (state, _) => {
                return Err(Error::new(ErrorKind::Lifecycle(
                    LifecycleErrorKind::NotJoined {
                        state: state.to_string(),
                    },
                )));
            }
        };

        let frame = InboundFrame::parse(text);
        Ok(self.dispatcher.dispatch(&DomainEvent::ChatMessageReceived {
            sender_id: principal.id,
            message: frame.message,
        }))
    }

    /// Tear the connection down from any state. Leaves every joined group, then
    /// unregisters the connection so pending sends to it are dropped. Idempotent.
    pub fn close(&self, session: &mut Session) {
        if session.state == ConnectionState::Closed {
            return;
        }

        if let Some(connection_id) = session.connection_id.as_ref() {
            for group in &session.groups {
                self.registry.leave(group, connection_id);
            }
            self.registry.unregister(connection_id);
            info!("Unregistered connection {connection_id}");
        }

        session.state = ConnectionState::Closed;
    }
}
