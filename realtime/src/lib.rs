//! Real-time group fan-out for live LMS connections.
//!
//! This crate routes domain events (comments, enrollments, chat) to the subset of
//! connected users that should see them, over persistent bidirectional
//! connections.
//!
//! # Architecture
//!
//! - **Groups**: every authenticated connection joins `public` and its own
//!   `private:<user-id>` group; privileged users also join `role:editors`, and
//!   named roles map to `role:<name>` broadcast groups.
//! - **Dual-index registry**: connections by id, and member sets by group, each
//!   in a DashMap so membership changes on one group are serialized without a
//!   global lock.
//! - **Table-driven routing**: each event kind maps to a rule that yields frames
//!   and destination groups; a connection reachable through several destination
//!   groups receives each frame once.
//! - **Ephemeral messages**: events are never stored. Offline users miss them and
//!   see fresh data on their next page load.
//! - **Explicit state**: the registry, resolver and dispatcher are constructed and
//!   passed in by the caller; there is no process-wide singleton.
//!
//! # Message Flow
//!
//! 1. Client opens the WebSocket endpoint with `?token=<jwt>`
//! 2. `Lifecycle::authenticate` validates the token off the async executor
//! 3. `Lifecycle::join` resolves the group set and registers the connection
//! 4. A request handler commits a mutation and publishes a `DomainEvent`
//! 5. `NotificationEventHandler` forwards it to the `Dispatcher`, which sends the
//!    encoded `{"type", "message"}` frames to every member of the target groups
//! 6. On disconnect, `Lifecycle::close` leaves every group and unregisters
//!
//! # Modules
//!
//! - `connection`: ConnectionRegistry and type-safe ConnectionId
//! - `group`: group names and the membership resolver
//! - `dispatcher`: routing table and fan-out
//! - `lifecycle`: per-connection state machine
//! - `message`: outbound and inbound frame shapes
//! - `principal`: authenticated identity and the capabilities that produce it

pub mod connection;
pub mod dispatcher;
pub mod domain_event_handler;
pub mod error;
pub mod group;
pub mod lifecycle;
pub mod message;
pub mod principal;

pub use connection::{ConnectionId, ConnectionRegistry};
pub use dispatcher::Dispatcher;
pub use domain_event_handler::NotificationEventHandler;
pub use group::{GroupName, GroupResolver};
pub use lifecycle::{ConnectionState, Lifecycle, Session};
pub use principal::{CredentialValidator, Principal, Privilege, PrivilegePolicy};
