//! WebSocket transport for the notification core.
//!
//! This module contains only the Axum handler that adapts a socket to the
//! connection lifecycle. Routing, membership and fan-out live in the
//! `realtime` crate.

pub mod handler;
