//! This module holds typed parameters for endpoint inputs.
//!
//! Parameters are deserialized (and so validated by type) before they reach a
//! handler.

pub(crate) mod connect;
