//! Claims carried by the access tokens presented on live connections.
//!
//! Tokens are issued by the HTTP authentication layer; this module only reads them.

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct AccessClaims {
    pub(crate) exp: usize,
    pub(crate) user_id: i64,
    #[serde(default)]
    pub(crate) is_staff: bool,
    /// Names of the auth groups (roles) the user belongs to.
    #[serde(default)]
    pub(crate) groups: Vec<String>,
}
