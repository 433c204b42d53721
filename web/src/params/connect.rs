use serde::Deserialize;

/// Query parameters of the live-connection handshake, e.g. `/ws/?token=<jwt>`.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ConnectParams {
    pub(crate) token: Option<String>,
}
