//! Client transports.
//!
//! Both channels ride a WebSocket upgrade and share one session driver
//! ([`session::run_session`]); they differ only in how frames are decoded
//! and how replies are rendered:
//!
//! - [`socket`]: the duplex `{type, id, taskId, payload}` envelope on `/ws`
//! - [`control`]: `CommandRequest` / `ExtensionMessage` frames on `/control`

pub mod connection;
pub mod control;
pub mod session;
pub mod socket;

use axum::http::HeaderMap;
use serde::Serialize;
use tracing::warn;

/// API key header.
pub const API_KEY_HEADER: &str = "x-api-key";
/// Client id header for the streaming RPC channel.
pub const CLIENT_ID_HEADER: &str = "x-client-id";

/// Query parameters accepted on both upgrades.
#[derive(Clone, Debug, Default, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeQuery {
    /// Caller-chosen client id.
    pub client_id: Option<String>,
    /// API key, when not sent as a header.
    pub api_key: Option<String>,
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Whether the request carries the configured key. No key configured
/// means everything is allowed.
pub fn authorized(expected: Option<&str>, headers: &HeaderMap, query_key: Option<&str>) -> bool {
    let Some(expected) = expected else {
        return true;
    };
    header(headers, API_KEY_HEADER).or(query_key) == Some(expected)
}

/// Client id from the `x-client-id` header, else the query.
pub fn client_id_from(headers: &HeaderMap, query: &UpgradeQuery) -> Option<String> {
    header(headers, CLIENT_ID_HEADER)
        .map(str::to_owned)
        .or_else(|| query.client_id.clone().filter(|id| !id.trim().is_empty()))
}

/// Serialize an outbound frame; a failure is logged and the frame skipped.
pub(crate) fn encode<T: Serialize>(frame: &T) -> Option<String> {
    match serde_json::to_string(frame) {
        Ok(json) => Some(json),
        Err(error) => {
            warn!(%error, "failed to serialize reply frame");
            None
        }
    }
}
