//! Headers asking the transport to upgrade a request to a WebSocket stream
use std::collections::BTreeMap;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::Rng as _;

/// WebSocket subprotocols spoken by the master API streaming endpoints.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamProtocol {
    /// Raw binary frames, used for log streams.
    Binary,
    /// Multiplexed stdin/stdout/stderr channels, used for exec.
    Channel,
}

impl StreamProtocol {
    /// Value of the `Sec-WebSocket-Protocol` header
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Binary => "binary.k8s.io",
            Self::Channel => "channel.k8s.io",
        }
    }
}

/// Protocol-upgrade headers for a streaming request.
///
/// The `Sec-WebSocket-Key` nonce is random for every call.
pub fn upgrade_headers(protocol: Option<StreamProtocol>) -> BTreeMap<String, String> {
    let mut headers = BTreeMap::from([
        ("Connection".to_string(), "Upgrade".to_string()),
        ("Upgrade".to_string(), "websocket".to_string()),
        ("Sec-WebSocket-Key".to_string(), sec_websocket_key()),
        ("Sec-WebSocket-Version".to_string(), "13".to_string()),
    ]);
    if let Some(protocol) = protocol {
        headers.insert("Sec-WebSocket-Protocol".into(), protocol.as_str().into());
    }
    headers
}

/// Generate a random key for the `Sec-WebSocket-Key` header (RFC 6455 4.1).
pub fn sec_websocket_key() -> String {
    let mut nonce = [0u8; 16];
    rand::rng().fill(&mut nonce);
    STANDARD.encode(nonce)
}
