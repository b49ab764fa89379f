//! Tunnel endpoint derivation.

use bridge_core::{BridgeError, BridgeResult};
use url::Url;

/// Path of the tunnel endpoint, relative to the remote base URL.
pub const TUNNEL_PATH: &str = "api/llm-bridge/connect";

/// Build the WebSocket endpoint for `remote_url`, authenticated with `token`.
///
/// `http` becomes `ws` and `https` becomes `wss`; `ws`/`wss` URLs are kept.
/// Any path on the remote URL is preserved as a prefix.
pub fn tunnel_endpoint(remote_url: &str, token: &str) -> BridgeResult<Url> {
    let token = token.trim();
    if token.is_empty() {
        return Err(BridgeError::Configuration(
            "No bridge token configured. Set an auth token before connecting.".to_string(),
        ));
    }

    let mut url = Url::parse(remote_url.trim()).map_err(|e| {
        BridgeError::Configuration(format!("Invalid remote URL '{remote_url}': {e}"))
    })?;

    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(BridgeError::Configuration(format!(
                "Unsupported remote URL scheme '{other}'"
            )));
        }
    };
    url.set_scheme(scheme)
        .map_err(|()| BridgeError::Configuration(format!("Cannot use scheme {scheme}")))?;

    let path = format!("{}/{TUNNEL_PATH}", url.path().trim_end_matches('/'));
    url.set_path(&path);
    url.set_fragment(None);
    url.query_pairs_mut().clear().append_pair("token", token);
    Ok(url)
}
