//! Session handshake
//!
//! Unwraps a client-proposed session key with the relay master key and
//! registers the session. The response body is an empty payload sealed
//! under the new session key, proving the relay derived the same key.
//! Every failure path returns the same bodiless response and leaves no
//! state behind, so a caller cannot tell a wrong master key from a
//! malformed blob.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use tracing::debug;

use shroud_crypto::{open, seal, MIN_KEY_LEN, MIN_SEALED_LEN};

use crate::server::{empty_response, header_str, RelayState};
use crate::{SESSION_ID_HEADER, SESSION_KEY_HEADER};

pub(crate) async fn handle(State(state): State<RelayState>, headers: HeaderMap) -> Response {
    let wrapped = match BASE64.decode(header_str(&headers, SESSION_KEY_HEADER)) {
        Ok(wrapped) => wrapped,
        Err(_) => return empty_response(),
    };

    // Too short to hold a nonce, a tag, and a minimum-length key.
    if wrapped.len() < MIN_SEALED_LEN + MIN_KEY_LEN {
        return empty_response();
    }

    let session_key = match open(state.master_key.as_bytes(), &wrapped) {
        Ok(key) => key,
        Err(_) => {
            debug!("Handshake key did not authenticate, dropping");
            return empty_response();
        }
    };

    if session_key.len() < MIN_KEY_LEN {
        return empty_response();
    }

    let session_id = header_str(&headers, SESSION_ID_HEADER);
    state
        .store
        .create_if_absent(session_id, session_key.clone())
        .await;
    debug!("Session {} established", session_id);

    match seal(&session_key, &[]) {
        Ok(ack) => ack.into_response(),
        Err(_) => empty_response(),
    }
}
