//! Encrypted request relay
//!
//! Authenticates a session, opens the request descriptor and body,
//! enforces the destination whitelist, and forwards the request. An
//! unknown session gets an explicit 401; every other rejection is the
//! same bodiless response as the handshake path.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use tracing::debug;
use url::Url;

use shroud_crypto::{open, seal, MIN_SEALED_LEN};

use crate::server::{empty_response, header_str, RelayState};
use crate::{SESSION_HEADERS_HEADER, SESSION_ID_HEADER};

/// Request descriptor carried in `HT-Session-Headers`: line 0 is the
/// target URL, line 1 the method, the rest `"Name: value"` pairs.
struct Descriptor<'a> {
    url: &'a str,
    method: &'a str,
    headers: Vec<(&'a str, &'a str)>,
}

impl<'a> Descriptor<'a> {
    fn parse(text: &'a str) -> Option<Self> {
        let mut lines = text.split('\n');
        let url = lines.next()?;
        let method = lines.next()?;
        // Lines without a ": " separator are skipped.
        let headers = lines.filter_map(|line| line.split_once(": ")).collect();
        Some(Self {
            url,
            method,
            headers,
        })
    }
}

/// Whitelist key for a parsed URL: the host, with the port appended
/// when the URL names one explicitly.
fn authority(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_owned(),
    })
}

pub(crate) async fn handle(
    State(state): State<RelayState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let session_id = header_str(&headers, SESSION_ID_HEADER);

    // Refresh activity before any validation: even a malformed request
    // from a live session counts as liveness.
    let Some(session) = state.store.touch(session_id).await else {
        return StatusCode::UNAUTHORIZED.into_response();
    };

    let Ok(sealed_descriptor) = BASE64.decode(header_str(&headers, SESSION_HEADERS_HEADER)) else {
        return empty_response();
    };
    if sealed_descriptor.len() < MIN_SEALED_LEN {
        return empty_response();
    }
    let Ok(descriptor) = open(session.key(), &sealed_descriptor) else {
        debug!("Descriptor did not authenticate for session {}", session_id);
        return empty_response();
    };

    let descriptor = String::from_utf8_lossy(&descriptor);
    let Some(request) = Descriptor::parse(&descriptor) else {
        return empty_response();
    };

    let Ok(url) = Url::parse(request.url) else {
        return empty_response();
    };
    let Some(host) = authority(&url) else {
        return empty_response();
    };
    if !state.whitelist.contains(&host) {
        debug!("Destination {} not whitelisted, dropping", host);
        return empty_response();
    }

    let Ok(payload) = open(session.key(), &body) else {
        return empty_response();
    };

    debug!("Relaying {} {} for session {}", request.method, url, session_id);
    let upstream = state
        .upstream
        .fetch(request.method, url, &request.headers, payload, &headers)
        .await;

    // The sentinel (status 0) cannot go on the wire; it degrades to 502
    // while the sealed empty body is still returned.
    let status = StatusCode::from_u16(upstream.status).unwrap_or(StatusCode::BAD_GATEWAY);
    match seal(session.key(), &upstream.body) {
        Ok(sealed) => (status, sealed).into_response(),
        Err(_) => status.into_response(),
    }
}
