//! Relay wiring: configuration, shared handler state, and the router.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::HeaderMap;
use axum::response::Response;
use axum::routing::any;
use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

use shroud_crypto::MasterKey;

use crate::store::SessionStore;
use crate::upstream::Upstream;
use crate::{handshake, transmit};

/// Relay configuration, resolved at startup.
#[derive(Clone)]
pub struct RelayConfig {
    /// Destination authorities the relay is permitted to contact,
    /// matched exactly against the target URL's host (with `host:port`
    /// when the URL carries an explicit port).
    pub whitelisted_hosts: HashSet<String>,
    /// Long-lived secret that unwraps client-proposed session keys.
    pub master_key: MasterKey,
    /// Sessions idle at least this long are evicted by the sweeper.
    pub max_session_age: Duration,
}

/// Shared state injected into the handlers.
#[derive(Clone)]
pub struct RelayState {
    pub(crate) store: Arc<SessionStore>,
    pub(crate) master_key: MasterKey,
    pub(crate) whitelist: Arc<HashSet<String>>,
    pub(crate) upstream: Upstream,
}

impl RelayState {
    pub fn new(config: RelayConfig) -> Self {
        Self {
            store: Arc::new(SessionStore::new(config.max_session_age)),
            master_key: config.master_key,
            whitelist: Arc::new(config.whitelisted_hosts),
            upstream: Upstream::new(),
        }
    }

    /// The session store, exposed so the caller can spawn the sweeper.
    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }
}

/// Build the relay router. Both endpoints accept any method — the
/// handlers only look at headers and the body.
pub fn router(state: RelayState) -> Router {
    Router::new()
        .route("/connect", any(handshake::handle))
        .route("/transmit", any(transmit::handle))
        .with_state(state)
}

/// Serve the relay on an already-bound listener.
pub async fn serve(listener: TcpListener, state: RelayState) -> std::io::Result<()> {
    info!("Relay listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state)).await
}

/// Read a header as a string, treating missing or non-ASCII values as
/// empty — the downstream decode and length checks reject those.
pub(crate) fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
}

/// The silent-drop response: the transport's default status and no
/// body. Every rejected request looks like this, regardless of cause.
pub(crate) fn empty_response() -> Response {
    Response::new(Body::empty())
}
