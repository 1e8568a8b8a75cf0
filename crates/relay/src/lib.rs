//! Shroud Relay
//!
//! The relay core: session handshake, a concurrent session store with
//! idle expiry, and the encrypted request-relay pipeline.
//!
//! ## Protocol
//!
//! 1. The client generates a session key, wraps it under the relay's
//!    master key, and posts it to `/connect` with a self-chosen session
//!    id. The relay answers with an empty payload sealed under the new
//!    session key — proof it unwrapped the same key.
//! 2. Each `/transmit` carries an encrypted request descriptor (target
//!    URL, method, headers) and an encrypted body. The relay executes
//!    the request against a whitelisted destination and returns the
//!    destination's status with the response body sealed under the
//!    session key.
//!
//! Malformed or unauthenticated input is dropped without a response
//! body, and all such failures look identical to the caller.

mod handshake;
mod server;
mod store;
mod transmit;
mod upstream;

pub use server::{router, serve, RelayConfig, RelayState};
pub use store::{Session, SessionStore, SweeperHandle};
pub use upstream::UpstreamResponse;

/// Header carrying the client-chosen session identifier.
pub const SESSION_ID_HEADER: &str = "HT-Session-ID";

/// Header carrying the session key wrapped under the master key.
pub const SESSION_KEY_HEADER: &str = "HT-Session-Key";

/// Header carrying the sealed request descriptor.
pub const SESSION_HEADERS_HEADER: &str = "HT-Session-Headers";
