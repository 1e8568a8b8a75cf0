//! Shroud Cryptography
//!
//! Authenticated envelope used on every leg of the relay protocol: the
//! master-key wrap of client session keys, the request descriptor, and
//! both request and response bodies.

mod keys;
mod seal;

pub use keys::*;
pub use seal::*;
