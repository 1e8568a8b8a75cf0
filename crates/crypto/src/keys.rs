use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;

/// Fixed length of the relay master key.
pub const MASTER_KEY_LEN: usize = 32;

#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Invalid master key length: expected {MASTER_KEY_LEN} bytes, got {0}")]
    InvalidLength(usize),
    #[error("Invalid hex encoding")]
    InvalidHex,
}

/// Long-lived relay secret, used solely to unwrap client-proposed
/// session keys during the handshake.
#[derive(Clone)]
pub struct MasterKey([u8; MASTER_KEY_LEN]);

impl MasterKey {
    /// Generate a fresh random master key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; MASTER_KEY_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; MASTER_KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Parse from hex, as stored in settings files.
    pub fn from_hex(encoded: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(encoded.trim()).map_err(|_| KeyError::InvalidHex)?;
        let bytes: [u8; MASTER_KEY_LEN] = bytes
            .try_into()
            .map_err(|rejected: Vec<u8>| KeyError::InvalidLength(rejected.len()))?;
        Ok(Self(bytes))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

// Keep key bytes out of debug output.
impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterKey(..)")
    }
}
