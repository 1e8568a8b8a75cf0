use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Nonce prepended to every sealed payload.
pub const NONCE_LEN: usize = 12;

/// Poly1305 authentication tag appended by the cipher.
pub const TAG_LEN: usize = 16;

/// Smallest well-formed sealed payload: a nonce and a tag around an
/// empty plaintext. Anything shorter is rejected before decryption.
pub const MIN_SEALED_LEN: usize = NONCE_LEN + TAG_LEN;

/// Minimum acceptable length for session key material.
pub const MIN_KEY_LEN: usize = 32;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Sealing failed")]
    SealFailed,
    #[error("Payload did not authenticate")]
    NotAuthentic,
    #[error("Invalid key")]
    InvalidKey,
    #[error("Ciphertext too short")]
    CiphertextTooShort,
}

/// Compress arbitrary-length key material into a cipher key.
fn cipher_key(key: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(key);
    hasher.finalize().into()
}

/// Seal a payload under `key` with ChaCha20-Poly1305.
///
/// A fresh random nonce is prepended to the ciphertext, so sealing the
/// same payload twice yields different bytes.
pub fn seal(key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = ChaCha20Poly1305::new_from_slice(&cipher_key(key))
        .map_err(|_| CryptoError::InvalidKey)?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| CryptoError::SealFailed)?;

    let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    sealed.extend_from_slice(&nonce_bytes);
    sealed.extend_from_slice(&ciphertext);

    Ok(sealed)
}

/// Open a payload sealed by [`seal`].
///
/// Tampering and a wrong key are indistinguishable: both return
/// [`CryptoError::NotAuthentic`], and callers must treat every error
/// from this function the same way.
pub fn open(key: &[u8], sealed: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if sealed.len() < MIN_SEALED_LEN {
        return Err(CryptoError::CiphertextTooShort);
    }

    let nonce = Nonce::from_slice(&sealed[..NONCE_LEN]);
    let ciphertext = &sealed[NONCE_LEN..];

    let cipher = ChaCha20Poly1305::new_from_slice(&cipher_key(key))
        .map_err(|_| CryptoError::InvalidKey)?;

    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| CryptoError::NotAuthentic)
}
