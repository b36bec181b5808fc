//! AES-256-GCM sealing of private key material at rest.
//!
//! Sealed blobs are `nonce (12 bytes) || ciphertext || tag (16 bytes)`. The
//! id of the record holding the blob is bound in as additional authenticated
//! data, so a blob only opens on the record it was sealed for.

use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, KeyInit, Payload},
};

use crate::error::CaError;

const NONCE_SIZE: usize = 12;
const TAG_SIZE: usize = 16;

pub const KEY_SIZE: usize = 32;

/// Seal `plaintext` for the record identified by `record_id`.
pub fn seal(key: &[u8; KEY_SIZE], plaintext: &[u8], record_id: &str) -> Result<Vec<u8>, CaError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    getrandom::getrandom(&mut nonce_bytes)
        .map_err(|e| CaError::KeySealing(format!("failed to generate nonce: {e}")))?;

    let ciphertext = cipher
        .encrypt(
            Nonce::from_slice(&nonce_bytes),
            Payload {
                msg: plaintext,
                aad: record_id.as_bytes(),
            },
        )
        .map_err(|e| CaError::KeySealing(e.to_string()))?;

    let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    sealed.extend_from_slice(&nonce_bytes);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// Open a blob produced by [`seal`] for the same `record_id`.
pub fn open(key: &[u8; KEY_SIZE], sealed: &[u8], record_id: &str) -> Result<Vec<u8>, CaError> {
    if sealed.len() < NONCE_SIZE + TAG_SIZE {
        return Err(CaError::KeySealing(format!(
            "sealed key too short: expected at least {} bytes, got {}",
            NONCE_SIZE + TAG_SIZE,
            sealed.len()
        )));
    }

    let (nonce, ciphertext) = sealed.split_at(NONCE_SIZE);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));

    cipher
        .decrypt(
            Nonce::from_slice(nonce),
            Payload {
                msg: ciphertext,
                aad: record_id.as_bytes(),
            },
        )
        .map_err(|e| CaError::KeySealing(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: [u8; KEY_SIZE] = [0x42; KEY_SIZE];

    #[test]
    fn opens_what_it_sealed() {
        let sealed = seal(&KEY, b"{\"kty\":\"EC\"}", "fingerprint-1").unwrap();
        assert_eq!(open(&KEY, &sealed, "fingerprint-1").unwrap(), b"{\"kty\":\"EC\"}");
    }

    #[test]
    fn fresh_nonce_per_seal() {
        let a = seal(&KEY, b"same", "id").unwrap();
        let b = seal(&KEY, b"same", "id").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn bound_to_record_id() {
        let sealed = seal(&KEY, b"secret", "fingerprint-1").unwrap();
        assert!(open(&KEY, &sealed, "fingerprint-2").is_err());
    }

    #[test]
    fn rejects_short_and_tampered_blobs() {
        assert!(matches!(
            open(&KEY, &[0u8; 10], "id"),
            Err(CaError::KeySealing(_))
        ));

        let mut sealed = seal(&KEY, b"secret", "id").unwrap();
        sealed[NONCE_SIZE] ^= 0xff;
        assert!(open(&KEY, &sealed, "id").is_err());
    }
}
