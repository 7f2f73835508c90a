//! Envelope encryption over the configured keyring.
//!
//! Each ciphertext is persisted together with the id of the key that sealed
//! it and a fresh random nonce. The key id is also bound into the AEAD
//! associated data, so relabeling a stored envelope with a different key id
//! fails authentication instead of decrypting under the wrong key.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::error::{TrustError, TrustResult};
use crate::keyring::Keyring;

pub const NONCE_LEN: usize = 12;

/// key: trust-envelope
/// Persisted form of an encrypted secret: key id, nonce, and ciphertext,
/// base64 at rest.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct EncryptedEnvelope {
    pub key_id: String,
    pub nonce: String,
    pub ciphertext: String,
}

pub struct EnvelopeCrypto {
    keyring: Keyring,
}

impl EnvelopeCrypto {
    pub fn new(keyring: Keyring) -> Self {
        Self { keyring }
    }

    pub fn keyring(&self) -> &Keyring {
        &self.keyring
    }

    /// Seal `plaintext` under the active key with a fresh CSPRNG nonce.
    ///
    /// Nonces are never derived from persisted counters; reuse under one key
    /// breaks confidentiality.
    pub fn encrypt(&self, plaintext: &[u8]) -> TrustResult<EncryptedEnvelope> {
        let key_id = self.keyring.active_key_id().to_string();
        let key = self.keyring.active_key()?;

        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
        let ciphertext = cipher
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: plaintext,
                    aad: Self::aad(&key_id).as_bytes(),
                },
            )
            .map_err(|_| TrustError::Configuration("envelope seal failed".to_string()))?;

        Ok(EncryptedEnvelope {
            key_id,
            nonce: STANDARD.encode(nonce),
            ciphertext: STANDARD.encode(ciphertext),
        })
    }

    /// Open a stored envelope with the key its `key_id` names.
    ///
    /// Unknown key ids surface as `KeyNotFound`, malformed base64 as
    /// `Encoding`, and tag mismatches as `Authentication`. The three stay
    /// distinct so tampering is never mistaken for "no secret".
    pub fn decrypt(&self, envelope: &EncryptedEnvelope) -> TrustResult<Vec<u8>> {
        let key = self.keyring.key(&envelope.key_id)?;

        let nonce = STANDARD.decode(&envelope.nonce).map_err(|err| {
            TrustError::Encoding(format!("envelope nonce is not valid base64: {err}"))
        })?;
        if nonce.len() != NONCE_LEN {
            return Err(TrustError::Encoding(format!(
                "envelope nonce must be {NONCE_LEN} bytes, got {}",
                nonce.len()
            )));
        }
        let ciphertext = STANDARD.decode(&envelope.ciphertext).map_err(|err| {
            TrustError::Encoding(format!("envelope ciphertext is not valid base64: {err}"))
        })?;

        let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
        cipher
            .decrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: ciphertext.as_ref(),
                    aad: Self::aad(&envelope.key_id).as_bytes(),
                },
            )
            .map_err(|_| TrustError::Authentication)
    }

    fn aad(key_id: &str) -> String {
        format!("key:{key_id}")
    }
}
