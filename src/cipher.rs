//! Legacy single-key secret cipher.
//!
//! Call sites that predate the keyring (customer credentials, agent tokens)
//! store secrets in a self-describing `v1:<nonce>:<ciphertext>` format under
//! one application-wide key. The key is derived once, at construction, by
//! hashing the shared `SECRET_KEY` into a fixed-length cipher key.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use rand_core::{OsRng, RngCore};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::error::{TrustError, TrustResult};

const VERSION_PREFIX: &str = "v1";
const NONCE_LEN: usize = 24;

#[derive(Debug)]
pub struct SecretCipher {
    key: Zeroizing<[u8; 32]>,
}

impl SecretCipher {
    pub fn new(app_secret: &str) -> Self {
        let digest = Sha256::digest(app_secret.as_bytes());
        Self {
            key: Zeroizing::new(digest.into()),
        }
    }

    /// Empty plaintext maps to the empty string so optional fields round-trip
    /// without a sentinel.
    pub fn encrypt(&self, plaintext: &str) -> TrustResult<String> {
        if plaintext.is_empty() {
            return Ok(String::new());
        }

        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let cipher = XChaCha20Poly1305::new((&*self.key).into());
        let ciphertext = cipher
            .encrypt(XNonce::from_slice(&nonce), plaintext.as_bytes())
            .map_err(|_| TrustError::Configuration("secret seal failed".to_string()))?;

        Ok(format!(
            "{VERSION_PREFIX}:{}:{}",
            STANDARD.encode(nonce),
            STANDARD.encode(ciphertext)
        ))
    }

    pub fn decrypt(&self, payload: &str) -> TrustResult<String> {
        if payload.is_empty() {
            return Ok(String::new());
        }

        let mut parts = payload.splitn(3, ':');
        let version = parts.next().unwrap_or_default();
        if version != VERSION_PREFIX {
            return Err(TrustError::Encoding(format!(
                "unsupported secret version `{version}`"
            )));
        }
        let (nonce_b64, ciphertext_b64) = match (parts.next(), parts.next()) {
            (Some(nonce), Some(ciphertext)) => (nonce, ciphertext),
            _ => {
                return Err(TrustError::Encoding(
                    "secret payload is missing nonce or ciphertext".to_string(),
                ))
            }
        };

        let nonce = STANDARD.decode(nonce_b64).map_err(|err| {
            TrustError::Encoding(format!("secret nonce is not valid base64: {err}"))
        })?;
        if nonce.len() != NONCE_LEN {
            return Err(TrustError::Encoding(format!(
                "secret nonce must be {NONCE_LEN} bytes, got {}",
                nonce.len()
            )));
        }
        let ciphertext = STANDARD.decode(ciphertext_b64).map_err(|err| {
            TrustError::Encoding(format!("secret ciphertext is not valid base64: {err}"))
        })?;

        let cipher = XChaCha20Poly1305::new((&*self.key).into());
        let plaintext = cipher
            .decrypt(XNonce::from_slice(&nonce), ciphertext.as_ref())
            .map_err(|_| TrustError::Authentication)?;

        String::from_utf8(plaintext)
            .map_err(|_| TrustError::Encoding("secret plaintext is not valid UTF-8".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let cipher = SecretCipher::new("app secret");
        let sealed = cipher.encrypt("db-password-123").unwrap();

        assert!(sealed.starts_with("v1:"));
        assert_eq!(cipher.decrypt(&sealed).unwrap(), "db-password-123");
    }

    #[test]
    fn empty_plaintext_is_a_no_op() {
        let cipher = SecretCipher::new("app secret");
        assert_eq!(cipher.encrypt("").unwrap(), "");
        assert_eq!(cipher.decrypt("").unwrap(), "");
    }

    #[test]
    fn distinct_nonces_per_encryption() {
        let cipher = SecretCipher::new("app secret");
        let first = cipher.encrypt("same").unwrap();
        let second = cipher.encrypt("same").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn rejects_unknown_version() {
        let cipher = SecretCipher::new("app secret");
        let sealed = cipher.encrypt("value").unwrap();
        let downgraded = sealed.replacen("v1:", "v0:", 1);

        assert!(matches!(
            cipher.decrypt(&downgraded).unwrap_err(),
            TrustError::Encoding(_)
        ));
    }

    #[test]
    fn rejects_malformed_base64() {
        let cipher = SecretCipher::new("app secret");
        assert!(matches!(
            cipher.decrypt("v1:!!!:!!!").unwrap_err(),
            TrustError::Encoding(_)
        ));
    }

    #[test]
    fn wrong_key_fails_authentication() {
        let sealed = SecretCipher::new("app secret").encrypt("value").unwrap();
        let other = SecretCipher::new("different secret");

        assert!(matches!(
            other.decrypt(&sealed).unwrap_err(),
            TrustError::Authentication
        ));
    }

    #[test]
    fn tampered_ciphertext_fails_authentication() {
        let cipher = SecretCipher::new("app secret");
        let sealed = cipher.encrypt("value").unwrap();

        let mut parts: Vec<&str> = sealed.split(':').collect();
        let mut raw = STANDARD.decode(parts[2]).unwrap();
        raw[0] ^= 0x01;
        let tampered_ct = STANDARD.encode(raw);
        parts[2] = &tampered_ct;
        let tampered = parts.join(":");

        assert!(matches!(
            cipher.decrypt(&tampered).unwrap_err(),
            TrustError::Authentication
        ));
    }
}
