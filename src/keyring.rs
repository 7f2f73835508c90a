//! Key material provider for envelope encryption.
//!
//! The keyring is parsed once from configuration: a comma-separated list of
//! `id:base64key` entries plus the id marked active for new encryptions.
//! Every parsed id stays usable for decryption, which is what makes key
//! rotation an add-switch-retire operation instead of a re-encrypt-the-world
//! migration.

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use zeroize::Zeroizing;

use crate::error::{TrustError, TrustResult};

/// ChaCha20-Poly1305 key size.
pub const AEAD_KEY_LEN: usize = 32;

/// key: trust-keyring
/// Parsed key material, keyed by stable id. Immutable after construction.
#[derive(Debug)]
pub struct Keyring {
    active_key_id: String,
    keys: HashMap<String, Zeroizing<[u8; AEAD_KEY_LEN]>>,
}

impl Keyring {
    /// Parse an `"id1:base64key1,id2:base64key2"` keyring spec.
    ///
    /// Empty ids, undecodable keys, wrong-length keys, an empty keyring, or
    /// an active id absent from the parsed map are all `Configuration`
    /// errors raised here, at startup, never deferred to first use.
    pub fn from_config(active_key_id: &str, keyring_spec: &str) -> TrustResult<Self> {
        let active_key_id = active_key_id.trim();
        if active_key_id.is_empty() {
            return Err(TrustError::Configuration(
                "active key id must not be empty".to_string(),
            ));
        }

        let mut keys = HashMap::new();
        for entry in keyring_spec.split(',') {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            let (id, encoded) = entry.split_once(':').ok_or_else(|| {
                TrustError::Configuration(format!("keyring entry `{entry}` is missing `id:key`"))
            })?;
            let id = id.trim();
            if id.is_empty() {
                return Err(TrustError::Configuration(
                    "keyring entry has an empty key id".to_string(),
                ));
            }
            let decoded = STANDARD.decode(encoded.trim()).map_err(|err| {
                TrustError::Configuration(format!("keyring key `{id}` is not valid base64: {err}"))
            })?;
            let material: [u8; AEAD_KEY_LEN] = decoded.try_into().map_err(|_| {
                TrustError::Configuration(format!(
                    "keyring key `{id}` must decode to {AEAD_KEY_LEN} bytes"
                ))
            })?;
            keys.insert(id.to_string(), Zeroizing::new(material));
        }

        if keys.is_empty() {
            return Err(TrustError::Configuration(
                "keyring contains no entries".to_string(),
            ));
        }
        if !keys.contains_key(active_key_id) {
            return Err(TrustError::Configuration(format!(
                "active key id `{active_key_id}` is not present in the keyring"
            )));
        }

        Ok(Self {
            active_key_id: active_key_id.to_string(),
            keys,
        })
    }

    pub fn active_key_id(&self) -> &str {
        &self.active_key_id
    }

    /// Key used for new encryptions. Guaranteed present by construction.
    pub fn active_key(&self) -> TrustResult<&[u8; AEAD_KEY_LEN]> {
        self.keys
            .get(&self.active_key_id)
            .map(|key| &**key)
            .ok_or_else(|| {
                TrustError::Configuration(format!(
                    "active key id `{}` is not present in the keyring",
                    self.active_key_id
                ))
            })
    }

    /// Look up a key by id, for decrypting previously written envelopes.
    pub fn key(&self, key_id: &str) -> TrustResult<&[u8; AEAD_KEY_LEN]> {
        self.keys
            .get(key_id)
            .map(|key| &**key)
            .ok_or_else(|| TrustError::KeyNotFound(key_id.to_string()))
    }

    pub fn key_ids(&self) -> impl Iterator<Item = &str> {
        self.keys.keys().map(String::as_str)
    }
}
