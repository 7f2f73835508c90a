//! Bearer token generation.

use std::sync::Arc;

use rand_core::{OsRng, RngCore};
use sha2::{Digest, Sha256};

use crate::envelope::{EncryptedEnvelope, EnvelopeCrypto};
use crate::error::{TrustError, TrustResult};

pub const DEFAULT_TOKEN_BYTES: usize = 32;
pub const TOKEN_PREFIX_LEN: usize = 12;

/// Below this the display prefix would cover most of the token.
const MIN_TOKEN_BYTES: usize = 8;

/// Everything derived from one freshly drawn token. The plaintext leaves the
/// subsystem exactly once, in the issuance/rotation response.
#[derive(Debug)]
pub struct GeneratedToken {
    pub token: String,
    pub token_hash: String,
    pub token_prefix: String,
    pub encrypted_token: EncryptedEnvelope,
}

#[derive(Clone)]
pub struct TokenGenerator {
    envelope: Arc<EnvelopeCrypto>,
}

impl TokenGenerator {
    pub fn new(envelope: Arc<EnvelopeCrypto>) -> Self {
        Self { envelope }
    }

    pub fn generate_default(&self) -> TrustResult<GeneratedToken> {
        self.generate(DEFAULT_TOKEN_BYTES)
    }

    pub fn generate(&self, byte_length: usize) -> TrustResult<GeneratedToken> {
        if byte_length < MIN_TOKEN_BYTES {
            return Err(TrustError::Configuration(format!(
                "token length must be at least {MIN_TOKEN_BYTES} bytes, got {byte_length}"
            )));
        }

        let mut raw = vec![0u8; byte_length];
        OsRng.fill_bytes(&mut raw);

        let token = hex::encode(raw);
        let token_hash = hash_token(&token);
        let token_prefix = token[..TOKEN_PREFIX_LEN].to_string();
        let encrypted_token = self.envelope.encrypt(token.as_bytes())?;

        Ok(GeneratedToken {
            token,
            token_hash,
            token_prefix,
            encrypted_token,
        })
    }
}

/// One-way lookup hash of a bearer token; used for verification so the
/// stored envelope never needs decrypting on the hot path.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
