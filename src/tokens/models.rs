use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::envelope::EncryptedEnvelope;

/// key: api-token-record
/// Canonical API token record. `token_prefix` is display-only; `token_hash`
/// is the one-way verification handle; `encrypted_token` is the reversible
/// admin-reveal copy. The plaintext itself is never stored.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiToken {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub name: String,
    pub scopes: Vec<String>,
    pub token_prefix: String,
    pub token_hash: String,
    pub encrypted_token: EncryptedEnvelope,
    pub expires_at: Option<DateTime<Utc>>,
    pub revoked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ApiToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| at <= now).unwrap_or(false)
    }
}

/// Replacement secret material written at rotation: the three derived fields
/// always change together so stale combinations can never verify.
#[derive(Clone, Debug)]
pub struct TokenMaterial {
    pub token_prefix: String,
    pub token_hash: String,
    pub encrypted_token: EncryptedEnvelope,
}
