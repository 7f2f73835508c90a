//! API token lifecycle orchestration.
//!
//! Every mutation persists the token record and appends an audit entry whose
//! payload carries the display prefix plus the token metadata, never the
//! plaintext and never the lookup hash.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::audit::AuditLog;
use crate::envelope::EnvelopeCrypto;
use crate::error::{TrustError, TrustResult};

use super::generator::{hash_token, TokenGenerator};
use super::models::{ApiToken, TokenMaterial};
use super::store::ApiTokenStore;

pub const ACTION_TOKEN_CREATED: &str = "api_token.created";
pub const ACTION_TOKEN_ROTATED: &str = "api_token.rotated";
pub const ACTION_TOKEN_REVOKED: &str = "api_token.revoked";

/// Issuance result. `token` is the only copy of the plaintext that ever
/// leaves the subsystem.
#[derive(Debug)]
pub struct IssuedToken {
    pub token: String,
    pub record: ApiToken,
}

/// key: api-token-service
/// Entry point for token issuance, rotation, revocation, verification, and
/// admin reveal.
#[derive(Clone)]
pub struct ApiTokenService {
    store: Arc<dyn ApiTokenStore>,
    envelope: Arc<EnvelopeCrypto>,
    generator: TokenGenerator,
    audit: AuditLog,
}

impl ApiTokenService {
    pub fn new(store: Arc<dyn ApiTokenStore>, envelope: Arc<EnvelopeCrypto>, audit: AuditLog) -> Self {
        let generator = TokenGenerator::new(envelope.clone());
        Self {
            store,
            envelope,
            generator,
            audit,
        }
    }

    pub async fn issue_token(
        &self,
        customer_id: Uuid,
        name: &str,
        scopes: Vec<String>,
        actor_id: Option<Uuid>,
        expires_at: Option<DateTime<Utc>>,
    ) -> TrustResult<IssuedToken> {
        let generated = self.generator.generate_default()?;
        let now = Utc::now();
        let record = ApiToken {
            id: Uuid::new_v4(),
            customer_id,
            name: name.to_string(),
            scopes,
            token_prefix: generated.token_prefix,
            token_hash: generated.token_hash,
            encrypted_token: generated.encrypted_token,
            expires_at,
            revoked: false,
            created_at: now,
            updated_at: now,
        };

        self.store.insert_token(&record).await?;
        self.audit
            .append(
                actor_id,
                ACTION_TOKEN_CREATED,
                json!({
                    "token_id": record.id,
                    "customer_id": record.customer_id,
                    "prefix": record.token_prefix,
                    "name": record.name,
                    "scopes": record.scopes,
                    "expires_at": record.expires_at,
                }),
            )
            .await?;

        info!(
            token_id = %record.id,
            customer_id = %record.customer_id,
            prefix = %record.token_prefix,
            "issued api token"
        );
        Ok(IssuedToken {
            token: generated.token,
            record,
        })
    }

    /// Replace the token's secret material in place. The previous plaintext
    /// stops verifying the instant the store commits.
    pub async fn rotate_token(&self, id: Uuid, actor_id: Option<Uuid>) -> TrustResult<IssuedToken> {
        let existing = self.store.find_by_id(id).await?.ok_or(TrustError::NotFound)?;

        let generated = self.generator.generate_default()?;
        let material = TokenMaterial {
            token_prefix: generated.token_prefix,
            token_hash: generated.token_hash,
            encrypted_token: generated.encrypted_token,
        };
        let record = self
            .store
            .replace_material(id, &material, Utc::now())
            .await?;

        self.audit
            .append(
                actor_id,
                ACTION_TOKEN_ROTATED,
                json!({
                    "token_id": record.id,
                    "customer_id": record.customer_id,
                    "previous_prefix": existing.token_prefix,
                    "prefix": record.token_prefix,
                    "name": record.name,
                    "scopes": record.scopes,
                    "expires_at": record.expires_at,
                }),
            )
            .await?;

        info!(
            token_id = %record.id,
            prefix = %record.token_prefix,
            "rotated api token"
        );
        Ok(IssuedToken {
            token: generated.token,
            record,
        })
    }

    /// Idempotent: revoking an already-revoked token is a no-op, and the
    /// audit entry is emitted only on the transition.
    pub async fn revoke_token(&self, id: Uuid, actor_id: Option<Uuid>) -> TrustResult<ApiToken> {
        let existing = self.store.find_by_id(id).await?.ok_or(TrustError::NotFound)?;
        if existing.revoked {
            return Ok(existing);
        }

        let record = self.store.mark_revoked(id, Utc::now()).await?;
        self.audit
            .append(
                actor_id,
                ACTION_TOKEN_REVOKED,
                json!({
                    "token_id": record.id,
                    "customer_id": record.customer_id,
                    "prefix": record.token_prefix,
                    "name": record.name,
                }),
            )
            .await?;

        info!(token_id = %record.id, "revoked api token");
        Ok(record)
    }

    /// Hash-based verification. Never touches the encrypted copy, so a
    /// missing or undecryptable envelope cannot affect the outcome. Revoked
    /// and expired tokens do not verify.
    pub async fn verify_token(&self, token: &str) -> TrustResult<Option<ApiToken>> {
        let found = self.store.find_by_hash(&hash_token(token)).await?;
        Ok(found.filter(|record| !record.revoked && !record.is_expired(Utc::now())))
    }

    /// Explicit admin reveal of the stored plaintext. Separate from
    /// verification by design; callers are expected to gate and audit the
    /// access themselves via `issue`-level actor attribution.
    pub async fn reveal_token(&self, id: Uuid) -> TrustResult<String> {
        let record = self.store.find_by_id(id).await?.ok_or(TrustError::NotFound)?;
        let plaintext = self.envelope.decrypt(&record.encrypted_token)?;
        String::from_utf8(plaintext)
            .map_err(|_| TrustError::Encoding("revealed token is not valid UTF-8".to_string()))
    }

    pub async fn list_tokens(&self, customer_id: Uuid) -> TrustResult<Vec<ApiToken>> {
        self.store.list_for_customer(customer_id).await
    }
}
