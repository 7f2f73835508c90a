//! Durable storage collaborators for API tokens.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{TrustError, TrustResult};

use super::models::{ApiToken, TokenMaterial};

#[async_trait]
pub trait ApiTokenStore: Send + Sync {
    async fn insert_token(&self, token: &ApiToken) -> TrustResult<()>;
    async fn find_by_id(&self, id: Uuid) -> TrustResult<Option<ApiToken>>;
    async fn find_by_hash(&self, token_hash: &str) -> TrustResult<Option<ApiToken>>;
    async fn list_for_customer(&self, customer_id: Uuid) -> TrustResult<Vec<ApiToken>>;
    /// Wholesale-replace the secret material; old material stops verifying
    /// the moment this commits.
    async fn replace_material(
        &self,
        id: Uuid,
        material: &TokenMaterial,
        updated_at: DateTime<Utc>,
    ) -> TrustResult<ApiToken>;
    async fn mark_revoked(&self, id: Uuid, updated_at: DateTime<Utc>) -> TrustResult<ApiToken>;
}

pub struct PgApiTokenStore {
    pool: PgPool,
}

impl PgApiTokenStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const TOKEN_COLUMNS: &str = "id, customer_id, name, scopes, token_prefix, token_hash, \
     encrypted_token, expires_at, revoked, created_at, updated_at";

#[async_trait]
impl ApiTokenStore for PgApiTokenStore {
    async fn insert_token(&self, token: &ApiToken) -> TrustResult<()> {
        let envelope = serde_json::to_value(&token.encrypted_token)
            .map_err(|err| TrustError::Encoding(format!("envelope serialization: {err}")))?;
        sqlx::query(
            "INSERT INTO api_tokens(id, customer_id, name, scopes, token_prefix, token_hash, \
             encrypted_token, expires_at, revoked, created_at, updated_at) \
             VALUES($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(token.id)
        .bind(token.customer_id)
        .bind(&token.name)
        .bind(&token.scopes)
        .bind(&token.token_prefix)
        .bind(&token.token_hash)
        .bind(envelope)
        .bind(token.expires_at)
        .bind(token.revoked)
        .bind(token.created_at)
        .bind(token.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> TrustResult<Option<ApiToken>> {
        let row = sqlx::query_as::<_, ApiTokenRow>(&format!(
            "SELECT {TOKEN_COLUMNS} FROM api_tokens WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(ApiToken::try_from).transpose()
    }

    async fn find_by_hash(&self, token_hash: &str) -> TrustResult<Option<ApiToken>> {
        let row = sqlx::query_as::<_, ApiTokenRow>(&format!(
            "SELECT {TOKEN_COLUMNS} FROM api_tokens WHERE token_hash = $1"
        ))
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;
        row.map(ApiToken::try_from).transpose()
    }

    async fn list_for_customer(&self, customer_id: Uuid) -> TrustResult<Vec<ApiToken>> {
        let rows = sqlx::query_as::<_, ApiTokenRow>(&format!(
            "SELECT {TOKEN_COLUMNS} FROM api_tokens WHERE customer_id = $1 ORDER BY created_at DESC"
        ))
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(ApiToken::try_from).collect()
    }

    async fn replace_material(
        &self,
        id: Uuid,
        material: &TokenMaterial,
        updated_at: DateTime<Utc>,
    ) -> TrustResult<ApiToken> {
        let envelope = serde_json::to_value(&material.encrypted_token)
            .map_err(|err| TrustError::Encoding(format!("envelope serialization: {err}")))?;
        let row = sqlx::query_as::<_, ApiTokenRow>(&format!(
            "UPDATE api_tokens SET token_prefix = $1, token_hash = $2, encrypted_token = $3, \
             updated_at = $4 WHERE id = $5 RETURNING {TOKEN_COLUMNS}"
        ))
        .bind(&material.token_prefix)
        .bind(&material.token_hash)
        .bind(envelope)
        .bind(updated_at)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(TrustError::NotFound)?;
        ApiToken::try_from(row)
    }

    async fn mark_revoked(&self, id: Uuid, updated_at: DateTime<Utc>) -> TrustResult<ApiToken> {
        let row = sqlx::query_as::<_, ApiTokenRow>(&format!(
            "UPDATE api_tokens SET revoked = TRUE, updated_at = $1 WHERE id = $2 \
             RETURNING {TOKEN_COLUMNS}"
        ))
        .bind(updated_at)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(TrustError::NotFound)?;
        ApiToken::try_from(row)
    }
}

#[derive(sqlx::FromRow)]
struct ApiTokenRow {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub name: String,
    pub scopes: Vec<String>,
    pub token_prefix: String,
    pub token_hash: String,
    pub encrypted_token: serde_json::Value,
    pub expires_at: Option<DateTime<Utc>>,
    pub revoked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ApiTokenRow> for ApiToken {
    type Error = TrustError;

    fn try_from(row: ApiTokenRow) -> TrustResult<Self> {
        let encrypted_token = serde_json::from_value(row.encrypted_token).map_err(|err| {
            TrustError::Encoding(format!("stored encrypted_token is not an envelope: {err}"))
        })?;
        Ok(Self {
            id: row.id,
            customer_id: row.customer_id,
            name: row.name,
            scopes: row.scopes,
            token_prefix: row.token_prefix,
            token_hash: row.token_hash,
            encrypted_token,
            expires_at: row.expires_at,
            revoked: row.revoked,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// In-memory store for tests and embedded tooling.
#[derive(Default)]
pub struct MemoryApiTokenStore {
    tokens: DashMap<Uuid, ApiToken>,
}

impl MemoryApiTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ApiTokenStore for MemoryApiTokenStore {
    async fn insert_token(&self, token: &ApiToken) -> TrustResult<()> {
        self.tokens.insert(token.id, token.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> TrustResult<Option<ApiToken>> {
        Ok(self.tokens.get(&id).map(|token| token.value().clone()))
    }

    async fn find_by_hash(&self, token_hash: &str) -> TrustResult<Option<ApiToken>> {
        Ok(self
            .tokens
            .iter()
            .find(|token| token.token_hash == token_hash)
            .map(|token| token.value().clone()))
    }

    async fn list_for_customer(&self, customer_id: Uuid) -> TrustResult<Vec<ApiToken>> {
        let mut tokens: Vec<ApiToken> = self
            .tokens
            .iter()
            .filter(|token| token.customer_id == customer_id)
            .map(|token| token.value().clone())
            .collect();
        tokens.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tokens)
    }

    async fn replace_material(
        &self,
        id: Uuid,
        material: &TokenMaterial,
        updated_at: DateTime<Utc>,
    ) -> TrustResult<ApiToken> {
        let mut token = self.tokens.get_mut(&id).ok_or(TrustError::NotFound)?;
        token.token_prefix = material.token_prefix.clone();
        token.token_hash = material.token_hash.clone();
        token.encrypted_token = material.encrypted_token.clone();
        token.updated_at = updated_at;
        Ok(token.value().clone())
    }

    async fn mark_revoked(&self, id: Uuid, updated_at: DateTime<Utc>) -> TrustResult<ApiToken> {
        let mut token = self.tokens.get_mut(&id).ok_or(TrustError::NotFound)?;
        token.revoked = true;
        token.updated_at = updated_at;
        Ok(token.value().clone())
    }
}
