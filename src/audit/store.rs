//! Durable storage collaborators for the audit chain.
//!
//! The chain itself only needs two operations: "what is the current tail
//! hash" and "append this entry". The Postgres store keeps a unique index on
//! `hash_prev` (plus a NULL-singleton index for the genesis row), so two
//! writers racing on the same tail surface as a retryable `Conflict` instead
//! of silently forking the chain.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, QueryBuilder};
use uuid::Uuid;

use crate::error::{TrustError, TrustResult};

use super::models::{AuditEntry, AuditFilter, NewAuditEntry};

#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn tail_hash(&self) -> TrustResult<Option<String>>;
    async fn insert_entry(&self, entry: NewAuditEntry) -> TrustResult<AuditEntry>;
    async fn list_entries(&self, filter: AuditFilter) -> TrustResult<Vec<AuditEntry>>;
    /// Full chain in id order, for verification replay.
    async fn all_entries(&self) -> TrustResult<Vec<AuditEntry>>;
}

pub struct PgAuditStore {
    pool: PgPool,
}

impl PgAuditStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditStore for PgAuditStore {
    async fn tail_hash(&self) -> TrustResult<Option<String>> {
        let hash = sqlx::query_scalar::<_, String>(
            "SELECT hash_current FROM audit_log ORDER BY id DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(hash)
    }

    async fn insert_entry(&self, entry: NewAuditEntry) -> TrustResult<AuditEntry> {
        let row = sqlx::query_as::<_, AuditEntryRow>(
            "INSERT INTO audit_log(actor_id, action, payload, created_at, hash_prev, hash_current) \
             VALUES($1, $2, $3, $4, $5, $6) \
             RETURNING id, actor_id, action, payload, created_at, hash_prev, hash_current",
        )
        .bind(entry.actor_id)
        .bind(&entry.action)
        .bind(&entry.payload)
        .bind(entry.created_at)
        .bind(&entry.hash_prev)
        .bind(&entry.hash_current)
        .fetch_one(&self.pool)
        .await
        .map_err(map_unique_violation)?;
        Ok(row.into())
    }

    async fn list_entries(&self, filter: AuditFilter) -> TrustResult<Vec<AuditEntry>> {
        let mut builder = QueryBuilder::new(
            "SELECT id, actor_id, action, payload, created_at, hash_prev, hash_current \
             FROM audit_log WHERE TRUE",
        );

        if let Some(actor_id) = filter.actor_id {
            builder.push(" AND actor_id = ");
            builder.push_bind(actor_id);
        }
        if let Some(action) = filter.action {
            builder.push(" AND action = ");
            builder.push_bind(action);
        }
        if let Some(start) = filter.start {
            builder.push(" AND created_at >= ");
            builder.push_bind(start);
        }
        if let Some(end) = filter.end {
            builder.push(" AND created_at <= ");
            builder.push_bind(end);
        }

        builder.push(" ORDER BY id DESC");

        if let Some(limit) = filter.limit {
            builder.push(" LIMIT ");
            builder.push_bind(limit);
        }

        let rows = builder
            .build_query_as::<AuditEntryRow>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(AuditEntry::from).collect())
    }

    async fn all_entries(&self) -> TrustResult<Vec<AuditEntry>> {
        let rows = sqlx::query_as::<_, AuditEntryRow>(
            "SELECT id, actor_id, action, payload, created_at, hash_prev, hash_current \
             FROM audit_log ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(AuditEntry::from).collect())
    }
}

fn map_unique_violation(err: sqlx::Error) -> TrustError {
    match &err {
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => TrustError::Conflict,
        _ => TrustError::Storage(err),
    }
}

#[derive(sqlx::FromRow)]
struct AuditEntryRow {
    pub id: i64,
    pub actor_id: Option<Uuid>,
    pub action: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub hash_prev: Option<String>,
    pub hash_current: String,
}

impl From<AuditEntryRow> for AuditEntry {
    fn from(row: AuditEntryRow) -> Self {
        Self {
            id: row.id,
            actor_id: row.actor_id,
            action: row.action,
            payload: row.payload,
            created_at: row.created_at,
            hash_prev: row.hash_prev,
            hash_current: row.hash_current,
        }
    }
}

/// In-memory store for tests and embedded tooling. Mirrors the Postgres
/// conflict behavior: an insert whose `hash_prev` no longer matches the tail
/// is rejected with `Conflict`.
#[derive(Default)]
pub struct MemoryAuditStore {
    entries: std::sync::Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditStore for MemoryAuditStore {
    async fn tail_hash(&self) -> TrustResult<Option<String>> {
        let entries = self.entries.lock().expect("audit store lock poisoned");
        Ok(entries.last().map(|entry| entry.hash_current.clone()))
    }

    async fn insert_entry(&self, entry: NewAuditEntry) -> TrustResult<AuditEntry> {
        let mut entries = self.entries.lock().expect("audit store lock poisoned");
        let tail = entries.last().map(|entry| entry.hash_current.clone());
        if entry.hash_prev != tail {
            return Err(TrustError::Conflict);
        }
        let stored = AuditEntry {
            id: entries.len() as i64 + 1,
            actor_id: entry.actor_id,
            action: entry.action,
            payload: entry.payload,
            created_at: entry.created_at,
            hash_prev: entry.hash_prev,
            hash_current: entry.hash_current,
        };
        entries.push(stored.clone());
        Ok(stored)
    }

    async fn list_entries(&self, filter: AuditFilter) -> TrustResult<Vec<AuditEntry>> {
        let entries = self.entries.lock().expect("audit store lock poisoned");
        let mut matched: Vec<AuditEntry> = entries
            .iter()
            .filter(|entry| {
                filter
                    .actor_id
                    .map(|actor| entry.actor_id == Some(actor))
                    .unwrap_or(true)
                    && filter
                        .action
                        .as_deref()
                        .map(|action| entry.action == action)
                        .unwrap_or(true)
                    && filter
                        .start
                        .map(|start| entry.created_at >= start)
                        .unwrap_or(true)
                    && filter.end.map(|end| entry.created_at <= end).unwrap_or(true)
            })
            .cloned()
            .collect();
        matched.reverse();
        if let Some(limit) = filter.limit {
            matched.truncate(limit.max(0) as usize);
        }
        Ok(matched)
    }

    async fn all_entries(&self) -> TrustResult<Vec<AuditEntry>> {
        let entries = self.entries.lock().expect("audit store lock poisoned");
        Ok(entries.clone())
    }
}
