//! Audit append orchestration and chain verification.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{TrustError, TrustResult};

use super::hasher::chain_hash;
use super::models::{AuditEntry, AuditFilter, NewAuditEntry};
use super::store::AuditStore;

/// Attempts before a tail conflict is propagated to the caller.
const MAX_APPEND_ATTEMPTS: u32 = 3;

/// key: audit-log
/// Single entry point for appending to the chain. Clone-cheap; every platform
/// workflow that performs a privileged action holds one of these.
#[derive(Clone)]
pub struct AuditLog {
    store: Arc<dyn AuditStore>,
}

impl AuditLog {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }

    /// Append one entry: read the tail hash, chain-hash the new content over
    /// it, and hand the entry to the store.
    ///
    /// Storage failures propagate verbatim; silently losing an audit write
    /// is worse than loudly failing the action that triggered it. A tail
    /// conflict (another writer appended between our read and insert) is
    /// retried with a fresh tail before giving up.
    pub async fn append(
        &self,
        actor_id: Option<Uuid>,
        action: &str,
        payload: Value,
    ) -> TrustResult<AuditEntry> {
        let mut attempt = 1;
        loop {
            let hash_prev = self.store.tail_hash().await?;
            let created_at = Utc::now();
            let hash_current = chain_hash(
                hash_prev.as_deref(),
                actor_id,
                action,
                &payload,
                created_at,
            );

            let entry = NewAuditEntry {
                actor_id,
                action: action.to_string(),
                payload: payload.clone(),
                created_at,
                hash_prev,
                hash_current,
            };

            match self.store.insert_entry(entry).await {
                Ok(stored) => {
                    info!(
                        entry_id = stored.id,
                        action,
                        actor = ?stored.actor_id,
                        "appended audit entry"
                    );
                    return Ok(stored);
                }
                Err(TrustError::Conflict) if attempt < MAX_APPEND_ATTEMPTS => {
                    warn!(attempt, action, "audit tail moved during append; retrying");
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    pub async fn entries(&self, filter: AuditFilter) -> TrustResult<Vec<AuditEntry>> {
        self.store.list_entries(filter).await
    }

    /// Replay the stored chain and recompute every hash.
    pub async fn verify_chain(&self) -> TrustResult<ChainVerification> {
        let entries = self.store.all_entries().await?;
        Ok(verify_entries(&entries))
    }
}

/// Verify a chain slice without touching storage; exposed so exported or
/// archived chains can be checked offline.
pub fn verify_entries(entries: &[AuditEntry]) -> ChainVerification {
    let mut issues = Vec::new();
    let mut previous: Option<&AuditEntry> = None;

    for entry in entries {
        match previous {
            None => {
                if entry.hash_prev.is_some() {
                    issues.push(ChainIssue::SpuriousGenesis { id: entry.id });
                }
            }
            Some(prior) => {
                if entry.hash_prev.as_deref() != Some(prior.hash_current.as_str()) {
                    issues.push(ChainIssue::BrokenLink {
                        id: entry.id,
                        expected_prev: prior.hash_current.clone(),
                        stored_prev: entry.hash_prev.clone(),
                    });
                }
            }
        }

        let recomputed = chain_hash(
            entry.hash_prev.as_deref(),
            entry.actor_id,
            &entry.action,
            &entry.payload,
            entry.created_at,
        );
        if recomputed != entry.hash_current {
            issues.push(ChainIssue::HashMismatch {
                id: entry.id,
                recomputed,
                stored: entry.hash_current.clone(),
            });
        }

        previous = Some(entry);
    }

    ChainVerification {
        valid: issues.is_empty(),
        entries_checked: entries.len(),
        issues,
    }
}

#[derive(Clone, Debug)]
pub struct ChainVerification {
    pub valid: bool,
    pub entries_checked: usize,
    pub issues: Vec<ChainIssue>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChainIssue {
    /// A non-first entry claims to be the start of the chain, or the first
    /// entry carries a previous hash.
    SpuriousGenesis { id: i64 },
    /// `hash_prev` does not match the preceding entry's `hash_current`.
    BrokenLink {
        id: i64,
        expected_prev: String,
        stored_prev: Option<String>,
    },
    /// Recomputing the entry's own hash from its fields diverges.
    HashMismatch {
        id: i64,
        recomputed: String,
        stored: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::store::MemoryAuditStore;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn log() -> AuditLog {
        AuditLog::new(Arc::new(MemoryAuditStore::new()))
    }

    #[tokio::test]
    async fn appends_form_a_linear_chain() {
        let log = log();
        let first = log.append(None, "a", json!({})).await.unwrap();
        let second = log.append(None, "b", json!({})).await.unwrap();
        let third = log.append(None, "c", json!({})).await.unwrap();

        assert_eq!(first.hash_prev, None);
        assert_eq!(second.hash_prev.as_deref(), Some(first.hash_current.as_str()));
        assert_eq!(third.hash_prev.as_deref(), Some(second.hash_current.as_str()));

        let verification = log.verify_chain().await.unwrap();
        assert!(verification.valid);
        assert_eq!(verification.entries_checked, 3);
    }

    #[tokio::test]
    async fn tampering_invalidates_from_the_edited_entry_onward() {
        let log = log();
        for action in ["a", "b", "c"] {
            log.append(None, action, json!({"step": action})).await.unwrap();
        }

        let mut entries = log.entries(AuditFilter::default()).await.unwrap();
        entries.reverse();
        entries[1].payload = json!({"step": "forged"});

        let verification = verify_entries(&entries);
        assert!(!verification.valid);
        assert!(verification
            .issues
            .iter()
            .any(|issue| matches!(issue, ChainIssue::HashMismatch { id: 2, .. })));
    }

    #[tokio::test]
    async fn corrupted_later_entry_with_null_prev_is_flagged() {
        let log = log();
        for action in ["a", "b"] {
            log.append(None, action, json!({})).await.unwrap();
        }

        let mut entries = log.entries(AuditFilter::default()).await.unwrap();
        entries.reverse();
        let stored_prev = entries[1].hash_prev.take();

        let verification = verify_entries(&entries);
        assert!(!verification.valid);
        assert!(verification.issues.iter().any(|issue| matches!(
            issue,
            ChainIssue::BrokenLink { id: 2, stored_prev: None, .. }
        )));
        assert!(stored_prev.is_some());
    }

    /// Store that reports a stale tail on the first insert, like a Postgres
    /// unique violation when another writer lands first.
    struct ContendedStore {
        inner: MemoryAuditStore,
        conflicts_remaining: AtomicU32,
    }

    #[async_trait]
    impl AuditStore for ContendedStore {
        async fn tail_hash(&self) -> TrustResult<Option<String>> {
            self.inner.tail_hash().await
        }

        async fn insert_entry(&self, entry: NewAuditEntry) -> TrustResult<AuditEntry> {
            if self.conflicts_remaining.fetch_update(
                Ordering::SeqCst,
                Ordering::SeqCst,
                |n| n.checked_sub(1),
            ).is_ok()
            {
                return Err(TrustError::Conflict);
            }
            self.inner.insert_entry(entry).await
        }

        async fn list_entries(&self, filter: AuditFilter) -> TrustResult<Vec<AuditEntry>> {
            self.inner.list_entries(filter).await
        }

        async fn all_entries(&self) -> TrustResult<Vec<AuditEntry>> {
            self.inner.all_entries().await
        }
    }

    #[tokio::test]
    async fn append_retries_through_a_tail_conflict() {
        let log = AuditLog::new(Arc::new(ContendedStore {
            inner: MemoryAuditStore::new(),
            conflicts_remaining: AtomicU32::new(1),
        }));

        let entry = log.append(None, "raced", json!({})).await.unwrap();
        assert_eq!(entry.id, 1);
    }

    #[tokio::test]
    async fn append_gives_up_after_bounded_retries() {
        let log = AuditLog::new(Arc::new(ContendedStore {
            inner: MemoryAuditStore::new(),
            conflicts_remaining: AtomicU32::new(u32::MAX),
        }));

        assert!(matches!(
            log.append(None, "raced", json!({})).await.unwrap_err(),
            TrustError::Conflict
        ));
    }

    #[tokio::test]
    async fn filter_narrows_by_action_and_actor() {
        let log = log();
        let actor = Uuid::new_v4();
        log.append(Some(actor), "token.issued", json!({})).await.unwrap();
        log.append(None, "server.started", json!({})).await.unwrap();
        log.append(Some(actor), "server.started", json!({})).await.unwrap();

        let by_actor = log
            .entries(AuditFilter {
                actor_id: Some(actor),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_actor.len(), 2);

        let by_action = log
            .entries(AuditFilter {
                action: Some("server.started".to_string()),
                limit: Some(1),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_action.len(), 1);
        assert_eq!(by_action[0].id, 3);
    }
}
