//! Postgres-backed store tests, in the same shape as the in-memory suites.

use std::sync::Arc;

use serde_json::json;
use sqlx::PgPool;
use trust_core::audit::{AuditFilter, AuditLog, AuditStore, NewAuditEntry, PgAuditStore};
use trust_core::error::TrustError;
use trust_core::tokens::{ApiTokenStore, PgApiTokenStore, TokenMaterial};
use uuid::Uuid;

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn pg_audit_chain_appends_and_verifies(pool: PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(&pool).await?;

    let log = AuditLog::new(Arc::new(PgAuditStore::new(pool)));
    let actor = Uuid::new_v4();
    log.append(None, "a", json!({})).await?;
    log.append(Some(actor), "b", json!({"n": 1})).await?;
    log.append(None, "c", json!({})).await?;

    let verification = log.verify_chain().await?;
    assert!(verification.valid, "issues: {:?}", verification.issues);
    assert_eq!(verification.entries_checked, 3);

    let filtered = log
        .entries(AuditFilter {
            actor_id: Some(actor),
            ..Default::default()
        })
        .await?;
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].action, "b");

    Ok(())
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn pg_stale_tail_insert_is_a_conflict(pool: PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(&pool).await?;

    let store = PgAuditStore::new(pool.clone());
    let log = AuditLog::new(Arc::new(PgAuditStore::new(pool)));
    let first = log.append(None, "a", json!({})).await?;
    log.append(None, "b", json!({})).await?;

    // Hand-build an entry chained to the stale tail; the unique index on
    // hash_prev must reject it.
    let stale = NewAuditEntry {
        actor_id: None,
        action: "raced".to_string(),
        payload: json!({}),
        created_at: chrono::Utc::now(),
        hash_prev: Some(first.hash_current.clone()),
        hash_current: "0".repeat(64),
    };
    let err = store.insert_entry(stale).await.unwrap_err();
    assert!(matches!(err, TrustError::Conflict));

    Ok(())
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn pg_token_store_round_trips(pool: PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(&pool).await?;

    let store = PgApiTokenStore::new(pool);
    let token = trust_core::tokens::ApiToken {
        id: Uuid::new_v4(),
        customer_id: Uuid::new_v4(),
        name: "ci".to_string(),
        scopes: vec!["deploy".to_string()],
        token_prefix: "abcdefabcdef".to_string(),
        token_hash: "f".repeat(64),
        encrypted_token: trust_core::envelope::EncryptedEnvelope {
            key_id: "k1".to_string(),
            nonce: "AAAA".to_string(),
            ciphertext: "BBBB".to_string(),
        },
        expires_at: None,
        revoked: false,
        created_at: chrono::Utc::now(),
        updated_at: chrono::Utc::now(),
    };
    store.insert_token(&token).await?;

    let by_hash = store.find_by_hash(&token.token_hash).await?.unwrap();
    assert_eq!(by_hash.id, token.id);
    assert_eq!(by_hash.encrypted_token, token.encrypted_token);

    let material = TokenMaterial {
        token_prefix: "121212121212".to_string(),
        token_hash: "e".repeat(64),
        encrypted_token: token.encrypted_token.clone(),
    };
    let rotated = store
        .replace_material(token.id, &material, chrono::Utc::now())
        .await?;
    assert_eq!(rotated.token_hash, material.token_hash);
    assert!(store.find_by_hash(&token.token_hash).await?.is_none());

    let revoked = store.mark_revoked(token.id, chrono::Utc::now()).await?;
    assert!(revoked.revoked);

    let listed = store.list_for_customer(token.customer_id).await?;
    assert_eq!(listed.len(), 1);

    Ok(())
}
