//! Pure chain-hash computation.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::canonical::canonical_json;

/// Sentinel actor label hashed for platform-initiated entries.
const SYSTEM_ACTOR: &str = "system";

/// Field separator inside the hash input. Actions and hashes never contain
/// newlines, and the payload is canonical JSON, so `\n` is unambiguous.
const SEPARATOR: u8 = b'\n';

/// Compute `hash_current` for an entry.
///
/// Deterministic over `(hash_prev ?? "", actor ?? "system", action,
/// canonical_json(payload), rfc3339_micros(created_at))`. A verifier
/// recomputes exactly these inputs from the stored row, so a hash either
/// reproduces or the row was altered.
pub fn chain_hash(
    hash_prev: Option<&str>,
    actor_id: Option<Uuid>,
    action: &str,
    payload: &Value,
    created_at: DateTime<Utc>,
) -> String {
    let actor = actor_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| SYSTEM_ACTOR.to_string());

    let mut hasher = Sha256::new();
    hasher.update(hash_prev.unwrap_or("").as_bytes());
    hasher.update([SEPARATOR]);
    hasher.update(actor.as_bytes());
    hasher.update([SEPARATOR]);
    hasher.update(action.as_bytes());
    hasher.update([SEPARATOR]);
    hasher.update(canonical_json(payload).as_bytes());
    hasher.update([SEPARATOR]);
    hasher.update(
        created_at
            .to_rfc3339_opts(SecondsFormat::Micros, true)
            .as_bytes(),
    );
    hex::encode(hasher.finalize())
}
