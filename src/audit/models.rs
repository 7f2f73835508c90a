use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// key: audit-entry
/// One immutable link in the audit chain. `actor_id` is `None` for
/// platform-initiated actions; the distinction is preserved for every
/// consumer rather than flattened into a sentinel "system" row.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AuditEntry {
    pub id: i64,
    pub actor_id: Option<Uuid>,
    pub action: String,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
    pub hash_prev: Option<String>,
    pub hash_current: String,
}

/// Entry as handed to the store, before an id is assigned.
#[derive(Clone, Debug)]
pub struct NewAuditEntry {
    pub actor_id: Option<Uuid>,
    pub action: String,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
    pub hash_prev: Option<String>,
    pub hash_current: String,
}

/// key: audit-filter
/// Filter envelope applied to audit queries from console and CLI workflows.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct AuditFilter {
    pub actor_id: Option<Uuid>,
    pub action: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}
