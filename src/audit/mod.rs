//! Append-only, hash-chained audit log.
//!
//! Every privileged action in the platform lands here as an immutable entry
//! whose hash covers the previous entry's hash. Retroactive edits to any
//! stored entry break recomputation from that point forward, which is the
//! whole tamper-evidence story: verification needs nothing but the rows
//! themselves.

pub mod canonical;
pub mod hasher;
pub mod logger;
pub mod models;
pub mod store;

pub use canonical::canonical_json;
pub use hasher::chain_hash;
pub use logger::{verify_entries, AuditLog, ChainIssue, ChainVerification};
pub use models::{AuditEntry, AuditFilter, NewAuditEntry};
pub use store::{AuditStore, MemoryAuditStore, PgAuditStore};
