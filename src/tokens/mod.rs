//! Customer API token issuance, rotation, and revocation.
//!
//! Verification and reveal are deliberately separate capabilities: the
//! lookup hash answers "is this bearer token valid" without any decryption,
//! while the envelope-encrypted copy exists solely so an authorized admin
//! can recover the original value.

pub mod generator;
pub mod models;
pub mod service;
pub mod store;

pub use generator::{GeneratedToken, TokenGenerator, DEFAULT_TOKEN_BYTES, TOKEN_PREFIX_LEN};
pub use models::{ApiToken, TokenMaterial};
pub use service::{ApiTokenService, IssuedToken};
pub use store::{ApiTokenStore, MemoryApiTokenStore, PgApiTokenStore};
