use thiserror::Error;

/// Error taxonomy for the trust subsystem.
///
/// `Authentication` is deliberately distinct from `NotFound` and from
/// `Encoding`: a tampered ciphertext must never be mistaken for absent data
/// or for a storage-format problem.
#[derive(Debug, Error)]
pub enum TrustError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("key `{0}` is not present in the keyring")]
    KeyNotFound(String),
    #[error("ciphertext failed authentication")]
    Authentication,
    #[error("malformed encoding in persisted record: {0}")]
    Encoding(String),
    #[error("record not found")]
    NotFound,
    #[error("audit chain tail moved during append")]
    Conflict,
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

pub type TrustResult<T> = Result<T, TrustError>;
