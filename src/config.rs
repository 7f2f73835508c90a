//! Environment-driven construction inputs for the trust services.
//!
//! Everything here is read once, at service construction. Key rotation is a
//! reconfigure-and-redeploy action: there is no runtime mutation path for the
//! active key id.

use std::fs;

use crate::cipher::SecretCipher;
use crate::error::{TrustError, TrustResult};
use crate::keyring::Keyring;

/// Comma-separated `id:base64key` keyring. A `_FILE` variant is honored for
/// secret-mount deployments.
pub const KEYRING_ENV: &str = "TRUST_KEYRING";
pub const KEYRING_FILE_ENV: &str = "TRUST_KEYRING_FILE";

/// Key id used for new encryptions. Must name an entry in the keyring.
pub const ACTIVE_KEY_ID_ENV: &str = "TRUST_ACTIVE_KEY_ID";

/// Application-wide secret feeding the legacy single-key cipher.
pub const LEGACY_SECRET_ENV: &str = "SECRET_KEY";
pub const LEGACY_SECRET_FILE_ENV: &str = "SECRET_KEY_FILE";

pub fn read_optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn read_secret_env(value_key: &str, file_key: &str) -> TrustResult<Option<String>> {
    if let Some(path) = read_optional_env(file_key) {
        let contents = fs::read_to_string(&path).map_err(|err| {
            TrustError::Configuration(format!("failed to read {file_key} from {path}: {err}"))
        })?;
        let trimmed = contents.trim().to_string();
        if !trimmed.is_empty() {
            return Ok(Some(trimmed));
        }
    }

    Ok(read_optional_env(value_key))
}

/// Build the keyring from `TRUST_ACTIVE_KEY_ID` and `TRUST_KEYRING`.
///
/// Missing or malformed values are a `Configuration` error; the service
/// refuses to start half-configured rather than failing on first use.
pub fn keyring_from_env() -> TrustResult<Keyring> {
    let active_key_id = read_optional_env(ACTIVE_KEY_ID_ENV)
        .ok_or_else(|| TrustError::Configuration(format!("{ACTIVE_KEY_ID_ENV} must be set")))?;
    let keyring_spec = read_secret_env(KEYRING_ENV, KEYRING_FILE_ENV)?
        .ok_or_else(|| TrustError::Configuration(format!("{KEYRING_ENV} must be set")))?;
    Keyring::from_config(&active_key_id, &keyring_spec)
}

/// Build the legacy cipher from `SECRET_KEY`.
pub fn secret_cipher_from_env() -> TrustResult<SecretCipher> {
    let secret = read_secret_env(LEGACY_SECRET_ENV, LEGACY_SECRET_FILE_ENV)?
        .ok_or_else(|| TrustError::Configuration(format!("{LEGACY_SECRET_ENV} must be set")))?;
    Ok(SecretCipher::new(&secret))
}
