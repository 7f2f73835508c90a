//! Construction-from-environment checks. Kept to a single test function:
//! the env vars are process-global and the harness runs tests in threads.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use trust_core::config;
use trust_core::error::TrustError;
use trust_core::keyring::AEAD_KEY_LEN;

#[test]
fn services_construct_from_env_and_refuse_half_configuration() {
    std::env::remove_var(config::KEYRING_ENV);
    std::env::remove_var(config::KEYRING_FILE_ENV);
    std::env::remove_var(config::ACTIVE_KEY_ID_ENV);
    std::env::remove_var(config::LEGACY_SECRET_ENV);
    std::env::remove_var(config::LEGACY_SECRET_FILE_ENV);

    // Nothing set: both constructors refuse to start.
    assert!(matches!(
        config::keyring_from_env().unwrap_err(),
        TrustError::Configuration(_)
    ));
    assert!(matches!(
        config::secret_cipher_from_env().unwrap_err(),
        TrustError::Configuration(_)
    ));

    // Active id set but keyring missing is still half-configured.
    std::env::set_var(config::ACTIVE_KEY_ID_ENV, "k1");
    assert!(matches!(
        config::keyring_from_env().unwrap_err(),
        TrustError::Configuration(_)
    ));

    std::env::set_var(
        config::KEYRING_ENV,
        format!("k1:{}", STANDARD.encode([5u8; AEAD_KEY_LEN])),
    );
    let keyring = config::keyring_from_env().unwrap();
    assert_eq!(keyring.active_key_id(), "k1");

    std::env::set_var(config::LEGACY_SECRET_ENV, "app-wide secret");
    let cipher = config::secret_cipher_from_env().unwrap();
    let sealed = cipher.encrypt("value").unwrap();
    assert_eq!(cipher.decrypt(&sealed).unwrap(), "value");

    // The `_FILE` variant wins over the inline value when both are present.
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("keyring");
    std::fs::write(
        &path,
        format!("k2:{}\n", STANDARD.encode([6u8; AEAD_KEY_LEN])),
    )
    .unwrap();
    std::env::set_var(config::KEYRING_FILE_ENV, &path);
    std::env::set_var(config::ACTIVE_KEY_ID_ENV, "k2");
    let from_file = config::keyring_from_env().unwrap();
    assert_eq!(from_file.active_key_id(), "k2");

    std::env::remove_var(config::KEYRING_ENV);
    std::env::remove_var(config::KEYRING_FILE_ENV);
    std::env::remove_var(config::ACTIVE_KEY_ID_ENV);
    std::env::remove_var(config::LEGACY_SECRET_ENV);
}
