//! Key derivation using Argon2id.
//!
//! Argon2id is a memory-hard password hashing function that provides
//! resistance to both GPU and time-memory trade-off attacks. Parameters are
//! fixed per deployment; they are not stored in the vault file.

use argon2::{Algorithm, Argon2, Params, Version};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::keys::{random_bytes, MasterKey, KEY_LENGTH, SALT_LENGTH};
use pwvault_common::{Error, Result};

/// Parameters for Argon2id key derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB (e.g., 65536 = 64 MiB).
    pub memory_cost: u32,
    /// Number of iterations.
    pub time_cost: u32,
    /// Degree of parallelism.
    pub parallelism: u32,
}

impl KdfParams {
    /// Production parameters: 64 MiB, 3 passes, 4 lanes.
    ///
    /// This is the second recommended Argon2id setting in RFC 9106. One
    /// derivation costs a few hundred milliseconds on desktop hardware, which
    /// is at least the wall-clock cost of 100,000 PBKDF2-SHA256 iterations and
    /// adds memory hardness against GPU attacks.
    ///
    /// Every vault written with these parameters must stay openable, so they
    /// are never changed in place.
    pub const STANDARD: Self = Self {
        memory_cost: 65536,
        time_cost: 3,
        parallelism: 4,
    };

    pub fn new(memory_cost: u32, time_cost: u32, parallelism: u32) -> Self {
        Self {
            memory_cost,
            time_cost,
            parallelism,
        }
    }

    fn to_argon2(self) -> Result<Params> {
        Params::new(
            self.memory_cost,
            self.time_cost,
            self.parallelism,
            Some(KEY_LENGTH),
        )
        .map_err(|e| Error::Crypto(format!("Invalid KDF parameters: {}", e)))
    }

    /// Reject parameter sets Argon2 would refuse.
    pub fn validate(&self) -> Result<()> {
        self.to_argon2().map(|_| ())
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self::STANDARD
    }
}

/// Turns a master password into a [`MasterKey`].
///
/// The repository holds the derivation behind this trait so that the work
/// factor can be configured and call counts observed.
pub trait KeyDerivation: Send + Sync {
    fn derive(&self, password: &str, salt: &[u8]) -> Result<MasterKey>;
}

/// Argon2id v1.3 key derivation.
#[derive(Debug, Clone, Default)]
pub struct Argon2Kdf {
    params: KdfParams,
}

impl Argon2Kdf {
    pub fn new(params: KdfParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &KdfParams {
        &self.params
    }
}

impl KeyDerivation for Argon2Kdf {
    fn derive(&self, password: &str, salt: &[u8]) -> Result<MasterKey> {
        derive_key(password, salt, &self.params)
    }
}

/// Derive a master key from a password and salt using Argon2id.
///
/// # Errors
/// - `InvalidParameterLength` if `salt` is not 32 bytes
/// - `InvalidInput` if the password is empty
/// - `Crypto` if the Argon2id parameters are invalid
///
/// # Security
/// The UTF-8 copy of the password is held in a `Zeroizing` buffer, which is
/// wiped when it goes out of scope on every return path.
pub fn derive_key(password: &str, salt: &[u8], params: &KdfParams) -> Result<MasterKey> {
    Error::check_length("salt", SALT_LENGTH, salt.len())?;

    if password.is_empty() {
        return Err(Error::InvalidInput("Password cannot be empty".to_string()));
    }

    let password_bytes = Zeroizing::new(password.as_bytes().to_vec());

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params.to_argon2()?);

    let mut key_bytes = Zeroizing::new([0u8; KEY_LENGTH]);
    argon2
        .hash_password_into(&password_bytes, salt, &mut key_bytes[..])
        .map_err(|e| Error::Crypto(format!("Key derivation failed: {}", e)))?;

    Ok(MasterKey::from_bytes(*key_bytes))
}

/// Generate a random 32-byte KDF salt.
pub fn generate_salt() -> [u8; SALT_LENGTH] {
    random_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_params() -> KdfParams {
        KdfParams::new(1024, 1, 1)
    }

    #[test]
    fn test_derive_key_deterministic() {
        let salt = [42u8; SALT_LENGTH];

        let key1 = derive_key("test-password-123", &salt, &fast_params()).unwrap();
        let key2 = derive_key("test-password-123", &salt, &fast_params()).unwrap();

        assert_eq!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_derive_key_different_salt() {
        let key1 = derive_key("test-password-123", &[1u8; 32], &fast_params()).unwrap();
        let key2 = derive_key("test-password-123", &[2u8; 32], &fast_params()).unwrap();

        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_derive_key_different_password() {
        let salt = [42u8; SALT_LENGTH];

        let key1 = derive_key("password1", &salt, &fast_params()).unwrap();
        let key2 = derive_key("password2", &salt, &fast_params()).unwrap();

        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_derive_key_rejects_bad_salt_length() {
        let err = derive_key("password", &[0u8; 16], &fast_params()).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidParameterLength {
                param: "salt",
                expected: 32,
                actual: 16
            }
        ));
    }

    #[test]
    fn test_derive_key_empty_password_fails() {
        let salt = generate_salt();
        assert!(derive_key("", &salt, &fast_params()).is_err());
    }

    #[test]
    fn test_invalid_params_rejected() {
        assert!(KdfParams::new(1024, 0, 1).validate().is_err());
        assert!(fast_params().validate().is_ok());
        assert!(KdfParams::STANDARD.validate().is_ok());
    }

    #[test]
    fn test_argon2_kdf_matches_free_function() {
        let kdf = Argon2Kdf::new(fast_params());
        let salt = [5u8; SALT_LENGTH];

        let via_trait = kdf.derive("hunter2", &salt).unwrap();
        let via_fn = derive_key("hunter2", &salt, &fast_params()).unwrap();
        assert_eq!(via_trait.as_bytes(), via_fn.as_bytes());
    }

    #[test]
    fn test_generate_salt_is_random() {
        assert_ne!(generate_salt(), generate_salt());
    }
}
