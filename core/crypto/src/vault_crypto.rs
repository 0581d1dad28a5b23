//! The single entry point the vault layer uses for cryptography.
//!
//! `VaultCrypto` composes compression, AES-256-CBC, HMAC-SHA256 and the
//! configured key derivation. Decryption failures from any stage collapse
//! into one opaque [`Error::DecryptionFailed`] so callers cannot tell a bad
//! pad from a bad gzip stream.

use std::sync::Arc;
use zeroize::{Zeroize, Zeroizing};

use crate::compress::{compress, decompress};
use crate::kdf::{Argon2Kdf, KdfParams, KeyDerivation};
use crate::keys::{CryptoParams, MasterKey, IV_LENGTH, KEY_LENGTH};
use crate::{cipher, mac};
use pwvault_common::{Error, Result, SensitiveBytes};

/// Cryptographic pipeline of a vault.
#[derive(Clone)]
pub struct VaultCrypto {
    kdf: Arc<dyn KeyDerivation>,
}

impl VaultCrypto {
    /// Use a custom key derivation (for tuning or instrumentation).
    pub fn new(kdf: Arc<dyn KeyDerivation>) -> Self {
        Self { kdf }
    }

    /// Argon2id with the given parameters.
    pub fn with_params(params: KdfParams) -> Self {
        Self::new(Arc::new(Argon2Kdf::new(params)))
    }

    /// `AES_CBC(GZIP(plaintext))`.
    pub fn encrypt_payload(&self, plaintext: &[u8], key: &[u8], iv: &[u8]) -> Result<Vec<u8>> {
        Error::check_length("key", KEY_LENGTH, key.len())?;
        Error::check_length("iv", IV_LENGTH, iv.len())?;

        let compressed = Zeroizing::new(compress(plaintext)?);
        cipher::encrypt(&compressed, key, iv)
    }

    /// `GUNZIP(AES_CBC⁻¹(ciphertext))`.
    ///
    /// # Errors
    /// - `InvalidParameterLength` for a malformed key or IV
    /// - `DecryptionFailed` for any failure in the cipher or decompression stage
    pub fn decrypt_payload(&self, ciphertext: &[u8], key: &[u8], iv: &[u8]) -> Result<SensitiveBytes> {
        Error::check_length("key", KEY_LENGTH, key.len())?;
        Error::check_length("iv", IV_LENGTH, iv.len())?;

        let compressed = Zeroizing::new(
            cipher::decrypt(ciphertext, key, iv).map_err(|_| Error::DecryptionFailed)?,
        );
        let plaintext = decompress(&compressed).map_err(|_| Error::DecryptionFailed)?;
        Ok(SensitiveBytes::new(plaintext))
    }

    /// Run the configured KDF. This is the slow, memory-hard step.
    pub fn derive_encryption_key(&self, password: &str, salt: &[u8]) -> Result<MasterKey> {
        self.kdf.derive(password, salt)
    }

    pub fn compute_hmac(&self, data: &[u8], key: &[u8]) -> Result<[u8; mac::TAG_LENGTH]> {
        mac::compute_hmac(data, key)
    }

    pub fn verify_hmac(&self, data: &[u8], key: &[u8], expected: &[u8]) -> Result<bool> {
        mac::verify_hmac(data, key, expected)
    }

    /// Fresh master seed, IV, salt and HMAC key for a new vault.
    pub fn generate_database_params(&self) -> CryptoParams {
        CryptoParams::generate()
    }
}

impl Default for VaultCrypto {
    fn default() -> Self {
        Self::with_params(KdfParams::default())
    }
}

/// Zero-fill every buffer in `buffers`.
///
/// For raw byte buffers held outside the key types, which wipe themselves.
pub fn clear_sensitive_data(buffers: &mut [&mut [u8]]) {
    for buffer in buffers.iter_mut() {
        buffer.zeroize();
    }
}

/// Wipe a password buffer, leaving it empty.
///
/// Vault entries call this on every secret string when they are dropped.
pub fn clear_password(password: &mut String) {
    password.zeroize();
}
