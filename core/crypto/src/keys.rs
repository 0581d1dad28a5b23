//! Key and parameter types with secure memory handling.
//!
//! All key types zeroize their memory on drop. Their `Debug` output never
//! contains key bytes.

use hkdf::Hkdf;
use rand::{rngs::OsRng, RngCore};
use sha2::Sha256;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use pwvault_common::{Error, Result};

/// Length of symmetric keys in bytes (256-bit).
pub const KEY_LENGTH: usize = 32;

/// Length of the KDF salt in bytes.
pub const SALT_LENGTH: usize = 32;

/// AES block size, which is also the CBC IV length.
pub const IV_LENGTH: usize = 16;

/// Length of the per-save master seed in bytes.
pub const MASTER_SEED_LENGTH: usize = 32;

/// Length of the HMAC key in bytes.
pub const HMAC_KEY_LENGTH: usize = 32;

const CIPHER_KEY_INFO: &[u8] = b"pwvault-cipher-key-v1";
const HMAC_WRAP_INFO: &[u8] = b"pwvault-hmac-key-wrap-v1";

/// Fill a fixed-size buffer from the operating system CSPRNG.
pub(crate) fn random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    OsRng.fill_bytes(&mut bytes);
    bytes
}

fn hkdf_expand(ikm: &[u8], salt: Option<&[u8]>, info: &[u8]) -> Result<[u8; KEY_LENGTH]> {
    let hk = Hkdf::<Sha256>::new(salt, ikm);
    let mut okm = [0u8; KEY_LENGTH];
    hk.expand(info, &mut okm)
        .map_err(|e| Error::Crypto(format!("HKDF expand failed: {}", e)))?;
    Ok(okm)
}

/// Key produced by the password KDF.
///
/// This is the value the repository caches while a vault is unlocked, so that
/// saves never require the master password again.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterKey {
    key: [u8; KEY_LENGTH],
}

impl MasterKey {
    pub fn from_bytes(key: [u8; KEY_LENGTH]) -> Self {
        Self { key }
    }

    /// Get the key bytes.
    ///
    /// # Security
    /// The returned slice should be used immediately and not stored.
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }

    /// Derive the AES key for one save, bound to that save's master seed.
    pub fn derive_cipher_key(&self, master_seed: &MasterSeed) -> Result<CipherKey> {
        Ok(CipherKey {
            key: hkdf_expand(&self.key, Some(master_seed.as_bytes()), CIPHER_KEY_INFO)?,
        })
    }

    /// Wrap (or unwrap, the operation is an involution) an HMAC key for storage.
    ///
    /// Unwrapping with a key derived from the wrong password yields an
    /// unrelated HMAC key, which then fails MAC verification.
    pub fn wrap_hmac_key(&self, hmac_key: &HmacKey, salt: &Salt) -> Result<HmacKey> {
        let mut stream = hkdf_expand(&self.key, Some(salt.as_bytes()), HMAC_WRAP_INFO)?;
        let mut wrapped = [0u8; HMAC_KEY_LENGTH];
        for (out, (k, s)) in wrapped
            .iter_mut()
            .zip(hmac_key.as_bytes().iter().zip(stream.iter()))
        {
            *out = k ^ s;
        }
        stream.zeroize();
        Ok(HmacKey::from_bytes(wrapped))
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MasterKey([REDACTED])")
    }
}

/// AES-256 key for a single vault body.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct CipherKey {
    key: [u8; KEY_LENGTH],
}

impl CipherKey {
    pub fn from_bytes(key: [u8; KEY_LENGTH]) -> Self {
        Self { key }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }
}

impl fmt::Debug for CipherKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CipherKey([REDACTED])")
    }
}

/// HMAC-SHA256 key, independent of the KDF output.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct HmacKey {
    key: [u8; HMAC_KEY_LENGTH],
}

impl HmacKey {
    pub fn from_bytes(key: [u8; HMAC_KEY_LENGTH]) -> Self {
        Self { key }
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let key = bytes
            .try_into()
            .map_err(|_| Error::InvalidParameterLength {
                param: "hmac key",
                expected: HMAC_KEY_LENGTH,
                actual: bytes.len(),
            })?;
        Ok(Self { key })
    }

    pub fn generate() -> Self {
        Self {
            key: random_bytes(),
        }
    }

    pub fn as_bytes(&self) -> &[u8; HMAC_KEY_LENGTH] {
        &self.key
    }
}

impl fmt::Debug for HmacKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HmacKey([REDACTED])")
    }
}

/// Salt for key derivation.
#[derive(Debug, Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Salt([u8; SALT_LENGTH]);

impl Salt {
    pub fn generate() -> Self {
        Self(random_bytes())
    }

    pub fn from_bytes(bytes: [u8; SALT_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let salt = bytes
            .try_into()
            .map_err(|_| Error::InvalidParameterLength {
                param: "salt",
                expected: SALT_LENGTH,
                actual: bytes.len(),
            })?;
        Ok(Self(salt))
    }

    pub fn as_bytes(&self) -> &[u8; SALT_LENGTH] {
        &self.0
    }
}

/// CBC initialization vector.
#[derive(Debug, Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Iv([u8; IV_LENGTH]);

impl Iv {
    pub fn generate() -> Self {
        Self(random_bytes())
    }

    pub fn from_bytes(bytes: [u8; IV_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; IV_LENGTH] {
        &self.0
    }
}

/// Per-save random seed mixed into the cipher key.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterSeed([u8; MASTER_SEED_LENGTH]);

impl MasterSeed {
    pub fn generate() -> Self {
        Self(random_bytes())
    }

    pub fn from_bytes(bytes: [u8; MASTER_SEED_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; MASTER_SEED_LENGTH] {
        &self.0
    }
}

impl fmt::Debug for MasterSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MasterSeed([REDACTED])")
    }
}

/// Random parameters of one vault.
///
/// `salt` and `hmac_key` live as long as the master password does. The seed
/// and IV are replaced on every save through [`CryptoParams::refreshed`].
#[derive(Debug, Clone, Zeroize, ZeroizeOnDrop)]
pub struct CryptoParams {
    pub master_seed: MasterSeed,
    pub iv: Iv,
    pub salt: Salt,
    pub hmac_key: HmacKey,
}

impl CryptoParams {
    /// Fresh parameters for a brand-new vault or a new master password.
    pub fn generate() -> Self {
        Self {
            master_seed: MasterSeed::generate(),
            iv: Iv::generate(),
            salt: Salt::generate(),
            hmac_key: HmacKey::generate(),
        }
    }

    /// Same salt and HMAC key, new seed and IV.
    pub fn refreshed(&self) -> Self {
        Self {
            master_seed: MasterSeed::generate(),
            iv: Iv::generate(),
            salt: self.salt.clone(),
            hmac_key: self.hmac_key.clone(),
        }
    }
}
