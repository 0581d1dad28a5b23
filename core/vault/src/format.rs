//! Vault file layout.
//!
//! ```text
//! "PWVT" | version (1) | master_seed (32) | iv (16) | salt (32) | wrapped hmac_key (32)
//!   || AES-256-CBC(GZIP(xml)) || HMAC-SHA256(header || ciphertext) (32)
//! ```
//!
//! The HMAC key is stored XOR-wrapped under a stream derived from the master
//! key, so a wrong password unwraps a wrong HMAC key and the tag check fails
//! before any decryption is attempted.

use tracing::debug;
use zeroize::Zeroizing;

use crate::database::VaultDatabase;
use crate::xml;
use pwvault_common::{Error, Result};
use pwvault_crypto::cipher::BLOCK_SIZE;
use pwvault_crypto::keys::{HMAC_KEY_LENGTH, IV_LENGTH, MASTER_SEED_LENGTH, SALT_LENGTH};
use pwvault_crypto::{CryptoParams, HmacKey, Iv, MasterKey, MasterSeed, Salt, VaultCrypto, TAG_LENGTH};

/// File signature.
pub const MAGIC: &[u8; 4] = b"PWVT";

/// Current file format version.
pub const FORMAT_VERSION: u8 = 1;

/// Bytes before the ciphertext.
pub const HEADER_LENGTH: usize =
    MAGIC.len() + 1 + MASTER_SEED_LENGTH + IV_LENGTH + SALT_LENGTH + HMAC_KEY_LENGTH;

const MIN_FILE_LENGTH: usize = HEADER_LENGTH + BLOCK_SIZE + TAG_LENGTH;

/// Key material held while a vault is unlocked.
///
/// Both fields zeroize on drop.
#[derive(Clone)]
pub struct VaultKeys {
    pub(crate) master_key: MasterKey,
    pub(crate) params: CryptoParams,
}

impl VaultKeys {
    /// Same key, new master seed and IV for the next save.
    pub(crate) fn refreshed(&self) -> Self {
        Self {
            master_key: self.master_key.clone(),
            params: self.params.refreshed(),
        }
    }
}

/// Unauthenticated view of a vault file.
struct RawVaultFile<'a> {
    header: &'a [u8],
    master_seed: MasterSeed,
    iv: Iv,
    salt: Salt,
    wrapped_hmac_key: HmacKey,
    ciphertext: &'a [u8],
    tag: &'a [u8],
}

fn take<const N: usize>(bytes: &[u8], offset: &mut usize) -> Result<[u8; N]> {
    let field = bytes
        .get(*offset..*offset + N)
        .and_then(|slice| <[u8; N]>::try_from(slice).ok())
        .ok_or_else(|| Error::CorruptFile("Truncated header".to_string()))?;
    *offset += N;
    Ok(field)
}

fn parse(bytes: &[u8]) -> Result<RawVaultFile<'_>> {
    if bytes.is_empty() {
        return Err(Error::EmptyFile);
    }
    if bytes.len() < MIN_FILE_LENGTH {
        return Err(Error::CorruptFile(format!(
            "File is {} bytes, shorter than the minimum {}",
            bytes.len(),
            MIN_FILE_LENGTH
        )));
    }
    if &bytes[..MAGIC.len()] != MAGIC {
        return Err(Error::CorruptFile("Not a vault file".to_string()));
    }
    let version = bytes[MAGIC.len()];
    if version != FORMAT_VERSION {
        return Err(Error::CorruptFile(format!(
            "Unsupported format version {}",
            version
        )));
    }

    let mut offset = MAGIC.len() + 1;
    let master_seed = MasterSeed::from_bytes(take(bytes, &mut offset)?);
    let iv = Iv::from_bytes(take(bytes, &mut offset)?);
    let salt = Salt::from_bytes(take(bytes, &mut offset)?);
    let wrapped_hmac_key = HmacKey::from_bytes(take(bytes, &mut offset)?);

    let tag_start = bytes.len() - TAG_LENGTH;
    Ok(RawVaultFile {
        header: &bytes[..HEADER_LENGTH],
        master_seed,
        iv,
        salt,
        wrapped_hmac_key,
        ciphertext: &bytes[HEADER_LENGTH..tag_start],
        tag: &bytes[tag_start..],
    })
}

/// Encrypt and authenticate a database with already-derived keys.
pub fn seal(db: &VaultDatabase, keys: &VaultKeys, crypto: &VaultCrypto) -> Result<Vec<u8>> {
    let params = &keys.params;
    let body = xml::to_xml(db)?;

    let cipher_key = keys.master_key.derive_cipher_key(&params.master_seed)?;
    let ciphertext = crypto.encrypt_payload(&body, cipher_key.as_bytes(), params.iv.as_bytes())?;
    let wrapped = keys.master_key.wrap_hmac_key(&params.hmac_key, &params.salt)?;

    let mut out = Vec::with_capacity(HEADER_LENGTH + ciphertext.len() + TAG_LENGTH);
    out.extend_from_slice(MAGIC);
    out.push(FORMAT_VERSION);
    out.extend_from_slice(params.master_seed.as_bytes());
    out.extend_from_slice(params.iv.as_bytes());
    out.extend_from_slice(params.salt.as_bytes());
    out.extend_from_slice(wrapped.as_bytes());
    out.extend_from_slice(&ciphertext);

    let tag = crypto.compute_hmac(&out, params.hmac_key.as_bytes())?;
    out.extend_from_slice(&tag);

    debug!(
        entries = db.entries().len(),
        size = out.len(),
        "Sealed vault"
    );
    Ok(out)
}

/// Derive fresh keys for `password` and seal `db` under them.
///
/// Used for new vaults and for master password changes; the salt and HMAC
/// key are always new.
pub fn seal_with_password(
    db: &VaultDatabase,
    password: &str,
    crypto: &VaultCrypto,
) -> Result<(Vec<u8>, VaultKeys)> {
    let params = crypto.generate_database_params();
    let master_key = crypto.derive_encryption_key(password, params.salt.as_bytes())?;
    let keys = VaultKeys { master_key, params };
    let bytes = seal(db, &keys, crypto)?;
    Ok((bytes, keys))
}

/// Authenticate and decrypt a vault file.
///
/// # Errors
/// - `EmptyFile` for zero-length input
/// - `CorruptFile` for a malformed header, or a body that fails to decrypt
///   or parse after the tag matched
/// - `WrongPassword` if the tag does not match
pub fn open(bytes: &[u8], password: &str, crypto: &VaultCrypto) -> Result<(VaultDatabase, VaultKeys)> {
    let file = parse(bytes)?;

    let master_key = crypto.derive_encryption_key(password, file.salt.as_bytes())?;
    let hmac_key = master_key.wrap_hmac_key(&file.wrapped_hmac_key, &file.salt)?;

    let authenticated = Zeroizing::new([file.header, file.ciphertext].concat());
    if !crypto.verify_hmac(&authenticated, hmac_key.as_bytes(), file.tag)? {
        return Err(Error::WrongPassword);
    }

    let cipher_key = master_key.derive_cipher_key(&file.master_seed)?;
    let body = crypto
        .decrypt_payload(file.ciphertext, cipher_key.as_bytes(), file.iv.as_bytes())
        .map_err(|e| Error::CorruptFile(e.to_string()))?;
    let db = xml::from_xml(body.as_bytes()).map_err(|e| Error::CorruptFile(e.to_string()))?;

    let keys = VaultKeys {
        master_key,
        params: CryptoParams {
            master_seed: file.master_seed,
            iv: file.iv,
            salt: file.salt,
            hmac_key,
        },
    };
    Ok((db, keys))
}
