//! HMAC-SHA256 integrity tags.
//!
//! The tag is computed over ciphertext, so tampering and wrong-key
//! decryption are detected before any decrypted byte is interpreted.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::keys::{random_bytes, HMAC_KEY_LENGTH};
use pwvault_common::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// Length of an HMAC-SHA256 tag.
pub const TAG_LENGTH: usize = 32;

/// Compute HMAC-SHA256 of `data` under a 32-byte `key`.
pub fn compute_hmac(data: &[u8], key: &[u8]) -> Result<[u8; TAG_LENGTH]> {
    Error::check_length("hmac key", HMAC_KEY_LENGTH, key.len())?;

    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| Error::Crypto(format!("HMAC init failed: {}", e)))?;
    mac.update(data);

    let mut tag = [0u8; TAG_LENGTH];
    tag.copy_from_slice(&mac.finalize().into_bytes());
    Ok(tag)
}

/// Recompute the tag of `data` and compare it with `expected` in constant time.
pub fn verify_hmac(data: &[u8], key: &[u8], expected: &[u8]) -> Result<bool> {
    let actual = compute_hmac(data, key)?;
    Ok(constant_time_eq(&actual, expected))
}

/// Compare two byte strings without an early exit on the first difference.
///
/// A length mismatch returns `false` immediately; lengths are not secret.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Generate a random 32-byte HMAC key.
pub fn generate_hmac_key() -> [u8; HMAC_KEY_LENGTH] {
    random_bytes()
}
