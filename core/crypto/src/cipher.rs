//! AES-256 in CBC mode with PKCS#7 padding.
//!
//! CBC provides confidentiality only. Integrity comes from the HMAC in
//! [`crate::mac`], which callers verify before decrypting.

use aes::Aes256;
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};

use crate::keys::{random_bytes, IV_LENGTH, KEY_LENGTH, MASTER_SEED_LENGTH};
use pwvault_common::{Error, Result};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// AES block size in bytes.
pub const BLOCK_SIZE: usize = 16;

fn check_key_iv(key: &[u8], iv: &[u8]) -> Result<()> {
    Error::check_length("key", KEY_LENGTH, key.len())?;
    Error::check_length("iv", IV_LENGTH, iv.len())
}

/// Encrypt `plaintext` with AES-256-CBC.
///
/// The output is always a non-zero multiple of [`BLOCK_SIZE`]; an empty
/// plaintext becomes one full padding block.
///
/// # Errors
/// - `InvalidParameterLength` if `key` is not 32 bytes or `iv` is not 16 bytes
pub fn encrypt(plaintext: &[u8], key: &[u8], iv: &[u8]) -> Result<Vec<u8>> {
    check_key_iv(key, iv)?;

    let cipher = Aes256CbcEnc::new_from_slices(key, iv)
        .map_err(|e| Error::Crypto(format!("Cipher init failed: {}", e)))?;

    Ok(cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext))
}

/// Decrypt AES-256-CBC ciphertext and strip PKCS#7 padding.
///
/// A wrong key usually surfaces here as a padding error, but not always:
/// roughly one in 256 wrong keys produces valid padding over garbage.
///
/// # Errors
/// - `InvalidParameterLength` if `key` is not 32 bytes or `iv` is not 16 bytes
/// - `Crypto` if the ciphertext is not block aligned or the padding is invalid
pub fn decrypt(ciphertext: &[u8], key: &[u8], iv: &[u8]) -> Result<Vec<u8>> {
    check_key_iv(key, iv)?;

    if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(Error::Crypto(format!(
            "Ciphertext length {} is not a multiple of the block size",
            ciphertext.len()
        )));
    }

    let cipher = Aes256CbcDec::new_from_slices(key, iv)
        .map_err(|e| Error::Crypto(format!("Cipher init failed: {}", e)))?;

    cipher
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| Error::Crypto("Invalid padding".to_string()))
}

/// Generate a random 16-byte IV.
pub fn generate_iv() -> [u8; IV_LENGTH] {
    random_bytes()
}

/// Generate a random 32-byte master seed.
pub fn generate_master_seed() -> [u8; MASTER_SEED_LENGTH] {
    random_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: [u8; KEY_LENGTH] = [42u8; KEY_LENGTH];
    const IV: [u8; IV_LENGTH] = [7u8; IV_LENGTH];

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let plaintext = b"<Vault><Entry>secret</Entry></Vault>";

        let ciphertext = encrypt(plaintext, &KEY, &IV).unwrap();
        let decrypted = decrypt(&ciphertext, &KEY, &IV).unwrap();

        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_ciphertext_is_padded_to_blocks() {
        // 16 bytes of input gains a whole block of padding.
        let ciphertext = encrypt(&[0u8; 16], &KEY, &IV).unwrap();
        assert_eq!(ciphertext.len(), 32);

        let ciphertext = encrypt(b"", &KEY, &IV).unwrap();
        assert_eq!(ciphertext.len(), BLOCK_SIZE);
        assert_eq!(decrypt(&ciphertext, &KEY, &IV).unwrap(), b"");
    }

    #[test]
    fn test_iv_changes_ciphertext() {
        let plaintext = b"Same plaintext";
        let ct1 = encrypt(plaintext, &KEY, &[1u8; IV_LENGTH]).unwrap();
        let ct2 = encrypt(plaintext, &KEY, &[2u8; IV_LENGTH]).unwrap();
        assert_ne!(ct1, ct2);
    }

    #[test]
    fn test_wrong_key_never_returns_plaintext() {
        let plaintext = b"a fairly long plaintext spanning several AES blocks of data";
        let ciphertext = encrypt(plaintext, &KEY, &IV).unwrap();

        for k in 0u8..8 {
            let wrong_key = [k; KEY_LENGTH];
            match decrypt(&ciphertext, &wrong_key, &IV) {
                Ok(garbage) => assert_ne!(garbage, plaintext),
                Err(e) => assert!(matches!(e, Error::Crypto(_))),
            }
        }
    }

    #[test]
    fn test_invalid_key_length() {
        let err = encrypt(b"data", &[0u8; 16], &IV).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidParameterLength { param: "key", .. }
        ));
    }

    #[test]
    fn test_invalid_iv_length() {
        let err = decrypt(&[0u8; 16], &KEY, &[0u8; 12]).unwrap_err();
        assert!(matches!(err, Error::InvalidParameterLength { param: "iv", .. }));
    }

    #[test]
    fn test_unaligned_ciphertext_fails() {
        assert!(decrypt(&[0u8; 17], &KEY, &IV).is_err());
        assert!(decrypt(&[], &KEY, &IV).is_err());
    }

    #[test]
    fn test_large_plaintext() {
        let plaintext = vec![0xABu8; 1_000_000];

        let ciphertext = encrypt(&plaintext, &KEY, &IV).unwrap();
        let decrypted = decrypt(&ciphertext, &KEY, &IV).unwrap();

        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_generated_values_have_fixed_sizes() {
        assert_eq!(generate_iv().len(), IV_LENGTH);
        assert_eq!(generate_master_seed().len(), MASTER_SEED_LENGTH);
        assert_ne!(generate_iv(), generate_iv());
    }
}
