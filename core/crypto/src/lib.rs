//! Cryptographic primitives for PwVault.
//!
//! This crate provides:
//! - Key derivation using Argon2id
//! - AES-256-CBC encryption with PKCS#7 padding
//! - HMAC-SHA256 integrity tags with constant-time verification
//! - Gzip compression of the plaintext body
//! - [`VaultCrypto`], the orchestrator the vault layer talks to
//!
//! # Security Guarantees
//! - All key material is automatically zeroized on drop
//! - No plaintext or key material is ever logged
//! - Constant-time comparison of authentication tags

pub mod cipher;
pub mod compress;
pub mod kdf;
pub mod keys;
pub mod mac;
pub mod vault_crypto;

pub use cipher::{generate_iv, generate_master_seed};
pub use kdf::{derive_key, generate_salt, Argon2Kdf, KdfParams, KeyDerivation};
pub use keys::{CipherKey, CryptoParams, HmacKey, Iv, MasterKey, MasterSeed, Salt};
pub use mac::{compute_hmac, constant_time_eq, generate_hmac_key, verify_hmac, TAG_LENGTH};
pub use vault_crypto::{clear_password, clear_sensitive_data, VaultCrypto};
