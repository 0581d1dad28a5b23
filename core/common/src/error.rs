//! Common error types for PwVault.

use thiserror::Error;

/// Top-level error type for PwVault operations.
///
/// Cryptographic primitive failures are normalized into these variants before
/// they leave the crypto layer, so callers never see raw cipher state.
#[derive(Debug, Error)]
pub enum Error {
    /// A key, IV or salt had the wrong size. This is a programming error.
    #[error("Invalid {param} length: expected {expected} bytes, got {actual}")]
    InvalidParameterLength {
        param: &'static str,
        expected: usize,
        actual: usize,
    },

    /// MAC verification failed while opening a vault.
    #[error("Wrong master password")]
    WrongPassword,

    /// The MAC passed but the body could not be interpreted, or the header is unreadable.
    #[error("Vault file is corrupt: {0}")]
    CorruptFile(String),

    /// The vault file exists but holds no bytes.
    #[error("Vault file is empty")]
    EmptyFile,

    /// Open attempts are rejected until the cooldown has elapsed.
    #[error("Too many failed attempts ({attempts}); try again in {retry_after_secs}s")]
    TooManyFailedAttempts { attempts: u32, retry_after_secs: i64 },

    /// Decryption of the payload failed at some stage.
    #[error("Vault decryption failed")]
    DecryptionFailed,

    /// Compressed input did not conform to the stream format.
    #[error("Malformed compressed data")]
    MalformedCompressedData,

    /// Cryptographic operation failed.
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// Storage operation failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Operation not permitted.
    #[error("Not permitted: {0}")]
    NotPermitted(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Resource already exists.
    #[error("Already exists: {0}")]
    AlreadyExists(String),
}

impl Error {
    /// Errors the user can fix without a retry loop (re-enter password, restore a backup).
    pub fn is_user_recoverable(&self) -> bool {
        matches!(
            self,
            Error::WrongPassword
                | Error::CorruptFile(_)
                | Error::EmptyFile
                | Error::TooManyFailedAttempts { .. }
        )
    }

    /// Errors caused by the storage layer that may succeed when retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Storage(_) | Error::Io(_))
    }

    /// Shorthand for a length check on fixed-size crypto parameters.
    pub fn check_length(param: &'static str, expected: usize, actual: usize) -> Result<()> {
        if expected == actual {
            Ok(())
        } else {
            Err(Error::InvalidParameterLength {
                param,
                expected,
                actual,
            })
        }
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_length() {
        assert!(Error::check_length("salt", 32, 32).is_ok());

        let err = Error::check_length("iv", 16, 8).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidParameterLength {
                param: "iv",
                expected: 16,
                actual: 8
            }
        ));
        assert_eq!(err.to_string(), "Invalid iv length: expected 16 bytes, got 8");
    }

    #[test]
    fn test_classification() {
        assert!(Error::WrongPassword.is_user_recoverable());
        assert!(Error::CorruptFile("bad".into()).is_user_recoverable());
        assert!(!Error::WrongPassword.is_retryable());
        assert!(Error::Storage("offline".into()).is_retryable());
        assert!(!Error::DecryptionFailed.is_user_recoverable());
    }
}
