//! Storage provider trait definition.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pwvault_common::{Result, VaultPath};

/// Metadata for a stored blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Last path component.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// Last modification time.
    pub modified: DateTime<Utc>,
}

/// Storage provider trait for different backends.
///
/// Implementations must be safe to share between tasks. The repository
/// serializes its own writes, so providers need no cross-call ordering.
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Get the provider name (e.g., "local", "memory").
    fn name(&self) -> &str;

    /// Replace the blob at `path` with `data`.
    ///
    /// # Postconditions
    /// - On success, a later `download` returns exactly `data`
    /// - On failure, the previous content (if any) is unchanged
    ///
    /// # Errors
    /// - `InvalidInput` if `path` is the root
    /// - `Io` / `Storage` for backend failures
    async fn upload(&self, path: &VaultPath, data: Vec<u8>) -> Result<Metadata>;

    /// Read the complete blob at `path`.
    ///
    /// # Errors
    /// - `NotFound` if nothing is stored at `path`
    async fn download(&self, path: &VaultPath) -> Result<Vec<u8>>;

    /// Check whether a blob exists at `path`.
    async fn exists(&self, path: &VaultPath) -> Result<bool>;

    /// Remove the blob at `path`.
    ///
    /// # Errors
    /// - `NotFound` if nothing is stored at `path`
    async fn delete(&self, path: &VaultPath) -> Result<()>;

    /// Get metadata for the blob at `path`.
    ///
    /// # Errors
    /// - `NotFound` if nothing is stored at `path`
    async fn metadata(&self, path: &VaultPath) -> Result<Metadata>;
}
