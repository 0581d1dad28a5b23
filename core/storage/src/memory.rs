//! In-memory storage provider for testing.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::provider::{Metadata, StorageProvider};
use pwvault_common::{Error, Result, VaultPath};

#[derive(Debug, Clone)]
struct Blob {
    data: Vec<u8>,
    metadata: Metadata,
}

/// In-memory storage provider.
///
/// Useful for testing and development. All data is stored in memory
/// and lost on drop. Clones share the same storage.
#[derive(Clone, Default)]
pub struct MemoryProvider {
    storage: Arc<RwLock<HashMap<String, Blob>>>,
}

impl MemoryProvider {
    /// Create a new empty memory provider.
    pub fn new() -> Self {
        Self::default()
    }

    fn path_to_key(path: &VaultPath) -> String {
        path.to_string_path()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, Blob>>> {
        self.storage
            .read()
            .map_err(|_| Error::Storage("Memory storage lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, Blob>>> {
        self.storage
            .write()
            .map_err(|_| Error::Storage("Memory storage lock poisoned".to_string()))
    }

    /// Overwrite stored bytes without touching metadata. Test helper for
    /// simulating on-disk corruption.
    pub fn corrupt(&self, path: &VaultPath, edit: impl FnOnce(&mut Vec<u8>)) -> Result<()> {
        let mut storage = self.write()?;
        let blob = storage
            .get_mut(&Self::path_to_key(path))
            .ok_or_else(|| Error::NotFound(format!("File not found: {}", path)))?;
        edit(&mut blob.data);
        Ok(())
    }
}

#[async_trait]
impl StorageProvider for MemoryProvider {
    fn name(&self) -> &str {
        "memory"
    }

    async fn upload(&self, path: &VaultPath, data: Vec<u8>) -> Result<Metadata> {
        let name = path
            .name()
            .ok_or_else(|| Error::InvalidInput("Cannot upload to root".to_string()))?
            .to_string();

        let metadata = Metadata {
            name,
            size: data.len() as u64,
            modified: Utc::now(),
        };

        self.write()?.insert(
            Self::path_to_key(path),
            Blob {
                data,
                metadata: metadata.clone(),
            },
        );

        Ok(metadata)
    }

    async fn download(&self, path: &VaultPath) -> Result<Vec<u8>> {
        self.read()?
            .get(&Self::path_to_key(path))
            .map(|blob| blob.data.clone())
            .ok_or_else(|| Error::NotFound(format!("File not found: {}", path)))
    }

    async fn exists(&self, path: &VaultPath) -> Result<bool> {
        Ok(self.read()?.contains_key(&Self::path_to_key(path)))
    }

    async fn delete(&self, path: &VaultPath) -> Result<()> {
        self.write()?
            .remove(&Self::path_to_key(path))
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(format!("File not found: {}", path)))
    }

    async fn metadata(&self, path: &VaultPath) -> Result<Metadata> {
        self.read()?
            .get(&Self::path_to_key(path))
            .map(|blob| blob.metadata.clone())
            .ok_or_else(|| Error::NotFound(format!("File not found: {}", path)))
    }
}
