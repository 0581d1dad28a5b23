//! Local filesystem storage provider.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use crate::provider::{Metadata, StorageProvider};
use pwvault_common::{Error, Result, VaultPath};

/// Local filesystem storage provider.
///
/// Vault paths are resolved below a root directory. Uploads go to a sibling
/// temporary file which is renamed over the target, so readers never see a
/// partially written vault.
pub struct LocalProvider {
    root: PathBuf,
}

impl LocalProvider {
    /// Create a new local provider with the given root directory.
    ///
    /// # Postconditions
    /// - Root directory is created if it doesn't exist
    ///
    /// # Errors
    /// - Permission denied
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        if !root.exists() {
            std::fs::create_dir_all(&root)?;
        }

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Convert a VaultPath to a filesystem path.
    fn to_fs_path(&self, path: &VaultPath) -> PathBuf {
        let mut fs_path = self.root.clone();
        for component in path.components() {
            fs_path.push(component);
        }
        fs_path
    }

    fn create_metadata(path: &VaultPath, fs_meta: &std::fs::Metadata) -> Metadata {
        let modified: DateTime<Utc> = fs_meta
            .modified()
            .map(|t| t.into())
            .unwrap_or_else(|_| Utc::now());

        Metadata {
            name: path.name().unwrap_or("/").to_string(),
            size: fs_meta.len(),
            modified,
        }
    }

    /// Owner-only permissions on unix, then move the temp file into place.
    async fn restrict_and_rename(temp_path: &Path, fs_path: &Path) -> std::io::Result<()> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(temp_path, std::fs::Permissions::from_mode(0o600)).await?;
        }
        fs::rename(temp_path, fs_path).await
    }

    async fn file_metadata(&self, path: &VaultPath) -> Result<std::fs::Metadata> {
        let fs_path = self.to_fs_path(path);
        match fs::metadata(&fs_path).await {
            Ok(meta) if meta.is_file() => Ok(meta),
            Ok(_) => Err(Error::InvalidInput(format!("Not a file: {}", path))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(format!("File not found: {}", path)))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl StorageProvider for LocalProvider {
    fn name(&self) -> &str {
        "local"
    }

    async fn upload(&self, path: &VaultPath, data: Vec<u8>) -> Result<Metadata> {
        let file_name = path
            .name()
            .ok_or_else(|| Error::InvalidInput("Cannot upload to root".to_string()))?;
        let fs_path = self.to_fs_path(path);

        if let Some(parent) = fs_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Atomic write: write to temp, then rename
        let temp_path = fs_path.with_file_name(format!(".{}.tmp", file_name));
        if let Err(e) = fs::write(&temp_path, &data).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        if let Err(e) = Self::restrict_and_rename(&temp_path, &fs_path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        debug!(path = %path, size = data.len(), "Wrote vault blob");

        let fs_meta = fs::metadata(&fs_path).await?;
        Ok(Self::create_metadata(path, &fs_meta))
    }

    async fn download(&self, path: &VaultPath) -> Result<Vec<u8>> {
        self.file_metadata(path).await?;
        Ok(fs::read(self.to_fs_path(path)).await?)
    }

    async fn exists(&self, path: &VaultPath) -> Result<bool> {
        Ok(fs::try_exists(self.to_fs_path(path)).await?)
    }

    async fn delete(&self, path: &VaultPath) -> Result<()> {
        self.file_metadata(path).await?;
        fs::remove_file(self.to_fs_path(path)).await?;
        Ok(())
    }

    async fn metadata(&self, path: &VaultPath) -> Result<Metadata> {
        let fs_meta = self.file_metadata(path).await?;
        Ok(Self::create_metadata(path, &fs_meta))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_local_upload_download() {
        let temp = TempDir::new().unwrap();
        let provider = LocalProvider::new(temp.path()).unwrap();
        let path = VaultPath::parse("/test.pwv").unwrap();
        let data = b"Hello, Local!".to_vec();

        provider.upload(&path, data.clone()).await.unwrap();
        let downloaded = provider.download(&path).await.unwrap();

        assert_eq!(downloaded, data);
        assert!(temp.path().join("test.pwv").is_file());
    }

    #[tokio::test]
    async fn test_local_upload_creates_parents() {
        let temp = TempDir::new().unwrap();
        let provider = LocalProvider::new(temp.path()).unwrap();
        let path = VaultPath::parse("/nested/dir/vault.pwv").unwrap();

        provider.upload(&path, vec![1, 2, 3]).await.unwrap();

        assert!(provider.exists(&path).await.unwrap());
        assert_eq!(provider.download(&path).await.unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_local_replace_leaves_no_temp_file() {
        let temp = TempDir::new().unwrap();
        let provider = LocalProvider::new(temp.path()).unwrap();
        let path = VaultPath::parse("/vault.pwv").unwrap();

        provider.upload(&path, vec![1; 100]).await.unwrap();
        let meta = provider.upload(&path, vec![2; 10]).await.unwrap();

        assert_eq!(meta.size, 10);
        assert_eq!(provider.download(&path).await.unwrap(), vec![2; 10]);

        let names: Vec<_> = std::fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["vault.pwv".to_string()]);
    }

    #[tokio::test]
    async fn test_local_failed_replace_removes_temp_file() {
        let temp = TempDir::new().unwrap();
        let provider = LocalProvider::new(temp.path()).unwrap();
        let path = VaultPath::parse("/vault.pwv").unwrap();

        // A non-empty directory at the target makes the final rename fail.
        std::fs::create_dir(temp.path().join("vault.pwv")).unwrap();
        std::fs::write(temp.path().join("vault.pwv").join("keep"), b"x").unwrap();

        assert!(provider.upload(&path, vec![1; 16]).await.is_err());
        assert!(!temp.path().join(".vault.pwv.tmp").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_local_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let provider = LocalProvider::new(temp.path()).unwrap();
        let path = VaultPath::parse("/vault.pwv").unwrap();

        provider.upload(&path, vec![0]).await.unwrap();

        let mode = std::fs::metadata(temp.path().join("vault.pwv"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn test_local_exists_and_delete() {
        let temp = TempDir::new().unwrap();
        let provider = LocalProvider::new(temp.path()).unwrap();
        let path = VaultPath::parse("/vault.pwv").unwrap();

        assert!(!provider.exists(&path).await.unwrap());
        provider.upload(&path, vec![1]).await.unwrap();
        assert!(provider.exists(&path).await.unwrap());

        provider.delete(&path).await.unwrap();
        assert!(!provider.exists(&path).await.unwrap());
    }

    #[tokio::test]
    async fn test_local_missing_file() {
        let temp = TempDir::new().unwrap();
        let provider = LocalProvider::new(temp.path()).unwrap();
        let path = VaultPath::parse("/missing.pwv").unwrap();

        assert!(matches!(
            provider.download(&path).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            provider.metadata(&path).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_local_metadata() {
        let temp = TempDir::new().unwrap();
        let provider = LocalProvider::new(temp.path()).unwrap();
        let path = VaultPath::parse("/vault.pwv").unwrap();

        provider.upload(&path, vec![7; 42]).await.unwrap();
        let meta = provider.metadata(&path).await.unwrap();

        assert_eq!(meta.name, "vault.pwv");
        assert_eq!(meta.size, 42);
    }

    #[tokio::test]
    async fn test_local_new_creates_root() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("a/b");
        let provider = LocalProvider::new(&root).unwrap();
        assert!(root.is_dir());
        assert_eq!(provider.root(), root.as_path());
    }
}
