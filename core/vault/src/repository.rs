//! The vault repository.
//!
//! Owns the one decrypted database and its key material, mediates every read
//! and write against storage and enforces the failed-attempt lockout.
//!
//! # Concurrency
//! Open, create, save, lock and every mutation run under a single async mutex
//! that also guards the cached keys, so "read current, compute next, persist,
//! publish" is one step. Queries read the last published snapshot and never
//! wait on that mutex. Key derivation and the crypto pipeline run on the
//! blocking thread pool.

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard};
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::analyzer::PasswordAnalyzer;
use crate::clock::{Clock, SystemClock};
use crate::config::VaultConfig;
use crate::database::VaultDatabase;
use crate::entry::PasswordEntry;
use crate::format::{self, VaultKeys};
use crate::group::Group;
use crate::lockout::LockoutPolicy;
use crate::query::CategoryCounts;
use pwvault_common::{Error, Result, VaultPath};
use pwvault_crypto::{constant_time_eq, KeyDerivation, VaultCrypto};
use pwvault_storage::StorageProvider;

/// Observable lifecycle state of the repository.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum VaultState {
    #[default]
    Locked,
    Unlocked,
    /// The last open or create failed for a reason other than a wrong password.
    Error(String),
}

impl VaultState {
    pub fn is_unlocked(&self) -> bool {
        matches!(self, VaultState::Unlocked)
    }
}

impl fmt::Display for VaultState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VaultState::Locked => f.write_str("locked"),
            VaultState::Unlocked => f.write_str("unlocked"),
            VaultState::Error(message) => write!(f, "error: {}", message),
        }
    }
}

/// State, database and locator always change together.
#[derive(Default)]
struct Snapshot {
    state: VaultState,
    database: Option<Arc<VaultDatabase>>,
    locator: Option<VaultPath>,
}

fn locked() -> Error {
    Error::NotPermitted("Vault is locked".to_string())
}

fn poisoned() -> Error {
    Error::Storage("Vault state lock poisoned".to_string())
}

/// Run CPU-bound work on the blocking pool.
async fn blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| Error::Crypto(format!("Worker task failed: {}", e)))?
}

pub struct VaultRepository {
    provider: Arc<dyn StorageProvider>,
    crypto: VaultCrypto,
    config: VaultConfig,
    clock: Arc<dyn Clock>,
    lockout: LockoutPolicy,
    /// Writer gate. Holds the keys of the unlocked vault.
    keys: Mutex<Option<VaultKeys>>,
    snapshot: RwLock<Snapshot>,
    state_tx: watch::Sender<VaultState>,
}

impl VaultRepository {
    /// Repository over `provider` using Argon2id with the configured parameters.
    pub fn new(provider: Arc<dyn StorageProvider>, config: VaultConfig) -> Self {
        let (state_tx, _) = watch::channel(VaultState::Locked);
        Self {
            provider,
            crypto: VaultCrypto::with_params(config.kdf_params),
            lockout: LockoutPolicy::new(config.max_failed_attempts, config.lockout_seconds),
            config,
            clock: Arc::new(SystemClock),
            keys: Mutex::new(None),
            snapshot: RwLock::new(Snapshot::default()),
            state_tx,
        }
    }

    /// Replace the key derivation function.
    pub fn with_kdf(mut self, kdf: Arc<dyn KeyDerivation>) -> Self {
        self.crypto = VaultCrypto::new(kdf);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    pub fn provider(&self) -> Arc<dyn StorageProvider> {
        self.provider.clone()
    }

    fn snapshot(&self) -> Result<RwLockReadGuard<'_, Snapshot>> {
        self.snapshot.read().map_err(|_| poisoned())
    }

    /// Swap state, database and locator in one step.
    ///
    /// The replaced snapshot is dropped after the write lock is released; its
    /// entries wipe themselves once no reader holds them.
    fn publish(
        &self,
        state: VaultState,
        database: Option<Arc<VaultDatabase>>,
        locator: Option<VaultPath>,
    ) -> Result<()> {
        let mut snapshot = self.snapshot.write().map_err(|_| poisoned())?;
        let previous = std::mem::replace(
            &mut *snapshot,
            Snapshot {
                state: state.clone(),
                database,
                locator,
            },
        );
        drop(snapshot);
        self.state_tx.send_replace(state);
        drop(previous);
        Ok(())
    }

    pub fn state(&self) -> VaultState {
        self.snapshot()
            .map(|s| s.state.clone())
            .unwrap_or_else(|e| VaultState::Error(e.to_string()))
    }

    /// Receiver that observes every state change.
    pub fn subscribe(&self) -> watch::Receiver<VaultState> {
        self.state_tx.subscribe()
    }

    pub fn is_unlocked(&self) -> bool {
        self.state().is_unlocked()
    }

    /// Storage location of the unlocked vault.
    pub fn locator(&self) -> Option<VaultPath> {
        self.snapshot().ok().and_then(|s| s.locator.clone())
    }

    /// Consecutive wrong passwords since the last successful open.
    pub fn failed_attempts(&self) -> u32 {
        self.lockout.failed_attempts()
    }

    /// Current database and its locator.
    fn current(&self) -> Result<(Arc<VaultDatabase>, VaultPath)> {
        let snapshot = self.snapshot()?;
        match (&snapshot.database, &snapshot.locator) {
            (Some(db), Some(path)) => Ok((db.clone(), path.clone())),
            _ => Err(locked()),
        }
    }

    /// Record a failed open. An unlocked session is left alone.
    fn fail_open(&self, keys: &Option<VaultKeys>, path: &VaultPath, e: &Error) -> Result<()> {
        error!(path = %path, error = %e, "Failed to open vault");
        if keys.is_none() {
            self.publish(VaultState::Error(e.to_string()), None, None)?;
        }
        Ok(())
    }

    /// Create a new vault at `path` and unlock it.
    ///
    /// # Errors
    /// - `InvalidInput` if the password is empty
    /// - `AlreadyExists` if something is stored at `path`
    /// - `Storage` / `Io` if the upload fails
    pub async fn create_vault(
        &self,
        path: &VaultPath,
        password: &str,
        name: &str,
        description: &str,
    ) -> Result<Arc<VaultDatabase>> {
        if password.is_empty() {
            return Err(Error::InvalidInput("Password cannot be empty".to_string()));
        }

        let mut keys = self.keys.lock().await;
        if self.provider.exists(path).await? {
            return Err(Error::AlreadyExists(format!("Vault {}", path)));
        }

        let db = Arc::new(VaultDatabase::new(
            name,
            description,
            self.config.generator.as_str(),
            self.clock.now(),
        ));

        let crypto = self.crypto.clone();
        let password = Zeroizing::new(password.to_string());
        let sealed = db.clone();
        let (bytes, new_keys) =
            blocking(move || format::seal_with_password(&sealed, &password, &crypto)).await?;

        if let Err(e) = self.provider.upload(path, bytes).await {
            self.fail_open(&keys, path, &e)?;
            return Err(e);
        }

        *keys = Some(new_keys);
        self.publish(VaultState::Unlocked, Some(db.clone()), Some(path.clone()))?;

        info!(path = %path, "Vault created");
        Ok(db)
    }

    /// Open and unlock the vault at `path`.
    ///
    /// # Errors
    /// - `TooManyFailedAttempts` while a lockout cooldown runs; no key is derived
    /// - `WrongPassword` if authentication fails; counts toward the lockout
    /// - `NotFound`, `EmptyFile`, `CorruptFile`, `Storage` / `Io` otherwise
    pub async fn open_vault(&self, path: &VaultPath, password: &str) -> Result<Arc<VaultDatabase>> {
        if password.is_empty() {
            return Err(Error::InvalidInput("Password cannot be empty".to_string()));
        }

        let mut keys = self.keys.lock().await;
        if let Err(e) = self.lockout.check(self.clock.now()) {
            warn!(
                attempts = self.lockout.failed_attempts(),
                "Open refused after too many failed attempts"
            );
            return Err(e);
        }

        let bytes = match self.provider.download(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                self.fail_open(&keys, path, &e)?;
                return Err(e);
            }
        };

        let crypto = self.crypto.clone();
        let password = Zeroizing::new(password.to_string());
        let opened = blocking(move || format::open(&bytes, &password, &crypto)).await;

        match opened {
            Ok((db, new_keys)) => {
                self.lockout.reset();
                *keys = Some(new_keys);
                let db = Arc::new(db);
                self.publish(VaultState::Unlocked, Some(db.clone()), Some(path.clone()))?;
                info!(path = %path, entries = db.entries().len(), "Vault opened");
                Ok(db)
            }
            Err(Error::WrongPassword) => {
                let attempts = self.lockout.record_failure(self.clock.now());
                warn!(
                    path = %path,
                    attempts,
                    max_attempts = self.lockout.max_attempts(),
                    "Wrong master password"
                );
                Err(Error::WrongPassword)
            }
            Err(e) => {
                self.fail_open(&keys, path, &e)?;
                Err(e)
            }
        }
    }

    /// Encrypt `db` with a fresh seed and IV and replace the stored file.
    /// The cached keys are only advanced once the upload succeeded.
    async fn persist(
        &self,
        keys: &mut Option<VaultKeys>,
        db: Arc<VaultDatabase>,
        path: &VaultPath,
    ) -> Result<()> {
        let next_keys = keys.as_ref().ok_or_else(locked)?.refreshed();
        let crypto = self.crypto.clone();
        let (bytes, next_keys) = blocking(move || {
            let bytes = format::seal(&db, &next_keys, &crypto)?;
            Ok((bytes, next_keys))
        })
        .await?;

        self.provider.upload(path, bytes).await?;
        *keys = Some(next_keys);
        Ok(())
    }

    /// Write the current database back to storage.
    pub async fn save_vault(&self) -> Result<()> {
        let mut keys = self.keys.lock().await;
        let (db, path) = self.current()?;
        self.persist(&mut keys, db, &path).await?;
        info!(path = %path, "Vault saved");
        Ok(())
    }

    /// Re-encrypt the vault under `new_password` with a new salt and HMAC key.
    ///
    /// The new file is fully built in memory before it replaces the old one.
    ///
    /// # Errors
    /// - `WrongPassword` if `current_password` does not match the unlocked vault
    /// - `InvalidInput` if the new password is empty
    pub async fn change_master_password(
        &self,
        current_password: &str,
        new_password: &str,
    ) -> Result<()> {
        if new_password.is_empty() {
            return Err(Error::InvalidInput("Password cannot be empty".to_string()));
        }

        let mut keys = self.keys.lock().await;
        let cached = keys.as_ref().ok_or_else(locked)?.clone();
        let (db, path) = self.current()?;

        let crypto = self.crypto.clone();
        let current_password = Zeroizing::new(current_password.to_string());
        let new_password = Zeroizing::new(new_password.to_string());
        let (bytes, new_keys) = blocking(move || {
            let candidate =
                crypto.derive_encryption_key(&current_password, cached.params.salt.as_bytes())?;
            if !constant_time_eq(candidate.as_bytes(), cached.master_key.as_bytes()) {
                return Err(Error::WrongPassword);
            }
            format::seal_with_password(&db, &new_password, &crypto)
        })
        .await?;

        self.provider.upload(&path, bytes).await?;
        *keys = Some(new_keys);

        info!(path = %path, "Master password changed");
        Ok(())
    }

    /// Drop the database and key material. Storage is untouched.
    pub async fn lock(&self) -> Result<()> {
        let mut keys = self.keys.lock().await;
        keys.take();
        self.publish(VaultState::Locked, None, None)?;
        info!("Vault locked");
        Ok(())
    }

    /// Apply a pure transform to the current database, persist and publish it.
    async fn mutate<F>(&self, operation: &'static str, transform: F) -> Result<Arc<VaultDatabase>>
    where
        F: FnOnce(&VaultDatabase, DateTime<Utc>) -> Result<VaultDatabase> + Send,
    {
        let mut keys = self.keys.lock().await;
        if keys.is_none() {
            return Err(locked());
        }
        let (current, path) = self.current()?;

        let next = Arc::new(transform(current.as_ref(), self.clock.now())?);
        self.persist(&mut keys, next.clone(), &path).await?;
        self.publish(VaultState::Unlocked, Some(next.clone()), Some(path))?;

        debug!(operation, entries = next.entries().len(), "Vault updated");
        Ok(next)
    }

    pub async fn add_entry(&self, entry: PasswordEntry) -> Result<Arc<VaultDatabase>> {
        self.mutate("add_entry", move |db, now| db.add_entry(entry, now))
            .await
    }

    /// Replace an entry. A changed password is rolled into the history.
    pub async fn update_entry(&self, entry: PasswordEntry) -> Result<Arc<VaultDatabase>> {
        self.mutate("update_entry", move |db, now| db.update_entry(entry, now))
            .await
    }

    pub async fn delete_entry(&self, uuid: Uuid) -> Result<Arc<VaultDatabase>> {
        self.mutate("delete_entry", move |db, now| db.delete_entry(uuid, now))
            .await
    }

    pub async fn toggle_favorite(&self, uuid: Uuid) -> Result<Arc<VaultDatabase>> {
        self.mutate("toggle_favorite", move |db, now| db.toggle_favorite(uuid, now))
            .await
    }

    pub async fn mark_accessed(&self, uuid: Uuid) -> Result<Arc<VaultDatabase>> {
        self.mutate("mark_accessed", move |db, now| db.mark_accessed(uuid, now))
            .await
    }

    pub async fn change_entry_password(
        &self,
        uuid: Uuid,
        new_password: &str,
    ) -> Result<Arc<VaultDatabase>> {
        let new_password = Zeroizing::new(new_password.to_string());
        self.mutate("change_entry_password", move |db, now| {
            db.change_entry_password(uuid, new_password.as_str(), now)
        })
        .await
    }

    /// Add a group under `parent_uuid`, or under the root when `None`.
    pub async fn add_group(&self, name: &str, parent_uuid: Option<Uuid>) -> Result<Group> {
        let group = Group {
            uuid: Uuid::new_v4(),
            name: name.to_string(),
            parent_uuid,
        };
        let uuid = group.uuid;
        let db = self
            .mutate("add_group", move |db, now| db.add_group(group, now))
            .await?;
        db.group(uuid)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Group {}", uuid)))
    }

    /// Latest published database.
    ///
    /// # Errors
    /// - `NotPermitted` while locked
    pub fn database(&self) -> Result<Arc<VaultDatabase>> {
        self.snapshot()?.database.clone().ok_or_else(locked)
    }

    fn project<F>(&self, select: F) -> Result<Vec<PasswordEntry>>
    where
        F: for<'a> FnOnce(&'a VaultDatabase) -> Vec<&'a PasswordEntry>,
    {
        let db = self.database()?;
        Ok(select(db.as_ref()).into_iter().cloned().collect())
    }

    pub fn entries(&self) -> Result<Vec<PasswordEntry>> {
        Ok(self.database()?.entries().to_vec())
    }

    pub fn entry(&self, uuid: Uuid) -> Result<PasswordEntry> {
        self.database()?
            .entry(uuid)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Entry {}", uuid)))
    }

    pub fn groups(&self) -> Result<Vec<Group>> {
        Ok(self.database()?.groups().to_vec())
    }

    pub fn search(&self, query: &str) -> Result<Vec<PasswordEntry>> {
        self.project(|db| db.search(query))
    }

    pub fn favorites(&self) -> Result<Vec<PasswordEntry>> {
        self.project(|db| db.favorites())
    }

    pub fn recently_used(&self, limit: usize) -> Result<Vec<PasswordEntry>> {
        self.project(|db| db.recently_used(limit))
    }

    pub fn weak_password_entries(
        &self,
        analyzer: &dyn PasswordAnalyzer,
    ) -> Result<Vec<PasswordEntry>> {
        self.project(|db| db.weak_password_entries(analyzer))
    }

    pub fn duplicate_password_entries(&self) -> Result<Vec<PasswordEntry>> {
        self.project(|db| db.duplicate_password_entries())
    }

    pub fn expiring_soon_entries(&self, days: i64) -> Result<Vec<PasswordEntry>> {
        let now = self.clock.now();
        self.project(|db| db.expiring_soon_entries(days, now))
    }

    pub fn secure_notes(&self) -> Result<Vec<PasswordEntry>> {
        self.project(|db| db.secure_notes())
    }

    pub fn entries_for_group(&self, group_uuid: Uuid) -> Result<Vec<PasswordEntry>> {
        self.project(|db| db.entries_for_group(group_uuid))
    }

    /// Counts per category, using the configured expiring-soon window.
    pub fn category_counts(&self, analyzer: &dyn PasswordAnalyzer) -> Result<CategoryCounts> {
        let db = self.database()?;
        Ok(db.category_counts(analyzer, self.config.expiring_soon_days, self.clock.now()))
    }
}
