//! Vault engine for PwVault.
//!
//! This crate provides:
//! - The immutable password database model (entries, groups, metadata)
//! - The XML document the database is serialized to
//! - The binary vault file format wrapping that document
//! - [`VaultRepository`], the session that opens, mutates and saves a vault
//! - Read-only queries and password strength analysis
//!
//! # Architecture
//! The repository sits between the user interface and a storage provider.
//! Every mutation produces a new [`VaultDatabase`] that is encrypted and
//! stored before it becomes visible to readers.

pub mod analyzer;
pub mod clock;
pub mod config;
pub mod database;
pub mod entry;
pub mod format;
pub mod group;
pub mod lockout;
pub mod query;
pub mod repository;
pub mod xml;

pub use analyzer::{EntropyAnalyzer, PasswordAnalysis, PasswordAnalyzer, PasswordStrength};
pub use clock::{Clock, SystemClock};
pub use config::VaultConfig;
pub use database::{DeletedObject, VaultDatabase, VaultMetadata};
pub use entry::{CustomField, EntryTimes, PasswordEntry, PasswordHistoryEntry};
pub use format::VaultKeys;
pub use group::Group;
pub use lockout::LockoutPolicy;
pub use query::CategoryCounts;
pub use repository::{VaultRepository, VaultState};
