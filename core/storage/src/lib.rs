//! Storage provider abstraction for PwVault.
//!
//! The vault layer only ever reads and replaces one opaque blob per vault.
//! Providers decide where that blob lives.
//!
//! # Design Principles
//! - Provider isolation: No provider-specific logic in vault or crypto modules
//! - Async operations: All I/O operations are async
//! - Atomic replacement: A failed upload leaves the previous blob intact

pub mod local;
pub mod memory;
pub mod provider;

pub use local::LocalProvider;
pub use memory::MemoryProvider;
pub use provider::{Metadata, StorageProvider};
