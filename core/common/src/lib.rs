//! Common utilities and types shared across PwVault crates.
//!
//! This crate provides the error taxonomy every layer reports through, plus a
//! few small value types that several crates agree on.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{SensitiveBytes, VaultPath};
