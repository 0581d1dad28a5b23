//! Engine configuration.
//!
//! Stored as JSON. Every field has a default, so a partial file only
//! overrides what it names.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::lockout::{DEFAULT_LOCKOUT_SECONDS, DEFAULT_MAX_ATTEMPTS, MAX_LOCKOUT_SECONDS};
use pwvault_common::{Error, Result};
use pwvault_crypto::KdfParams;

/// Generator tag written into new vaults.
pub const DEFAULT_GENERATOR: &str = concat!("pwvault ", env!("CARGO_PKG_VERSION"));

/// Default window for the expiring-soon category, in days.
pub const DEFAULT_EXPIRING_SOON_DAYS: i64 = 14;

/// Longest accepted expiring-soon window, in days.
pub const MAX_EXPIRING_SOON_DAYS: i64 = 3650;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Argon2id parameters. Changing them makes existing vaults unreadable.
    pub kdf_params: KdfParams,
    /// Wrong passwords tolerated before opens are refused.
    pub max_failed_attempts: u32,
    /// Base cooldown after the limit is hit. Doubles with each further failure.
    pub lockout_seconds: i64,
    /// Value of the generator field in new vaults.
    pub generator: String,
    /// Window used by the expiring-soon category.
    pub expiring_soon_days: i64,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            kdf_params: KdfParams::default(),
            max_failed_attempts: DEFAULT_MAX_ATTEMPTS,
            lockout_seconds: DEFAULT_LOCKOUT_SECONDS,
            generator: DEFAULT_GENERATOR.to_string(),
            expiring_soon_days: DEFAULT_EXPIRING_SOON_DAYS,
        }
    }
}

impl VaultConfig {
    /// Reject values the engine cannot work with.
    pub fn validate(&self) -> Result<()> {
        self.kdf_params.validate()?;
        if self.max_failed_attempts == 0 {
            return Err(Error::InvalidInput(
                "max_failed_attempts must be at least 1".to_string(),
            ));
        }
        if !(1..=MAX_LOCKOUT_SECONDS).contains(&self.lockout_seconds) {
            return Err(Error::InvalidInput(format!(
                "lockout_seconds must be between 1 and {}",
                MAX_LOCKOUT_SECONDS
            )));
        }
        if !(0..=MAX_EXPIRING_SOON_DAYS).contains(&self.expiring_soon_days) {
            return Err(Error::InvalidInput(format!(
                "expiring_soon_days must be between 0 and {}",
                MAX_EXPIRING_SOON_DAYS
            )));
        }
        Ok(())
    }

    /// Serialize configuration to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize and validate configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Write this configuration as JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = VaultConfig::default();
        assert_eq!(config.kdf_params, KdfParams::STANDARD);
        assert_eq!(config.max_failed_attempts, 5);
        assert!(config.generator.starts_with("pwvault"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = VaultConfig::from_json(r#"{ "max_failed_attempts": 3 }"#).unwrap();
        assert_eq!(config.max_failed_attempts, 3);
        assert_eq!(config.kdf_params, KdfParams::STANDARD);
        assert_eq!(config.expiring_soon_days, DEFAULT_EXPIRING_SOON_DAYS);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(VaultConfig::from_json(r#"{ "max_failed_attempts": 0 }"#).is_err());
        assert!(VaultConfig::from_json(
            r#"{ "kdf_params": { "memory_cost": 1024, "time_cost": 0, "parallelism": 1 } }"#
        )
        .is_err());
        assert!(matches!(
            VaultConfig::from_json("not json"),
            Err(Error::Serialization(_))
        ));
    }

    #[test]
    fn test_out_of_range_windows_rejected() {
        assert!(VaultConfig::from_json(r#"{ "expiring_soon_days": -1 }"#).is_err());
        assert!(VaultConfig::from_json(r#"{ "expiring_soon_days": 100000000 }"#).is_err());
        assert!(VaultConfig::from_json(r#"{ "expiring_soon_days": 3650 }"#).is_ok());
        assert!(VaultConfig::from_json(r#"{ "lockout_seconds": 0 }"#).is_err());
        assert!(VaultConfig::from_json(r#"{ "lockout_seconds": 9999999 }"#).is_err());
        assert_eq!(
            VaultConfig::default().lockout_seconds,
            DEFAULT_LOCKOUT_SECONDS
        );
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("pwvault.json");

        let config = VaultConfig {
            kdf_params: KdfParams::new(1024, 1, 1),
            max_failed_attempts: 7,
            lockout_seconds: 120,
            generator: "tests".to_string(),
            expiring_soon_days: 30,
        };
        config.save(&path).unwrap();

        assert_eq!(VaultConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_load_missing_file() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            VaultConfig::load(temp.path().join("absent.json")),
            Err(Error::Io(_))
        ));
    }
}
