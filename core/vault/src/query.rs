//! Read-only projections over a [`VaultDatabase`].

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

use crate::analyzer::PasswordAnalyzer;
use crate::database::VaultDatabase;
use crate::entry::PasswordEntry;

/// Entry counts for each sidebar category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategoryCounts {
    pub all: usize,
    pub favorites: usize,
    pub weak: usize,
    pub duplicates: usize,
    pub expiring_soon: usize,
    pub expired: usize,
    pub secure_notes: usize,
}

impl VaultDatabase {
    /// Entries whose title, user name, URL, notes or any tag contain `query`,
    /// ignoring case. A blank query returns every entry.
    pub fn search(&self, query: &str) -> Vec<&PasswordEntry> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return self.entries().iter().collect();
        }
        self.entries().iter().filter(|e| e.matches(&needle)).collect()
    }

    pub fn favorites(&self) -> Vec<&PasswordEntry> {
        self.entries().iter().filter(|e| e.is_favorite).collect()
    }

    /// Most recently accessed entries first.
    pub fn recently_used(&self, limit: usize) -> Vec<&PasswordEntry> {
        let mut entries: Vec<_> = self.entries().iter().collect();
        entries.sort_by(|a, b| b.times.last_access_time.cmp(&a.times.last_access_time));
        entries.truncate(limit);
        entries
    }

    /// Entries whose password the analyzer classes as very weak or weak.
    /// Entries without a password are skipped.
    pub fn weak_password_entries(&self, analyzer: &dyn PasswordAnalyzer) -> Vec<&PasswordEntry> {
        self.entries()
            .iter()
            .filter(|e| !e.password.is_empty() && analyzer.analyze(&e.password).strength.is_weak())
            .collect()
    }

    /// Every entry sharing its non-empty password with at least one other entry.
    pub fn duplicate_password_entries(&self) -> Vec<&PasswordEntry> {
        let mut by_password: HashMap<&str, usize> = HashMap::new();
        for entry in self.entries().iter().filter(|e| !e.password.is_empty()) {
            *by_password.entry(entry.password.as_str()).or_default() += 1;
        }

        self.entries()
            .iter()
            .filter(|e| by_password.get(e.password.as_str()).is_some_and(|&n| n > 1))
            .collect()
    }

    pub fn expiring_soon_entries(&self, days: i64, now: DateTime<Utc>) -> Vec<&PasswordEntry> {
        self.entries()
            .iter()
            .filter(|e| e.is_expiring_soon(days, now))
            .collect()
    }

    pub fn expired_entries(&self, now: DateTime<Utc>) -> Vec<&PasswordEntry> {
        self.entries().iter().filter(|e| e.is_expired(now)).collect()
    }

    pub fn secure_notes(&self) -> Vec<&PasswordEntry> {
        self.entries().iter().filter(|e| e.is_secure_note()).collect()
    }

    /// Entries filed directly under `group_uuid`. Entries without a group
    /// belong to the root.
    pub fn entries_for_group(&self, group_uuid: Uuid) -> Vec<&PasswordEntry> {
        let is_root = self.root_group().uuid() == group_uuid;
        self.entries()
            .iter()
            .filter(|e| match e.group_uuid {
                Some(uuid) => uuid == group_uuid,
                None => is_root,
            })
            .collect()
    }

    pub fn category_counts(
        &self,
        analyzer: &dyn PasswordAnalyzer,
        expiring_days: i64,
        now: DateTime<Utc>,
    ) -> CategoryCounts {
        CategoryCounts {
            all: self.entries().len(),
            favorites: self.favorites().len(),
            weak: self.weak_password_entries(analyzer).len(),
            duplicates: self.duplicate_password_entries().len(),
            expiring_soon: self.expiring_soon_entries(expiring_days, now).len(),
            expired: self.expired_entries(now).len(),
            secure_notes: self.secure_notes().len(),
        }
    }
}
