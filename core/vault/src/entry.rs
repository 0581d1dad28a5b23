//! Credential entries.

use chrono::{DateTime, Duration, Utc};
use std::fmt;
use uuid::Uuid;

use pwvault_crypto::clear_password;

/// Timestamps and expiry settings of an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryTimes {
    pub creation_time: DateTime<Utc>,
    pub last_modification_time: DateTime<Utc>,
    pub last_access_time: DateTime<Utc>,
    pub expiry_time: Option<DateTime<Utc>>,
    pub expires: bool,
}

impl EntryTimes {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            creation_time: now,
            last_modification_time: now,
            last_access_time: now,
            expiry_time: None,
            expires: false,
        }
    }
}

/// A password the entry held before a change.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordHistoryEntry {
    pub password: String,
    pub modified_at: DateTime<Utc>,
}

impl Drop for PasswordHistoryEntry {
    fn drop(&mut self) {
        clear_password(&mut self.password);
    }
}

impl fmt::Debug for PasswordHistoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordHistoryEntry")
            .field("password", &"[REDACTED]")
            .field("modified_at", &self.modified_at)
            .finish()
    }
}

/// Free-form key/value pair attached to an entry.
///
/// `is_protected` only controls display masking; the value is stored the same way.
#[derive(Clone, PartialEq, Eq)]
pub struct CustomField {
    pub key: String,
    pub value: String,
    pub is_protected: bool,
}

impl CustomField {
    pub fn new(key: impl Into<String>, value: impl Into<String>, is_protected: bool) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            is_protected,
        }
    }

    /// Value as it should be shown to a user.
    pub fn display_value(&self) -> &str {
        if self.is_protected {
            "********"
        } else {
            &self.value
        }
    }
}

impl Drop for CustomField {
    fn drop(&mut self) {
        clear_password(&mut self.value);
    }
}

impl fmt::Debug for CustomField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomField")
            .field("key", &self.key)
            .field("value", &self.display_value())
            .field("is_protected", &self.is_protected)
            .finish()
    }
}

/// A stored credential.
///
/// The UUID is fixed at construction and the password history can only grow
/// through [`PasswordEntry::with_updated_password`] or the database update
/// path; both are read-only from outside the crate.
///
/// Secret strings are wiped when the entry is dropped, so the last owner of
/// any database snapshot scrubs it.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordEntry {
    pub(crate) uuid: Uuid,
    pub title: String,
    pub user_name: String,
    pub password: String,
    pub url: String,
    pub notes: String,
    pub tags: Vec<String>,
    pub custom_fields: Vec<CustomField>,
    pub group_uuid: Option<Uuid>,
    pub is_favorite: bool,
    pub(crate) history: Vec<PasswordHistoryEntry>,
    pub times: EntryTimes,
    pub auto_type_enabled: bool,
}

impl PasswordEntry {
    /// New empty entry with a random UUID.
    pub fn new(title: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            title: title.into(),
            user_name: String::new(),
            password: String::new(),
            url: String::new(),
            notes: String::new(),
            tags: Vec::new(),
            custom_fields: Vec::new(),
            group_uuid: None,
            is_favorite: false,
            history: Vec::new(),
            times: EntryTimes::new(now),
            auto_type_enabled: true,
        }
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Previous passwords, oldest first.
    pub fn history(&self) -> &[PasswordHistoryEntry] {
        &self.history
    }

    /// Copy of this entry holding `new_password`, with the current password
    /// appended to the history.
    pub fn with_updated_password(&self, new_password: impl Into<String>, now: DateTime<Utc>) -> Self {
        let mut next = self.clone();
        let previous = std::mem::replace(&mut next.password, new_password.into());
        next.history.push(PasswordHistoryEntry {
            password: previous,
            modified_at: self.times.last_modification_time,
        });
        next.times.last_modification_time = now;
        next
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.times.expiry_time {
            Some(expiry) => self.times.expires && now > expiry,
            None => false,
        }
    }

    /// Expires within `days` from `now` but has not expired yet.
    ///
    /// A window reaching past the representable calendar has no upper bound.
    pub fn is_expiring_soon(&self, days: i64, now: DateTime<Utc>) -> bool {
        let Some(expiry) = self.times.expiry_time else {
            return false;
        };
        if !self.times.expires || self.is_expired(now) {
            return false;
        }
        Duration::try_days(days)
            .and_then(|window| now.checked_add_signed(window))
            .map_or(true, |horizon| expiry < horizon)
    }

    /// An entry used only to hold text.
    pub fn is_secure_note(&self) -> bool {
        self.password.is_empty()
            && self.user_name.is_empty()
            && self.url.is_empty()
            && !self.notes.trim().is_empty()
    }

    /// Case-insensitive substring match over the searchable fields.
    ///
    /// `needle` must already be lowercase.
    pub(crate) fn matches(&self, needle: &str) -> bool {
        [&self.title, &self.user_name, &self.url, &self.notes]
            .into_iter()
            .chain(self.tags.iter())
            .any(|field| field.to_lowercase().contains(needle))
    }

    /// Overwrite secret strings in place.
    pub(crate) fn scrub(&mut self) {
        clear_password(&mut self.password);
        clear_password(&mut self.user_name);
        clear_password(&mut self.notes);
        for item in &mut self.history {
            clear_password(&mut item.password);
        }
        for field in &mut self.custom_fields {
            clear_password(&mut field.value);
        }
    }
}

impl Drop for PasswordEntry {
    fn drop(&mut self) {
        self.scrub();
    }
}

impl fmt::Debug for PasswordEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordEntry")
            .field("uuid", &self.uuid)
            .field("title", &self.title)
            .field("user_name", &self.user_name)
            .field("password", &"[REDACTED]")
            .field("url", &self.url)
            .field("tags", &self.tags)
            .field("group_uuid", &self.group_uuid)
            .field("is_favorite", &self.is_favorite)
            .field("history_len", &self.history.len())
            .field("times", &self.times)
            .finish_non_exhaustive()
    }
}
