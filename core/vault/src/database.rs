//! The decrypted vault database.
//!
//! [`VaultDatabase`] is an immutable value. Every transform borrows the
//! current database and returns a new one with recomputed counts and a fresh
//! modification time, so readers holding an older snapshot never observe a
//! half-applied change.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::entry::{PasswordEntry, PasswordHistoryEntry};
use crate::group::Group;
use pwvault_common::{Error, Result};

/// Version string written into new vaults.
pub const DATABASE_VERSION: &str = "1.0";

/// Vault-level descriptive data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultMetadata {
    pub version: String,
    pub name: String,
    pub description: String,
    pub creation_time: DateTime<Utc>,
    pub last_modification_time: DateTime<Utc>,
    pub generator: String,
    pub entry_count: usize,
    pub group_count: usize,
}

/// Tombstone left behind by a removed entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletedObject {
    pub uuid: Uuid,
    pub deletion_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultDatabase {
    metadata: VaultMetadata,
    /// Root group first.
    groups: Vec<Group>,
    entries: Vec<PasswordEntry>,
    deleted_objects: Vec<DeletedObject>,
}

impl VaultDatabase {
    /// Empty database holding only a root group named after the vault.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        generator: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let name = name.into();
        let root = Group::root(name.clone());
        Self {
            metadata: VaultMetadata {
                version: DATABASE_VERSION.to_string(),
                name,
                description: description.into(),
                creation_time: now,
                last_modification_time: now,
                generator: generator.into(),
                entry_count: 0,
                group_count: 1,
            },
            groups: vec![root],
            entries: Vec::new(),
            deleted_objects: Vec::new(),
        }
    }

    /// Reassemble a database read from storage.
    ///
    /// # Errors
    /// - `Serialization` if there is not exactly one root group, UUIDs repeat,
    ///   or a group or entry points at a group that does not exist
    pub(crate) fn from_parts(
        mut metadata: VaultMetadata,
        mut groups: Vec<Group>,
        entries: Vec<PasswordEntry>,
        deleted_objects: Vec<DeletedObject>,
    ) -> Result<Self> {
        let roots = groups.iter().filter(|g| g.is_root()).count();
        if roots != 1 {
            return Err(Error::Serialization(format!(
                "Expected exactly one root group, found {}",
                roots
            )));
        }
        if let Some(pos) = groups.iter().position(Group::is_root) {
            groups[..=pos].rotate_right(1);
        }

        let mut seen = std::collections::HashSet::new();
        let ids = groups.iter().map(Group::uuid).chain(entries.iter().map(PasswordEntry::uuid));
        for id in ids {
            if !seen.insert(id) {
                return Err(Error::Serialization(format!("Duplicate UUID {}", id)));
            }
        }

        let parents: std::collections::HashMap<Uuid, Option<Uuid>> =
            groups.iter().map(|g| (g.uuid, g.parent_uuid)).collect();
        for group in &groups {
            // Every chain of parents must end at the root.
            let mut current = group.parent_uuid;
            let mut steps = 0;
            while let Some(parent) = current {
                current = *parents.get(&parent).ok_or_else(|| {
                    Error::Serialization(format!(
                        "Group {} has unknown parent {}",
                        group.uuid, parent
                    ))
                })?;
                steps += 1;
                if steps > groups.len() {
                    return Err(Error::Serialization(format!(
                        "Group {} is part of a parent cycle",
                        group.uuid
                    )));
                }
            }
        }
        for entry in &entries {
            if let Some(group_uuid) = entry.group_uuid {
                if !parents.contains_key(&group_uuid) {
                    return Err(Error::Serialization(format!(
                        "Entry {} is in unknown group {}",
                        entry.uuid, group_uuid
                    )));
                }
            }
        }

        metadata.entry_count = entries.len();
        metadata.group_count = groups.len();
        Ok(Self {
            metadata,
            groups,
            entries,
            deleted_objects,
        })
    }

    pub fn metadata(&self) -> &VaultMetadata {
        &self.metadata
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn entries(&self) -> &[PasswordEntry] {
        &self.entries
    }

    pub fn deleted_objects(&self) -> &[DeletedObject] {
        &self.deleted_objects
    }

    pub fn root_group(&self) -> &Group {
        &self.groups[0]
    }

    pub fn entry(&self, uuid: Uuid) -> Option<&PasswordEntry> {
        self.entries.iter().find(|e| e.uuid == uuid)
    }

    pub fn group(&self, uuid: Uuid) -> Option<&Group> {
        self.groups.iter().find(|g| g.uuid == uuid)
    }

    fn entry_index(&self, uuid: Uuid) -> Result<usize> {
        self.entries
            .iter()
            .position(|e| e.uuid == uuid)
            .ok_or_else(|| Error::NotFound(format!("Entry {}", uuid)))
    }

    fn check_group(&self, group_uuid: Option<Uuid>) -> Result<()> {
        match group_uuid {
            Some(uuid) if self.group(uuid).is_none() => {
                Err(Error::NotFound(format!("Group {}", uuid)))
            }
            _ => Ok(()),
        }
    }

    fn touched(mut self, now: DateTime<Utc>) -> Self {
        self.metadata.entry_count = self.entries.len();
        self.metadata.group_count = self.groups.len();
        self.metadata.last_modification_time = now;
        self
    }

    /// Insert a new entry.
    ///
    /// # Errors
    /// - `AlreadyExists` if an entry with the same UUID is present
    /// - `NotFound` if the entry names a group that does not exist
    pub fn add_entry(&self, entry: PasswordEntry, now: DateTime<Utc>) -> Result<Self> {
        if self.entry(entry.uuid).is_some() {
            return Err(Error::AlreadyExists(format!("Entry {}", entry.uuid)));
        }
        self.check_group(entry.group_uuid)?;

        let mut next = self.clone();
        next.entries.push(entry);
        Ok(next.touched(now))
    }

    /// Replace the stored entry with the same UUID.
    ///
    /// History and creation time come from the stored entry, never from the
    /// caller. A changed password moves the stored one into the history.
    pub fn update_entry(&self, entry: PasswordEntry, now: DateTime<Utc>) -> Result<Self> {
        let index = self.entry_index(entry.uuid)?;
        self.check_group(entry.group_uuid)?;
        let stored = &self.entries[index];

        let mut updated = entry;
        updated.history = stored.history.clone();
        updated.times.creation_time = stored.times.creation_time;
        if updated.password != stored.password {
            updated.history.push(PasswordHistoryEntry {
                password: stored.password.clone(),
                modified_at: stored.times.last_modification_time,
            });
        }
        updated.times.last_modification_time = now;

        let mut next = self.clone();
        next.entries[index] = updated;
        Ok(next.touched(now))
    }

    /// Remove an entry and record a tombstone for it.
    pub fn delete_entry(&self, uuid: Uuid, now: DateTime<Utc>) -> Result<Self> {
        let index = self.entry_index(uuid)?;

        let mut next = self.clone();
        next.entries.remove(index);
        next.deleted_objects.push(DeletedObject {
            uuid,
            deletion_time: now,
        });
        Ok(next.touched(now))
    }

    pub fn toggle_favorite(&self, uuid: Uuid, now: DateTime<Utc>) -> Result<Self> {
        let index = self.entry_index(uuid)?;

        let mut next = self.clone();
        let entry = &mut next.entries[index];
        entry.is_favorite = !entry.is_favorite;
        entry.times.last_modification_time = now;
        Ok(next.touched(now))
    }

    /// Record that an entry was viewed or used.
    pub fn mark_accessed(&self, uuid: Uuid, now: DateTime<Utc>) -> Result<Self> {
        let index = self.entry_index(uuid)?;

        let mut next = self.clone();
        next.entries[index].times.last_access_time = now;
        Ok(next.touched(now))
    }

    /// Set a new password on an entry, rolling the old one into its history.
    pub fn change_entry_password(
        &self,
        uuid: Uuid,
        new_password: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let index = self.entry_index(uuid)?;

        let mut next = self.clone();
        next.entries[index] = self.entries[index].with_updated_password(new_password, now);
        Ok(next.touched(now))
    }

    /// Insert a group. A group without a parent is placed under the root.
    ///
    /// # Errors
    /// - `InvalidInput` if the name is blank
    /// - `AlreadyExists` if the UUID is taken
    /// - `NotFound` if the parent does not exist
    pub fn add_group(&self, mut group: Group, now: DateTime<Utc>) -> Result<Self> {
        if group.name.trim().is_empty() {
            return Err(Error::InvalidInput("Group name cannot be empty".to_string()));
        }
        if self.group(group.uuid).is_some() {
            return Err(Error::AlreadyExists(format!("Group {}", group.uuid)));
        }
        let parent = group.parent_uuid.unwrap_or(self.root_group().uuid);
        self.check_group(Some(parent))?;
        group.parent_uuid = Some(parent);

        let mut next = self.clone();
        next.groups.push(group);
        Ok(next.touched(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn empty() -> VaultDatabase {
        VaultDatabase::new("My Passwords", "", "pwvault", t(0))
    }

    fn email(now: DateTime<Utc>) -> PasswordEntry {
        let mut entry = PasswordEntry::new("Email", now);
        entry.user_name = "a@b.com".to_string();
        entry.password = "xyz".to_string();
        entry
    }

    #[test]
    fn test_new_database_has_root_only() {
        let db = empty();
        assert_eq!(db.groups().len(), 1);
        assert!(db.root_group().is_root());
        assert_eq!(db.root_group().name, "My Passwords");
        assert_eq!(db.metadata().group_count, 1);
        assert_eq!(db.metadata().entry_count, 0);
        assert_eq!(db.metadata().version, DATABASE_VERSION);
    }

    #[test]
    fn test_add_entry_is_a_new_value() {
        let db = empty();
        let entry = email(t(1));
        let uuid = entry.uuid();

        let next = db.add_entry(entry, t(1)).unwrap();

        assert!(db.entries().is_empty());
        assert_eq!(next.entries().len(), 1);
        assert_eq!(next.metadata().entry_count, 1);
        assert_eq!(next.metadata().last_modification_time, t(1));
        assert_eq!(next.entry(uuid).unwrap().title, "Email");
    }

    #[test]
    fn test_add_entry_rejects_duplicates_and_unknown_groups() {
        let entry = email(t(1));
        let db = empty().add_entry(entry.clone(), t(1)).unwrap();
        assert!(matches!(
            db.add_entry(entry, t(2)),
            Err(Error::AlreadyExists(_))
        ));

        let mut orphan = email(t(2));
        orphan.group_uuid = Some(Uuid::new_v4());
        assert!(matches!(db.add_entry(orphan, t(2)), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_update_entry_rolls_password_into_history() {
        let entry = email(t(1));
        let uuid = entry.uuid();
        let db = empty().add_entry(entry, t(1)).unwrap();

        let mut edited = db.entry(uuid).unwrap().clone();
        edited.password = "abc".to_string();
        edited.title = "Mail".to_string();
        let db = db.update_entry(edited, t(2)).unwrap();

        let stored = db.entry(uuid).unwrap();
        assert_eq!(stored.title, "Mail");
        assert_eq!(stored.password, "abc");
        assert_eq!(stored.history().len(), 1);
        assert_eq!(stored.history()[0].password, "xyz");
        assert_eq!(stored.history()[0].modified_at, t(1));
        assert_eq!(stored.times.last_modification_time, t(2));
        assert_eq!(stored.times.creation_time, t(1));
    }

    #[test]
    fn test_update_entry_ignores_caller_history() {
        let entry = email(t(1));
        let uuid = entry.uuid();
        let db = empty().add_entry(entry, t(1)).unwrap();
        let db = db.change_entry_password(uuid, "second", t(2)).unwrap();

        // A copy taken before the change carries an empty history.
        let mut stale = email(t(1));
        stale.uuid = uuid;
        stale.password = "second".to_string();
        stale.notes = "edited".to_string();
        let db = db.update_entry(stale, t(3)).unwrap();

        let stored = db.entry(uuid).unwrap();
        assert_eq!(stored.history().len(), 1);
        assert_eq!(stored.notes, "edited");
    }

    #[test]
    fn test_update_missing_entry() {
        let db = empty();
        assert!(matches!(
            db.update_entry(email(t(1)), t(1)),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_delete_entry_leaves_tombstone() {
        let entry = email(t(1));
        let uuid = entry.uuid();
        let db = empty().add_entry(entry, t(1)).unwrap();

        let db = db.delete_entry(uuid, t(5)).unwrap();

        assert!(db.entries().is_empty());
        assert_eq!(db.metadata().entry_count, 0);
        assert_eq!(
            db.deleted_objects(),
            &[DeletedObject {
                uuid,
                deletion_time: t(5)
            }]
        );
        assert!(db.delete_entry(uuid, t(6)).is_err());
    }

    #[test]
    fn test_toggle_favorite() {
        let entry = email(t(1));
        let uuid = entry.uuid();
        let db = empty().add_entry(entry, t(1)).unwrap();

        let db = db.toggle_favorite(uuid, t(2)).unwrap();
        assert!(db.entry(uuid).unwrap().is_favorite);
        let db = db.toggle_favorite(uuid, t(3)).unwrap();
        assert!(!db.entry(uuid).unwrap().is_favorite);
    }

    #[test]
    fn test_mark_accessed() {
        let entry = email(t(1));
        let uuid = entry.uuid();
        let db = empty().add_entry(entry, t(1)).unwrap();

        let db = db.mark_accessed(uuid, t(9)).unwrap();
        let stored = db.entry(uuid).unwrap();
        assert_eq!(stored.times.last_access_time, t(9));
        assert_eq!(stored.times.last_modification_time, t(1));
    }

    #[test]
    fn test_add_group() {
        let db = empty();
        let root = db.root_group().uuid();

        let work = Group::new("Work", root);
        let work_id = work.uuid();
        let db = db.add_group(work, t(1)).unwrap();
        assert_eq!(db.metadata().group_count, 2);

        let mut loose = Group::new("Loose", root);
        loose.parent_uuid = None;
        let loose_id = loose.uuid();
        let db = db.add_group(loose, t(2)).unwrap();
        assert_eq!(db.group(loose_id).unwrap().parent_uuid, Some(root));

        let nested = Group::new("Servers", work_id);
        assert!(db.add_group(nested, t(3)).is_ok());

        assert!(matches!(
            db.add_group(Group::new("Ghost", Uuid::new_v4()), t(3)),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            db.add_group(Group::new("  ", root), t(3)),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_from_parts_validates_root() {
        let db = empty();
        let root = db.root_group().clone();
        let child = Group::new("Child", root.uuid());

        // Root is moved to the front and counts are recomputed.
        let mut metadata = db.metadata().clone();
        metadata.group_count = 99;
        let rebuilt = VaultDatabase::from_parts(
            metadata.clone(),
            vec![child.clone(), root.clone()],
            vec![],
            vec![],
        )
        .unwrap();
        assert_eq!(rebuilt.root_group(), &root);
        assert_eq!(rebuilt.metadata().group_count, 2);

        assert!(VaultDatabase::from_parts(metadata.clone(), vec![child], vec![], vec![]).is_err());
        assert!(
            VaultDatabase::from_parts(metadata, vec![root.clone(), root], vec![], vec![]).is_err()
        );
    }

    #[test]
    fn test_from_parts_rejects_dangling_references() {
        let db = empty();
        let metadata = db.metadata().clone();
        let root = db.root_group().clone();
        let orphan = Group::new("Orphan", Uuid::new_v4());

        assert!(matches!(
            VaultDatabase::from_parts(metadata.clone(), vec![root.clone(), orphan], vec![], vec![]),
            Err(Error::Serialization(_))
        ));

        let mut a = Group::new("A", root.uuid());
        let b = Group::new("B", a.uuid());
        a.parent_uuid = Some(b.uuid());
        assert!(matches!(
            VaultDatabase::from_parts(metadata.clone(), vec![root.clone(), a, b], vec![], vec![]),
            Err(Error::Serialization(_))
        ));

        let mut stray = PasswordEntry::new("Stray", t(0));
        stray.group_uuid = Some(Uuid::new_v4());
        assert!(matches!(
            VaultDatabase::from_parts(metadata.clone(), vec![root.clone()], vec![stray], vec![]),
            Err(Error::Serialization(_))
        ));

        let mut filed = PasswordEntry::new("Filed", t(0));
        filed.group_uuid = Some(root.uuid());
        assert!(VaultDatabase::from_parts(metadata, vec![root], vec![filed], vec![]).is_ok());
    }
}
