//! Entry groups.

use uuid::Uuid;

/// A named folder of entries. Only the root group has no parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub(crate) uuid: Uuid,
    pub name: String,
    pub parent_uuid: Option<Uuid>,
}

impl Group {
    /// New group under `parent_uuid`.
    pub fn new(name: impl Into<String>, parent_uuid: Uuid) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: name.into(),
            parent_uuid: Some(parent_uuid),
        }
    }

    pub(crate) fn root(name: impl Into<String>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: name.into(),
            parent_uuid: None,
        }
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn is_root(&self) -> bool {
        self.parent_uuid.is_none()
    }
}
