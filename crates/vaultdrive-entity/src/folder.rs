//! Folder entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A folder in the per-user hierarchy.
///
/// `path` is the materialized chain of ancestor ids from root to self
/// (e.g. `/a1b2/c3d4/self-id`), recomputed on create and move and cascaded
/// to all descendants.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Folder {
    /// Unique folder identifier.
    pub id: Uuid,
    /// The folder owner.
    pub owner_id: Uuid,
    /// Parent folder (None = root).
    pub parent_id: Option<Uuid>,
    /// Folder name.
    pub name: String,
    /// Materialized path of ancestor ids, ending with this folder's own id.
    pub path: String,
    /// Depth in the tree (0 for root folders).
    pub depth: i32,
    /// Soft-delete timestamp (None = live).
    pub deleted_at: Option<DateTime<Utc>>,
    /// When the folder was created.
    pub created_at: DateTime<Utc>,
    /// When the folder was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Folder {
    /// Whether this is a root folder (no parent).
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Whether the folder sits in the trash.
    pub fn is_trashed(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Whether the materialized path contains `id` as a segment.
    ///
    /// Used for the descendant check on moves: a folder whose path contains
    /// another folder's id lies inside that folder's subtree.
    pub fn path_contains(&self, id: Uuid) -> bool {
        let needle = id.to_string();
        self.path.split('/').any(|segment| segment == needle)
    }

    /// Compute the materialized path for a folder with the given id placed
    /// under `parent_path` (None = root).
    pub fn build_path(parent_path: Option<&str>, id: Uuid) -> String {
        match parent_path {
            Some(parent) => format!("{parent}/{id}"),
            None => format!("/{id}"),
        }
    }
}

/// Data required to create a new folder.
///
/// The id is generated by the caller because the materialized path must
/// embed it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateFolder {
    /// Pre-generated folder identifier.
    pub id: Uuid,
    /// The folder owner.
    pub owner_id: Uuid,
    /// Parent folder (None = root).
    pub parent_id: Option<Uuid>,
    /// Folder name.
    pub name: String,
    /// Materialized path.
    pub path: String,
    /// Depth in the tree.
    pub depth: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_path() {
        let id = Uuid::new_v4();
        assert_eq!(Folder::build_path(None, id), format!("/{id}"));

        let child = Uuid::new_v4();
        let parent_path = format!("/{id}");
        assert_eq!(
            Folder::build_path(Some(&parent_path), child),
            format!("/{id}/{child}")
        );
    }

    #[test]
    fn test_path_contains() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let folder = Folder {
            id: b,
            owner_id: Uuid::new_v4(),
            parent_id: Some(a),
            name: "b".to_string(),
            path: format!("/{a}/{b}"),
            depth: 1,
            deleted_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(folder.path_contains(a));
        assert!(folder.path_contains(b));
        assert!(!folder.path_contains(Uuid::new_v4()));
    }
}
