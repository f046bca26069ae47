//! Trash listing and purge report types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The kind of a trashed item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrashItemKind {
    /// A trashed file.
    File,
    /// A trashed folder.
    Folder,
}

/// A single entry in a user's trash listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrashedItem {
    /// File or folder.
    pub kind: TrashItemKind,
    /// Identifier of the underlying row.
    pub id: Uuid,
    /// Logical name at deletion time.
    pub name: String,
    /// Size in bytes (files only).
    pub size_bytes: Option<i64>,
    /// When the item was trashed.
    pub deleted_at: DateTime<Utc>,
}

/// Counts returned by empty-trash and the purge sweep.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PurgeReport {
    /// Files whose bytes and metadata were removed.
    pub purged_files: u64,
    /// Folder rows removed.
    pub purged_folders: u64,
}
