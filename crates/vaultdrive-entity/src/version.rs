//! File version entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// An archived snapshot of previously-current file content.
///
/// Immutable once created; removed only when the owning file is permanently
/// purged. Version numbers are unique per file and strictly increasing but
/// not necessarily contiguous.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FileVersion {
    /// Unique version identifier.
    pub id: Uuid,
    /// The file this version belongs to.
    pub file_id: Uuid,
    /// The version number this content held while it was current.
    pub version_number: i32,
    /// Key addressing this version's bytes in the storage backend.
    pub storage_key: String,
    /// Size in bytes.
    pub size_bytes: i64,
    /// When this version was archived.
    pub created_at: DateTime<Utc>,
}
