//! File entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A file stored in VaultDrive.
///
/// The row holds the *current* content pointer; previously-current content
/// is archived as [`FileVersion`](crate::version::FileVersion) rows.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct File {
    /// Unique file identifier.
    pub id: Uuid,
    /// The file owner.
    pub owner_id: Uuid,
    /// Containing folder (None = root).
    pub folder_id: Option<Uuid>,
    /// Logical file name (including extension).
    pub name: String,
    /// MIME type of the file.
    pub mime_type: Option<String>,
    /// Current content size in bytes.
    pub size_bytes: i64,
    /// Key addressing the current bytes in the storage backend.
    pub storage_key: String,
    /// Current version number, starting at 1.
    pub current_version: i32,
    /// Soft-delete timestamp (None = live).
    pub deleted_at: Option<DateTime<Utc>>,
    /// When the file was created.
    pub created_at: DateTime<Utc>,
    /// When the file was last updated.
    pub updated_at: DateTime<Utc>,
}

impl File {
    /// Whether the file sits in the trash.
    pub fn is_trashed(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Get the file extension (lowercase), if any.
    pub fn extension(&self) -> Option<String> {
        self.name
            .rsplit('.')
            .next()
            .filter(|ext| *ext != self.name)
            .map(|ext| ext.to_lowercase())
    }
}

/// Data required to create a new file record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateFile {
    /// The file owner.
    pub owner_id: Uuid,
    /// Containing folder (None = root).
    pub folder_id: Option<Uuid>,
    /// Logical file name.
    pub name: String,
    /// MIME type.
    pub mime_type: Option<String>,
    /// Size in bytes.
    pub size_bytes: i64,
    /// Storage backend key.
    pub storage_key: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> File {
        File {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            folder_id: None,
            name: "Report.PDF".to_string(),
            mime_type: Some("application/pdf".to_string()),
            size_bytes: 10,
            storage_key: "abc.pdf".to_string(),
            current_version: 1,
            deleted_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_extension() {
        assert_eq!(sample().extension(), Some("pdf".to_string()));

        let mut noext = sample();
        noext.name = "README".to_string();
        assert_eq!(noext.extension(), None);
    }

    #[test]
    fn test_is_trashed() {
        let mut file = sample();
        assert!(!file.is_trashed());
        file.deleted_at = Some(Utc::now());
        assert!(file.is_trashed());
    }
}
