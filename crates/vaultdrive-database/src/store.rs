//! Metadata store traits.
//!
//! These traits are the seam between business services and the backing
//! metadata store. Each method that touches more than one row is specified
//! to be atomic: the PostgreSQL implementations wrap it in a single
//! transaction, the memory store holds one lock for its duration. Quota
//! counter changes are always guarded updates inside the same atomic scope,
//! never separate read-then-write round trips.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use vaultdrive_core::result::AppResult;
use vaultdrive_entity::{CreateFile, CreateFolder, File, FileVersion, Folder, User};

/// Replacement content for an existing file (overwrite upload).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct NewFileContent {
    /// Storage key of the freshly written bytes.
    pub storage_key: String,
    /// Size of the new content in bytes.
    pub size_bytes: i64,
    /// MIME type of the new content.
    pub mime_type: Option<String>,
}

/// Store for user rows and the per-user quota ledger.
#[async_trait]
pub trait UserStore: Send + Sync + 'static {
    /// Create a user with the given quota.
    async fn create_user(&self, quota_bytes: i64) -> AppResult<User>;

    /// Find a user by id.
    async fn find_user(&self, id: Uuid) -> AppResult<Option<User>>;

    /// Set a user's quota limit.
    async fn set_quota(&self, id: Uuid, quota_bytes: i64) -> AppResult<User>;

    /// Atomically adjust the used-bytes counter by `delta` (clamped at
    /// zero). No quota guard: used for corrections and releases.
    async fn adjust_used_bytes(&self, id: Uuid, delta: i64) -> AppResult<User>;

    /// Resum live file sizes and overwrite the used-bytes counter,
    /// correcting any drift. Returns the recalculated value.
    async fn recalculate_used_bytes(&self, id: Uuid) -> AppResult<i64>;
}

/// Store for file rows and their version history.
#[async_trait]
pub trait FileStore: Send + Sync + 'static {
    /// Find a file by id, regardless of trash state.
    async fn find_file(&self, id: Uuid) -> AppResult<Option<File>>;

    /// Find the live file with the given name in a folder (None = root).
    async fn find_live_by_name(
        &self,
        owner_id: Uuid,
        folder_id: Option<Uuid>,
        name: &str,
    ) -> AppResult<Option<File>>;

    /// List live files in a folder (None = root).
    async fn list_live(&self, owner_id: Uuid, folder_id: Option<Uuid>) -> AppResult<Vec<File>>;

    /// List all files (live and trashed) contained in any of the given
    /// folders. Used by recursive purge walks.
    async fn list_in_folders(&self, folder_ids: &[Uuid]) -> AppResult<Vec<File>>;

    /// Insert a new file at version 1, reserving its size against the
    /// owner's quota in the same transaction. Fails with `QuotaExceeded`
    /// and commits nothing when the reservation does not fit.
    async fn insert_with_quota(&self, data: &CreateFile) -> AppResult<File>;

    /// Overwrite a file's content: archive the current state as a version
    /// row carrying the previous version number, bump `current_version`,
    /// swap in the new key/size/mime, and reserve the size delta against
    /// the owner's quota. One transaction; nothing commits on failure.
    async fn replace_content(&self, id: Uuid, content: &NewFileContent) -> AppResult<File>;

    /// Promote an archived version to current: archive the current state,
    /// copy the target version's key/size into the row, bump
    /// `current_version`, and adjust the quota by the size delta. One
    /// transaction.
    async fn promote_version(&self, id: Uuid, version_number: i32) -> AppResult<File>;

    /// Find a specific archived version of a file.
    async fn find_version(
        &self,
        file_id: Uuid,
        version_number: i32,
    ) -> AppResult<Option<FileVersion>>;

    /// List archived versions of a file, newest first.
    async fn list_versions(&self, file_id: Uuid) -> AppResult<Vec<FileVersion>>;

    /// Re-parent a file (None = root).
    async fn set_folder(&self, id: Uuid, folder_id: Option<Uuid>) -> AppResult<File>;

    /// Soft-delete a live file and release its size from the quota ledger.
    async fn soft_delete(&self, id: Uuid) -> AppResult<File>;

    /// Restore a trashed file and re-account its size in the quota ledger.
    async fn restore(&self, id: Uuid) -> AppResult<File>;

    /// Remove a file row and all of its version rows. The ledger is
    /// decremented only when the file was still live. Physical bytes are
    /// the caller's responsibility.
    async fn purge(&self, id: Uuid) -> AppResult<()>;

    /// List a user's trashed files, newest deletion first.
    async fn list_trashed(&self, owner_id: Uuid) -> AppResult<Vec<File>>;

    /// List all files trashed before the cutoff, across users.
    async fn list_trashed_before(&self, cutoff: DateTime<Utc>) -> AppResult<Vec<File>>;
}

/// Store for the folder hierarchy.
#[async_trait]
pub trait FolderStore: Send + Sync + 'static {
    /// Find a folder by id, regardless of trash state.
    async fn find_folder(&self, id: Uuid) -> AppResult<Option<Folder>>;

    /// Find the live folder with the given name under a parent (None = root).
    async fn find_live_by_name(
        &self,
        owner_id: Uuid,
        parent_id: Option<Uuid>,
        name: &str,
    ) -> AppResult<Option<Folder>>;

    /// List live child folders (None = root level).
    async fn list_live_children(
        &self,
        owner_id: Uuid,
        parent_id: Option<Uuid>,
    ) -> AppResult<Vec<Folder>>;

    /// Insert a new folder.
    async fn insert(&self, data: &CreateFolder) -> AppResult<Folder>;

    /// Rename a folder. Paths are id-based and unaffected.
    async fn rename(&self, id: Uuid, name: &str) -> AppResult<Folder>;

    /// Re-parent a folder and rewrite the materialized path of the folder
    /// and every descendant in one transaction (prefix rewrite). The
    /// subtree is fully updated before the call returns.
    async fn move_with_cascade(
        &self,
        id: Uuid,
        new_parent_id: Option<Uuid>,
        new_path: &str,
        new_depth: i32,
    ) -> AppResult<Folder>;

    /// List all descendants of a folder (live and trashed), shallowest
    /// first, via a materialized-path prefix query.
    async fn find_descendants(&self, id: Uuid) -> AppResult<Vec<Folder>>;

    /// Soft-delete a folder: stamp one shared trash timestamp on the
    /// folder, every live descendant folder, and every live contained
    /// file, and release the trashed file bytes from the quota ledger.
    /// One transaction.
    async fn soft_delete_cascade(&self, id: Uuid) -> AppResult<Folder>;

    /// Restore a trashed folder: clear the trash marker on the folder and
    /// on every descendant folder/file whose trash timestamp is at or
    /// after the folder's own, re-accounting restored file bytes in the
    /// ledger. Items trashed independently beforehand stay trashed. One
    /// transaction.
    async fn restore_cascade(&self, id: Uuid) -> AppResult<Folder>;

    /// Remove all metadata rows of a folder subtree (version rows, file
    /// rows, folder rows, the folder itself), decrementing the ledger for
    /// files that were still live. One transaction. Returns
    /// `(files_removed, folders_removed)`. Physical bytes are the caller's
    /// responsibility.
    async fn purge_subtree(&self, id: Uuid) -> AppResult<(u64, u64)>;

    /// List a user's trashed folders, newest deletion first.
    async fn list_trashed(&self, owner_id: Uuid) -> AppResult<Vec<Folder>>;

    /// List all folders trashed before the cutoff, across users.
    async fn list_trashed_before(&self, cutoff: DateTime<Utc>) -> AppResult<Vec<Folder>>;
}
