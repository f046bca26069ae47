//! Trash lifecycle: listing, restore, permanent deletion, and the
//! retention sweep.
//!
//! Permanent deletion removes physical bytes first and metadata second.
//! Byte deletions are best-effort: a backend failure is logged and the
//! metadata purge proceeds, so the trash never wedges on a flaky backend.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use vaultdrive_core::config::TrashConfig;
use vaultdrive_core::error::AppError;
use vaultdrive_core::result::AppResult;
use vaultdrive_core::traits::storage::StorageBackend;
use vaultdrive_database::{FileStore, FolderStore};
use vaultdrive_entity::{File, Folder, PurgeReport, TrashItemKind, TrashedItem};

/// Manages trashed files and folders.
#[derive(Clone)]
pub struct TrashService {
    files: Arc<dyn FileStore>,
    folders: Arc<dyn FolderStore>,
    backend: Arc<dyn StorageBackend>,
    retention_days: u32,
}

impl TrashService {
    /// Create a new trash service.
    pub fn new(
        files: Arc<dyn FileStore>,
        folders: Arc<dyn FolderStore>,
        backend: Arc<dyn StorageBackend>,
        config: &TrashConfig,
    ) -> Self {
        Self {
            files,
            folders,
            backend,
            retention_days: config.retention_days,
        }
    }

    /// List a user's trash, newest deletion first. Only the top of each
    /// trashed subtree is listed; items behind a trashed ancestor come
    /// back with that ancestor's restore.
    pub async fn list_trash(&self, owner_id: Uuid) -> AppResult<Vec<TrashedItem>> {
        let trashed_folders = self.folders.list_trashed(owner_id).await?;
        let trashed_folder_ids: HashSet<Uuid> = trashed_folders.iter().map(|f| f.id).collect();

        let mut items = Vec::new();
        for folder in &trashed_folders {
            let parent_trashed = folder
                .parent_id
                .is_some_and(|pid| trashed_folder_ids.contains(&pid));
            if !parent_trashed {
                items.push(TrashedItem {
                    kind: TrashItemKind::Folder,
                    id: folder.id,
                    name: folder.name.clone(),
                    size_bytes: None,
                    deleted_at: folder.deleted_at.expect("trashed folder has timestamp"),
                });
            }
        }

        for file in self.files.list_trashed(owner_id).await? {
            let folder_trashed = file
                .folder_id
                .is_some_and(|fid| trashed_folder_ids.contains(&fid));
            if !folder_trashed {
                items.push(TrashedItem {
                    kind: TrashItemKind::File,
                    id: file.id,
                    name: file.name.clone(),
                    size_bytes: Some(file.size_bytes),
                    deleted_at: file.deleted_at.expect("trashed file has timestamp"),
                });
            }
        }

        items.sort_by(|a, b| b.deleted_at.cmp(&a.deleted_at));
        Ok(items)
    }

    /// Restore a trashed file. Its size is re-accounted against the
    /// owner's quota.
    pub async fn restore_file(&self, owner_id: Uuid, file_id: Uuid) -> AppResult<File> {
        self.require_owned_file(owner_id, file_id).await?;
        let restored = self.files.restore(file_id).await?;
        info!(owner_id = %owner_id, file_id = %file_id, "File restored from trash");
        Ok(restored)
    }

    /// Restore a trashed folder and everything trashed along with it.
    /// Items inside that were trashed independently beforehand stay in
    /// the trash.
    pub async fn restore_folder(&self, owner_id: Uuid, folder_id: Uuid) -> AppResult<Folder> {
        self.require_owned_folder(owner_id, folder_id).await?;
        let restored = self.folders.restore_cascade(folder_id).await?;
        info!(owner_id = %owner_id, folder_id = %folder_id, "Folder restored from trash");
        Ok(restored)
    }

    /// Permanently delete a trashed file: its bytes, its version history,
    /// and its metadata row.
    pub async fn permanent_delete_file(&self, owner_id: Uuid, file_id: Uuid) -> AppResult<()> {
        let file = self.require_owned_file(owner_id, file_id).await?;
        if !file.is_trashed() {
            return Err(AppError::invalid_operation(format!(
                "File {file_id} is not in the trash"
            )));
        }

        self.delete_file_bytes(&file).await;
        self.files.purge(file_id).await?;
        info!(owner_id = %owner_id, file_id = %file_id, "File permanently deleted");
        Ok(())
    }

    /// Permanently delete a trashed folder subtree: every contained file's
    /// bytes and versions, every metadata row, and the folder rows.
    pub async fn permanent_delete_folder(
        &self,
        owner_id: Uuid,
        folder_id: Uuid,
    ) -> AppResult<PurgeReport> {
        let folder = self.require_owned_folder(owner_id, folder_id).await?;
        if !folder.is_trashed() {
            return Err(AppError::invalid_operation(format!(
                "Folder {folder_id} is not in the trash"
            )));
        }

        let report = self.purge_folder_subtree(folder_id).await?;
        info!(
            owner_id = %owner_id,
            folder_id = %folder_id,
            purged_files = report.purged_files,
            purged_folders = report.purged_folders,
            "Folder permanently deleted"
        );
        Ok(report)
    }

    /// Permanently delete everything in a user's trash.
    pub async fn empty_trash(&self, owner_id: Uuid) -> AppResult<PurgeReport> {
        let mut report = PurgeReport::default();

        for file in self.files.list_trashed(owner_id).await? {
            self.delete_file_bytes(&file).await;
            self.files.purge(file.id).await?;
            report.purged_files += 1;
        }

        for folder in self.folders.list_trashed(owner_id).await? {
            // An earlier subtree purge may have taken this folder with it.
            if self.folders.find_folder(folder.id).await?.is_none() {
                continue;
            }
            let sub = self.purge_folder_subtree(folder.id).await?;
            report.purged_files += sub.purged_files;
            report.purged_folders += sub.purged_folders;
        }

        info!(
            owner_id = %owner_id,
            purged_files = report.purged_files,
            purged_folders = report.purged_folders,
            "Trash emptied"
        );
        Ok(report)
    }

    /// Purge everything across all users that has sat in the trash longer
    /// than the retention window. One item failing is logged and skipped;
    /// the sweep keeps going.
    pub async fn auto_purge(&self) -> AppResult<PurgeReport> {
        let cutoff = Utc::now() - Duration::days(i64::from(self.retention_days));
        let mut report = PurgeReport::default();

        for file in self.files.list_trashed_before(cutoff).await? {
            self.delete_file_bytes(&file).await;
            match self.files.purge(file.id).await {
                Ok(()) => report.purged_files += 1,
                Err(err) => {
                    warn!(file_id = %file.id, error = %err, "Failed to purge expired file");
                }
            }
        }

        for folder in self.folders.list_trashed_before(cutoff).await? {
            match self.folders.find_folder(folder.id).await {
                Ok(Some(_)) => {}
                Ok(None) => continue,
                Err(err) => {
                    warn!(folder_id = %folder.id, error = %err, "Failed to check expired folder");
                    continue;
                }
            }
            match self.purge_folder_subtree(folder.id).await {
                Ok(sub) => {
                    report.purged_files += sub.purged_files;
                    report.purged_folders += sub.purged_folders;
                }
                Err(err) => {
                    warn!(folder_id = %folder.id, error = %err, "Failed to purge expired folder");
                }
            }
        }

        info!(
            retention_days = self.retention_days,
            purged_files = report.purged_files,
            purged_folders = report.purged_folders,
            "Trash retention sweep completed"
        );
        Ok(report)
    }

    /// Delete a folder subtree's physical bytes, then its metadata rows.
    async fn purge_folder_subtree(&self, folder_id: Uuid) -> AppResult<PurgeReport> {
        let descendants = self.folders.find_descendants(folder_id).await?;
        let mut subtree_ids: Vec<Uuid> = descendants.iter().map(|f| f.id).collect();
        subtree_ids.push(folder_id);

        for file in self.files.list_in_folders(&subtree_ids).await? {
            self.delete_file_bytes(&file).await;
        }

        let (purged_files, purged_folders) = self.folders.purge_subtree(folder_id).await?;
        Ok(PurgeReport {
            purged_files,
            purged_folders,
        })
    }

    /// Best-effort deletion of a file's current bytes and every archived
    /// version's bytes. A restored version shares its key with the current
    /// row, so keys are deduplicated first.
    async fn delete_file_bytes(&self, file: &File) {
        let mut keys: HashSet<String> = HashSet::new();
        keys.insert(file.storage_key.clone());
        match self.files.list_versions(file.id).await {
            Ok(versions) => {
                for version in versions {
                    keys.insert(version.storage_key);
                }
            }
            Err(err) => {
                warn!(file_id = %file.id, error = %err, "Failed to list versions for purge");
            }
        }

        for key in keys {
            if let Err(err) = self.backend.delete(&key).await {
                warn!(file_id = %file.id, storage_key = %key, error = %err, "Failed to delete object");
            }
        }
    }

    async fn require_owned_file(&self, owner_id: Uuid, file_id: Uuid) -> AppResult<File> {
        self.files
            .find_file(file_id)
            .await?
            .filter(|f| f.owner_id == owner_id)
            .ok_or_else(|| AppError::not_found(format!("File {file_id} not found")))
    }

    async fn require_owned_folder(&self, owner_id: Uuid, folder_id: Uuid) -> AppResult<Folder> {
        self.folders
            .find_folder(folder_id)
            .await?
            .filter(|f| f.owner_id == owner_id)
            .ok_or_else(|| AppError::not_found(format!("Folder {folder_id} not found")))
    }
}
