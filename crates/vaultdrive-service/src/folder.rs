//! Folder hierarchy operations.
//!
//! Paths are materialized chains of ancestor ids, so renames never touch
//! paths and moves rewrite one prefix across the subtree. Cycle prevention
//! is a pure path check: a folder may not move into itself or anywhere its
//! own id already appears as a path segment.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use vaultdrive_core::error::AppError;
use vaultdrive_core::result::AppResult;
use vaultdrive_database::{FileStore, FolderStore};
use vaultdrive_entity::{CreateFolder, File, Folder};

/// The live contents of one folder level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FolderContents {
    /// Live child folders, by name.
    pub folders: Vec<Folder>,
    /// Live files, by name.
    pub files: Vec<File>,
}

/// Manages the per-user folder tree.
#[derive(Clone)]
pub struct FolderService {
    folders: Arc<dyn FolderStore>,
    files: Arc<dyn FileStore>,
}

impl FolderService {
    /// Create a new folder service.
    pub fn new(folders: Arc<dyn FolderStore>, files: Arc<dyn FileStore>) -> Self {
        Self { folders, files }
    }

    /// Create a folder under a parent (None = root level).
    pub async fn create(
        &self,
        owner_id: Uuid,
        parent_id: Option<Uuid>,
        name: &str,
    ) -> AppResult<Folder> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::validation("Folder name cannot be empty"));
        }

        let parent = match parent_id {
            Some(parent_id) => Some(self.require_live_folder(owner_id, parent_id).await?),
            None => None,
        };

        if self
            .folders
            .find_live_by_name(owner_id, parent_id, name)
            .await?
            .is_some()
        {
            return Err(AppError::conflict(format!(
                "A folder named '{name}' already exists here"
            )));
        }

        // The id goes into the materialized path, so it is generated before
        // the insert.
        let id = Uuid::new_v4();
        let path = Folder::build_path(parent.as_ref().map(|p| p.path.as_str()), id);
        let depth = parent.as_ref().map_or(0, |p| p.depth + 1);

        let folder = self
            .folders
            .insert(&CreateFolder {
                id,
                owner_id,
                parent_id,
                name: name.to_string(),
                path,
                depth,
            })
            .await?;

        info!(owner_id = %owner_id, folder_id = %folder.id, name, "Folder created");
        Ok(folder)
    }

    /// Get a live folder's metadata.
    pub async fn get_folder(&self, owner_id: Uuid, folder_id: Uuid) -> AppResult<Folder> {
        self.require_live_folder(owner_id, folder_id).await
    }

    /// List the live contents of a folder level (None = root).
    pub async fn contents(
        &self,
        owner_id: Uuid,
        folder_id: Option<Uuid>,
    ) -> AppResult<FolderContents> {
        if let Some(folder_id) = folder_id {
            self.require_live_folder(owner_id, folder_id).await?;
        }

        let folders = self.folders.list_live_children(owner_id, folder_id).await?;
        let files = self.files.list_live(owner_id, folder_id).await?;
        Ok(FolderContents { folders, files })
    }

    /// Rename a live folder. Paths embed ids, not names, so no descendant
    /// is touched.
    pub async fn rename(&self, owner_id: Uuid, folder_id: Uuid, name: &str) -> AppResult<Folder> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::validation("Folder name cannot be empty"));
        }

        let folder = self.require_live_folder(owner_id, folder_id).await?;

        if let Some(existing) = self
            .folders
            .find_live_by_name(owner_id, folder.parent_id, name)
            .await?
        {
            if existing.id != folder_id {
                return Err(AppError::conflict(format!(
                    "A folder named '{name}' already exists here"
                )));
            }
        }

        let renamed = self.folders.rename(folder_id, name).await?;
        info!(owner_id = %owner_id, folder_id = %folder_id, name, "Folder renamed");
        Ok(renamed)
    }

    /// Move a live folder under a new parent (None = root level),
    /// rewriting the materialized paths of the whole subtree.
    pub async fn move_folder(
        &self,
        owner_id: Uuid,
        folder_id: Uuid,
        new_parent_id: Option<Uuid>,
    ) -> AppResult<Folder> {
        let folder = self.require_live_folder(owner_id, folder_id).await?;

        let parent = match new_parent_id {
            Some(parent_id) => {
                if parent_id == folder_id {
                    return Err(AppError::invalid_operation(
                        "Cannot move a folder into itself",
                    ));
                }
                let parent = self.require_live_folder(owner_id, parent_id).await?;
                if parent.path_contains(folder_id) {
                    return Err(AppError::invalid_operation(
                        "Cannot move a folder into its own subtree",
                    ));
                }
                Some(parent)
            }
            None => None,
        };

        if let Some(existing) = self
            .folders
            .find_live_by_name(owner_id, new_parent_id, &folder.name)
            .await?
        {
            if existing.id != folder_id {
                return Err(AppError::conflict(format!(
                    "A folder named '{}' already exists in the target",
                    folder.name
                )));
            }
        }

        let new_path = Folder::build_path(parent.as_ref().map(|p| p.path.as_str()), folder_id);
        let new_depth = parent.as_ref().map_or(0, |p| p.depth + 1);

        let moved = self
            .folders
            .move_with_cascade(folder_id, new_parent_id, &new_path, new_depth)
            .await?;

        info!(owner_id = %owner_id, folder_id = %folder_id, "Folder moved");
        Ok(moved)
    }

    /// Move a live folder and everything inside it to the trash. The whole
    /// subtree gets one shared trash timestamp so a later restore can
    /// distinguish it from items trashed on their own.
    pub async fn delete(&self, owner_id: Uuid, folder_id: Uuid) -> AppResult<Folder> {
        self.require_live_folder(owner_id, folder_id).await?;
        let trashed = self.folders.soft_delete_cascade(folder_id).await?;
        info!(owner_id = %owner_id, folder_id = %folder_id, "Folder moved to trash");
        Ok(trashed)
    }

    async fn require_live_folder(&self, owner_id: Uuid, folder_id: Uuid) -> AppResult<Folder> {
        let folder = self
            .folders
            .find_folder(folder_id)
            .await?
            .filter(|f| f.owner_id == owner_id)
            .ok_or_else(|| AppError::not_found(format!("Folder {folder_id} not found")))?;
        if folder.is_trashed() {
            return Err(AppError::invalid_operation(format!(
                "Folder {folder_id} is in the trash"
            )));
        }
        Ok(folder)
    }
}
