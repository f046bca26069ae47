//! File operations: upload with version archiving, downloads, moves, and
//! soft deletion.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{info, warn};
use uuid::Uuid;

use vaultdrive_core::error::AppError;
use vaultdrive_core::result::AppResult;
use vaultdrive_core::traits::storage::{
    stream_from_bytes, ByteRange, ByteStream, SaveRequest, StorageBackend,
};
use vaultdrive_database::{FileStore, FolderStore, NewFileContent};
use vaultdrive_entity::{CreateFile, File, FileVersion, Folder};

/// Coordinates the storage backend and the metadata store for file
/// operations.
///
/// Uploads write bytes first and commit metadata second; when the metadata
/// commit fails the freshly written object is deleted again so no
/// unaccounted bytes survive.
#[derive(Clone)]
pub struct FileService {
    files: Arc<dyn FileStore>,
    folders: Arc<dyn FolderStore>,
    backend: Arc<dyn StorageBackend>,
}

impl FileService {
    /// Create a new file service.
    pub fn new(
        files: Arc<dyn FileStore>,
        folders: Arc<dyn FolderStore>,
        backend: Arc<dyn StorageBackend>,
    ) -> Self {
        Self {
            files,
            folders,
            backend,
        }
    }

    /// Upload content under a logical name.
    ///
    /// A live file with the same name in the same folder is overwritten:
    /// its previous content is archived as a version and the version number
    /// bumps. Otherwise a new file is created at version 1. Either way the
    /// owner's quota is enforced atomically with the metadata commit.
    pub async fn upload(
        &self,
        owner_id: Uuid,
        folder_id: Option<Uuid>,
        name: &str,
        mime_type: Option<String>,
        data: ByteStream,
    ) -> AppResult<File> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::validation("File name cannot be empty"));
        }
        if let Some(folder_id) = folder_id {
            self.require_live_folder(owner_id, folder_id).await?;
        }

        let stored = self
            .backend
            .save(
                data,
                &SaveRequest {
                    name: name.to_string(),
                    mime_type: mime_type.clone(),
                },
            )
            .await?;

        let existing = self
            .files
            .find_live_by_name(owner_id, folder_id, name)
            .await?;

        let result = match &existing {
            Some(current) => {
                self.files
                    .replace_content(
                        current.id,
                        &NewFileContent {
                            storage_key: stored.storage_key.clone(),
                            size_bytes: stored.size_bytes,
                            mime_type,
                        },
                    )
                    .await
            }
            None => {
                self.files
                    .insert_with_quota(&CreateFile {
                        owner_id,
                        folder_id,
                        name: name.to_string(),
                        mime_type,
                        size_bytes: stored.size_bytes,
                        storage_key: stored.storage_key.clone(),
                    })
                    .await
            }
        };

        match result {
            Ok(file) => {
                info!(
                    owner_id = %owner_id,
                    file_id = %file.id,
                    name,
                    version = file.current_version,
                    bytes = file.size_bytes,
                    "File uploaded"
                );
                Ok(file)
            }
            Err(err) => {
                // The metadata commit rolled back, so the object just
                // written is unreferenced and must not linger.
                if let Err(cleanup) = self.backend.delete(&stored.storage_key).await {
                    warn!(
                        storage_key = %stored.storage_key,
                        error = %cleanup,
                        "Failed to clean up object after rejected upload"
                    );
                }
                Err(err)
            }
        }
    }

    /// Upload a fully buffered payload. Convenience wrapper over
    /// [`FileService::upload`].
    pub async fn upload_bytes(
        &self,
        owner_id: Uuid,
        folder_id: Option<Uuid>,
        name: &str,
        mime_type: Option<String>,
        data: Bytes,
    ) -> AppResult<File> {
        self.upload(owner_id, folder_id, name, mime_type, stream_from_bytes(data))
            .await
    }

    /// Get a live file's metadata.
    pub async fn get_file(&self, owner_id: Uuid, file_id: Uuid) -> AppResult<File> {
        let file = self
            .files
            .find_file(file_id)
            .await?
            .filter(|f| f.owner_id == owner_id)
            .ok_or_else(|| AppError::not_found(format!("File {file_id} not found")))?;
        if file.is_trashed() {
            return Err(AppError::not_found(format!("File {file_id} not found")));
        }
        Ok(file)
    }

    /// List live files in a folder (None = root).
    pub async fn list_files(
        &self,
        owner_id: Uuid,
        folder_id: Option<Uuid>,
    ) -> AppResult<Vec<File>> {
        if let Some(folder_id) = folder_id {
            self.require_live_folder(owner_id, folder_id).await?;
        }
        self.files.list_live(owner_id, folder_id).await
    }

    /// Download a file's current content into memory.
    pub async fn download(&self, owner_id: Uuid, file_id: Uuid) -> AppResult<(File, Bytes)> {
        let file = self.get_file(owner_id, file_id).await?;
        let data = self.backend.read_bytes(&file.storage_key).await?;
        Ok((file, data))
    }

    /// Download a file's current content as a stream, optionally limited
    /// to a byte range (seekable media playback).
    pub async fn download_stream(
        &self,
        owner_id: Uuid,
        file_id: Uuid,
        range: Option<ByteRange>,
    ) -> AppResult<(File, ByteStream)> {
        let file = self.get_file(owner_id, file_id).await?;
        let stream = self.backend.read_stream(&file.storage_key, range).await?;
        Ok((file, stream))
    }

    /// Move a live file to another folder (None = root).
    pub async fn move_file(
        &self,
        owner_id: Uuid,
        file_id: Uuid,
        target_folder_id: Option<Uuid>,
    ) -> AppResult<File> {
        let file = self.get_file(owner_id, file_id).await?;
        if let Some(target_id) = target_folder_id {
            self.require_live_folder(owner_id, target_id).await?;
        }

        if let Some(existing) = self
            .files
            .find_live_by_name(owner_id, target_folder_id, &file.name)
            .await?
        {
            if existing.id != file_id {
                return Err(AppError::conflict(format!(
                    "A file named '{}' already exists in the target folder",
                    file.name
                )));
            }
        }

        let moved = self.files.set_folder(file_id, target_folder_id).await?;
        info!(owner_id = %owner_id, file_id = %file_id, "File moved");
        Ok(moved)
    }

    /// A file's current state together with its archived versions, newest
    /// first.
    pub async fn versions(
        &self,
        owner_id: Uuid,
        file_id: Uuid,
    ) -> AppResult<(File, Vec<FileVersion>)> {
        let file = self.get_file(owner_id, file_id).await?;
        let versions = self.files.list_versions(file_id).await?;
        Ok((file, versions))
    }

    /// Restore an archived version as the current content.
    ///
    /// The current content is archived in turn, so nothing is lost and the
    /// version number keeps increasing. Fails when the archived bytes are
    /// gone from the backend.
    pub async fn restore_version(
        &self,
        owner_id: Uuid,
        file_id: Uuid,
        version_number: i32,
    ) -> AppResult<File> {
        self.get_file(owner_id, file_id).await?;

        let version = self
            .files
            .find_version(file_id, version_number)
            .await?
            .ok_or_else(|| {
                AppError::not_found(format!(
                    "Version {version_number} of file {file_id} not found"
                ))
            })?;

        if !self.backend.exists(&version.storage_key).await? {
            return Err(AppError::not_found(format!(
                "Stored content for version {version_number} of file {file_id} no longer exists"
            )));
        }

        let restored = self.files.promote_version(file_id, version_number).await?;
        info!(
            owner_id = %owner_id,
            file_id = %file_id,
            restored_version = version_number,
            new_version = restored.current_version,
            "Version restored"
        );
        Ok(restored)
    }

    /// Move a live file to the trash. Bytes stay in the backend until the
    /// trash entry is purged.
    pub async fn delete(&self, owner_id: Uuid, file_id: Uuid) -> AppResult<File> {
        let file = self.get_file(owner_id, file_id).await?;
        let trashed = self.files.soft_delete(file.id).await?;
        info!(owner_id = %owner_id, file_id = %file_id, "File moved to trash");
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
