//! In-memory implementation of the metadata store traits.
//!
//! Backed by a single mutex over all tables, so every store call is
//! naturally atomic: the lock is the transaction boundary. Check-then-mutate
//! sequences inside one call can never observe or leave partial state,
//! matching the PostgreSQL implementations' transactional contract. Used by
//! the test suites and by embedded single-process deployments.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use vaultdrive_core::error::AppError;
use vaultdrive_core::result::AppResult;
use vaultdrive_entity::{CreateFile, CreateFolder, File, FileVersion, Folder, User};

use crate::store::{FileStore, FolderStore, NewFileContent, UserStore};

#[derive(Debug, Default)]
struct State {
    users: HashMap<Uuid, User>,
    files: HashMap<Uuid, File>,
    versions: Vec<FileVersion>,
    folders: HashMap<Uuid, Folder>,
}

impl State {
    /// Guarded quota reservation. Mirrors the SQL guard: the counter moves
    /// only when the result fits under the limit.
    fn reserve(&mut self, owner_id: Uuid, delta: i64) -> AppResult<()> {
        let user = self
            .users
            .get_mut(&owner_id)
            .ok_or_else(|| AppError::not_found(format!("User {owner_id} not found")))?;
        if user.used_bytes + delta > user.quota_bytes {
            return Err(AppError::quota_exceeded(format!(
                "Storage quota exceeded for user {owner_id}"
            )));
        }
        user.used_bytes = (user.used_bytes + delta).max(0);
        user.updated_at = Utc::now();
        Ok(())
    }

    /// Unguarded counter adjustment, clamped at zero.
    fn release(&mut self, owner_id: Uuid, delta: i64) -> AppResult<()> {
        let user = self
            .users
            .get_mut(&owner_id)
            .ok_or_else(|| AppError::not_found(format!("User {owner_id} not found")))?;
        user.used_bytes = (user.used_bytes + delta).max(0);
        user.updated_at = Utc::now();
        Ok(())
    }

    /// Ids of a folder and every descendant, by path prefix.
    fn subtree_ids(&self, root: &Folder) -> Vec<Uuid> {
        let prefix = format!("{}/", root.path);
        self.folders
            .values()
            .filter(|f| f.id == root.id || f.path.starts_with(&prefix))
            .map(|f| f.id)
            .collect()
    }
}

/// Metadata store keeping everything in process memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryMetadataStore {
    state: Arc<Mutex<State>>,
}

impl MemoryMetadataStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // Lock poisoning only happens when a test thread panicked mid-call.
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[async_trait]
impl UserStore for MemoryMetadataStore {
    async fn create_user(&self, quota_bytes: i64) -> AppResult<User> {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            used_bytes: 0,
            quota_bytes,
            created_at: now,
            updated_at: now,
        };
        self.lock().users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.lock().users.get(&id).cloned())
    }

    async fn set_quota(&self, id: Uuid, quota_bytes: i64) -> AppResult<User> {
        let mut state = self.lock();
        let user = state
            .users
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found(format!("User {id} not found")))?;
        user.quota_bytes = quota_bytes;
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn adjust_used_bytes(&self, id: Uuid, delta: i64) -> AppResult<User> {
        let mut state = self.lock();
        state.release(id, delta)?;
        Ok(state.users[&id].clone())
    }

    async fn recalculate_used_bytes(&self, id: Uuid) -> AppResult<i64> {
        let mut state = self.lock();
        if !state.users.contains_key(&id) {
            return Err(AppError::not_found(format!("User {id} not found")));
        }
        let total: i64 = state
            .files
            .values()
            .filter(|f| f.owner_id == id && f.deleted_at.is_none())
            .map(|f| f.size_bytes)
            .sum();
        let user = state.users.get_mut(&id).expect("checked above");
        user.used_bytes = total;
        user.updated_at = Utc::now();
        Ok(total)
    }
}

#[async_trait]
impl FileStore for MemoryMetadataStore {
    async fn find_file(&self, id: Uuid) -> AppResult<Option<File>> {
        Ok(self.lock().files.get(&id).cloned())
    }

    async fn find_live_by_name(
        &self,
        owner_id: Uuid,
        folder_id: Option<Uuid>,
        name: &str,
    ) -> AppResult<Option<File>> {
        Ok(self
            .lock()
            .files
            .values()
            .find(|f| {
                f.owner_id == owner_id
                    && f.folder_id == folder_id
                    && f.name == name
                    && f.deleted_at.is_none()
            })
            .cloned())
    }

    async fn list_live(&self, owner_id: Uuid, folder_id: Option<Uuid>) -> AppResult<Vec<File>> {
        let mut files: Vec<File> = self
            .lock()
            .files
            .values()
            .filter(|f| {
                f.owner_id == owner_id && f.folder_id == folder_id && f.deleted_at.is_none()
            })
            .cloned()
            .collect();
        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }

    async fn list_in_folders(&self, folder_ids: &[Uuid]) -> AppResult<Vec<File>> {
        Ok(self
            .lock()
            .files
            .values()
            .filter(|f| f.folder_id.is_some_and(|fid| folder_ids.contains(&fid)))
            .cloned()
            .collect())
    }

    async fn insert_with_quota(&self, data: &CreateFile) -> AppResult<File> {
        let mut state = self.lock();

        // Same backstop as the live-sibling-name unique index in SQL.
        let taken = state.files.values().any(|f| {
            f.owner_id == data.owner_id
                && f.folder_id == data.folder_id
                && f.name == data.name
                && f.deleted_at.is_none()
        });
        if taken {
            return Err(AppError::conflict(format!(
                "An item named '{}' already exists in this folder",
                data.name
            )));
        }

        state.reserve(data.owner_id, data.size_bytes)?;

        let now = Utc::now();
        let file = File {
            id: Uuid::new_v4(),
            owner_id: data.owner_id,
            folder_id: data.folder_id,
            name: data.name.clone(),
            mime_type: data.mime_type.clone(),
            size_bytes: data.size_bytes,
            storage_key: data.storage_key.clone(),
            current_version: 1,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };
        state.files.insert(file.id, file.clone());
        Ok(file)
    }

    async fn replace_content(&self, id: Uuid, content: &NewFileContent) -> AppResult<File> {
        let mut state = self.lock();
        let file = state
            .files
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("File {id} not found")))?;
        if file.is_trashed() {
            return Err(AppError::invalid_operation(
                "Cannot overwrite a file that is in the trash",
            ));
        }

        state.reserve(file.owner_id, content.size_bytes - file.size_bytes)?;

        state.versions.push(FileVersion {
            id: Uuid::new_v4(),
            file_id: file.id,
            version_number: file.current_version,
            storage_key: file.storage_key.clone(),
            size_bytes: file.size_bytes,
            created_at: Utc::now(),
        });

        let stored = state.files.get_mut(&id).expect("checked above");
        stored.storage_key = content.storage_key.clone();
        stored.size_bytes = content.size_bytes;
        if content.mime_type.is_some() {
            stored.mime_type = content.mime_type.clone();
        }
        stored.current_version += 1;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn promote_version(&self, id: Uuid, version_number: i32) -> AppResult<File> {
        let mut state = self.lock();
        let file = state
            .files
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("File {id} not found")))?;
        if file.is_trashed() {
            return Err(AppError::invalid_operation(
                "Cannot restore a version of a file that is in the trash",
            ));
        }

        let version = state
            .versions
            .iter()
            .find(|v| v.file_id == id && v.version_number == version_number)
            .cloned()
            .ok_or_else(|| {
                AppError::not_found(format!("Version {version_number} of file {id} not found"))
            })?;

        state.reserve(file.owner_id, version.size_bytes - file.size_bytes)?;

        state.versions.push(FileVersion {
            id: Uuid::new_v4(),
            file_id: file.id,
            version_number: file.current_version,
            storage_key: file.storage_key.clone(),
            size_bytes: file.size_bytes,
            created_at: Utc::now(),
        });

        let stored = state.files.get_mut(&id).expect("checked above");
        stored.storage_key = version.storage_key.clone();
        stored.size_bytes = version.size_bytes;
        stored.current_version += 1;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn find_version(
        &self,
        file_id: Uuid,
        version_number: i32,
    ) -> AppResult<Option<FileVersion>> {
        Ok(self
            .lock()
            .versions
            .iter()
            .find(|v| v.file_id == file_id && v.version_number == version_number)
            .cloned())
    }

    async fn list_versions(&self, file_id: Uuid) -> AppResult<Vec<FileVersion>> {
        let mut versions: Vec<FileVersion> = self
            .lock()
            .versions
            .iter()
            .filter(|v| v.file_id == file_id)
            .cloned()
            .collect();
        versions.sort_by(|a, b| b.version_number.cmp(&a.version_number));
        Ok(versions)
    }

    async fn set_folder(&self, id: Uuid, folder_id: Option<Uuid>) -> AppResult<File> {
        let mut state = self.lock();
        let file = state
            .files
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found(format!("File {id} not found")))?;
        file.folder_id = folder_id;
        file.updated_at = Utc::now();
        Ok(file.clone())
    }

    async fn soft_delete(&self, id: Uuid) -> AppResult<File> {
        let mut state = self.lock();
        let file = state
            .files
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("File {id} not found")))?;
        if file.is_trashed() {
            return Err(AppError::invalid_operation(format!(
                "File {id} is already in the trash"
            )));
        }

        state.release(file.owner_id, -file.size_bytes)?;
        let stored = state.files.get_mut(&id).expect("checked above");
        stored.deleted_at = Some(Utc::now());
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn restore(&self, id: Uuid) -> AppResult<File> {
        let mut state = self.lock();
        let file = state
            .files
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("File {id} not found")))?;
        if !file.is_trashed() {
            return Err(AppError::invalid_operation(format!(
                "File {id} is not in the trash"
            )));
        }

        state.release(file.owner_id, file.size_bytes)?;
        let stored = state.files.get_mut(&id).expect("checked above");
        stored.deleted_at = None;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn purge(&self, id: Uuid) -> AppResult<()> {
        let mut state = self.lock();
        let file = state
            .files
            .remove(&id)
            .ok_or_else(|| AppError::not_found(format!("File {id} not found")))?;
        state.versions.retain(|v| v.file_id != id);
        if !file.is_trashed() {
            state.release(file.owner_id, -file.size_bytes)?;
        }
        Ok(())
    }

    async fn list_trashed(&self, owner_id: Uuid) -> AppResult<Vec<File>> {
        let mut files: Vec<File> = self
            .lock()
            .files
            .values()
            .filter(|f| f.owner_id == owner_id && f.deleted_at.is_some())
            .cloned()
            .collect();
        files.sort_by(|a, b| b.deleted_at.cmp(&a.deleted_at));
        Ok(files)
    }

    async fn list_trashed_before(&self, cutoff: DateTime<Utc>) -> AppResult<Vec<File>> {
        Ok(self
            .lock()
            .files
            .values()
            .filter(|f| f.deleted_at.is_some_and(|at| at < cutoff))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl FolderStore for MemoryMetadataStore {
    async fn find_folder(&self, id: Uuid) -> AppResult<Option<Folder>> {
        Ok(self.lock().folders.get(&id).cloned())
    }

    async fn find_live_by_name(
        &self,
        owner_id: Uuid,
        parent_id: Option<Uuid>,
        name: &str,
    ) -> AppResult<Option<Folder>> {
        Ok(self
            .lock()
            .folders
            .values()
            .find(|f| {
                f.owner_id == owner_id
                    && f.parent_id == parent_id
                    && f.name == name
                    && f.deleted_at.is_none()
            })
            .cloned())
    }

    async fn list_live_children(
        &self,
        owner_id: Uuid,
        parent_id: Option<Uuid>,
    ) -> AppResult<Vec<Folder>> {
        let mut folders: Vec<Folder> = self
            .lock()
            .folders
            .values()
            .filter(|f| {
                f.owner_id == owner_id && f.parent_id == parent_id && f.deleted_at.is_none()
            })
            .cloned()
            .collect();
        folders.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(folders)
    }

    async fn insert(&self, data: &CreateFolder) -> AppResult<Folder> {
        let mut state = self.lock();

        let taken = state.folders.values().any(|f| {
            f.owner_id == data.owner_id
                && f.parent_id == data.parent_id
                && f.name == data.name
                && f.deleted_at.is_none()
        });
        if taken {
            return Err(AppError::conflict(format!(
                "A folder named '{}' already exists here",
                data.name
            )));
        }

        let now = Utc::now();
        let folder = Folder {
            id: data.id,
            owner_id: data.owner_id,
            parent_id: data.parent_id,
            name: data.name.clone(),
            path: data.path.clone(),
            depth: data.depth,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };
        state.folders.insert(folder.id, folder.clone());
        Ok(folder)
    }

    async fn rename(&self, id: Uuid, name: &str) -> AppResult<Folder> {
        let mut state = self.lock();
        let folder = state
            .folders
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found(format!("Folder {id} not found")))?;
        folder.name = name.to_string();
        folder.updated_at = Utc::now();
        Ok(folder.clone())
    }

    async fn move_with_cascade(
        &self,
        id: Uuid,
        new_parent_id: Option<Uuid>,
        new_path: &str,
        new_depth: i32,
    ) -> AppResult<Folder> {
        let mut state = self.lock();
        let folder = state
            .folders
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("Folder {id} not found")))?;

        let old_prefix = format!("{}/", folder.path);
        let depth_delta = new_depth - folder.depth;
        let now = Utc::now();

        for child in state.folders.values_mut() {
            if let Some(suffix) = child.path.strip_prefix(&old_prefix) {
                child.path = format!("{new_path}/{suffix}");
                child.depth += depth_delta;
                child.updated_at = now;
            }
        }

        let moved = state.folders.get_mut(&id).expect("checked above");
        moved.parent_id = new_parent_id;
        moved.path = new_path.to_string();
        moved.depth = new_depth;
        moved.updated_at = now;
        Ok(moved.clone())
    }

    async fn find_descendants(&self, id: Uuid) -> AppResult<Vec<Folder>> {
        let state = self.lock();
        let folder = state
            .folders
            .get(&id)
            .ok_or_else(|| AppError::not_found(format!("Folder {id} not found")))?;
        let prefix = format!("{}/", folder.path);
        let mut descendants: Vec<Folder> = state
            .folders
            .values()
            .filter(|f| f.path.starts_with(&prefix))
            .cloned()
            .collect();
        descendants.sort_by(|a, b| a.depth.cmp(&b.depth).then_with(|| a.name.cmp(&b.name)));
        Ok(descendants)
    }

    async fn soft_delete_cascade(&self, id: Uuid) -> AppResult<Folder> {
        let mut state = self.lock();
        let folder = state
            .folders
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("Folder {id} not found")))?;
        if folder.is_trashed() {
            return Err(AppError::invalid_operation(format!(
                "Folder {id} is already in the trash"
            )));
        }

        // One shared timestamp for the whole cascade, so the restore can
        // tell these apart from items trashed independently.
        let now = Utc::now();
        let subtree = state.subtree_ids(&folder);

        for fid in &subtree {
            let f = state.folders.get_mut(fid).expect("id from subtree walk");
            if f.deleted_at.is_none() {
                f.deleted_at = Some(now);
                f.updated_at = now;
            }
        }

        let mut freed = 0i64;
        for file in state.files.values_mut() {
            if file.deleted_at.is_none()
                && file.folder_id.is_some_and(|fid| subtree.contains(&fid))
            {
                file.deleted_at = Some(now);
                file.updated_at = now;
                freed += file.size_bytes;
            }
        }

        state.release(folder.owner_id, -freed)?;
        Ok(state.folders[&id].clone())
    }

    async fn restore_cascade(&self, id: Uuid) -> AppResult<Folder> {
        let mut state = self.lock();
        let folder = state
            .folders
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("Folder {id} not found")))?;
        let Some(marker) = folder.deleted_at else {
            return Err(AppError::invalid_operation(format!(
                "Folder {id} is not in the trash"
            )));
        };

        let now = Utc::now();
        let subtree = state.subtree_ids(&folder);

        for fid in &subtree {
            let f = state.folders.get_mut(fid).expect("id from subtree walk");
            if f.deleted_at.is_some_and(|at| at >= marker) {
                f.deleted_at = None;
                f.updated_at = now;
            }
        }

        let mut restored_bytes = 0i64;
        for file in state.files.values_mut() {
            if file.deleted_at.is_some_and(|at| at >= marker)
                && file.folder_id.is_some_and(|fid| subtree.contains(&fid))
            {
                file.deleted_at = None;
                file.updated_at = now;
                restored_bytes += file.size_bytes;
            }
        }

        state.release(folder.owner_id, restored_bytes)?;
        Ok(state.folders[&id].clone())
    }

    async fn purge_subtree(&self, id: Uuid) -> AppResult<(u64, u64)> {
        let mut state = self.lock();
        let folder = state
            .folders
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("Folder {id} not found")))?;

        let subtree = state.subtree_ids(&folder);

        let doomed_files: Vec<Uuid> = state
            .files
            .values()
            .filter(|f| f.folder_id.is_some_and(|fid| subtree.contains(&fid)))
            .map(|f| f.id)
            .collect();

        let mut live_bytes = 0i64;
        for fid in &doomed_files {
            let file = state.files.remove(fid).expect("id from files walk");
            if !file.is_trashed() {
                live_bytes += file.size_bytes;
            }
            state.versions.retain(|v| v.file_id != *fid);
        }
        for fid in &subtree {
            state.folders.remove(fid);
        }

        if live_bytes > 0 {
            state.release(folder.owner_id, -live_bytes)?;
        }
        Ok((doomed_files.len() as u64, subtree.len() as u64))
    }

    async fn list_trashed(&self, owner_id: Uuid) -> AppResult<Vec<Folder>> {
        let mut folders: Vec<Folder> = self
            .lock()
            .folders
            .values()
            .filter(|f| f.owner_id == owner_id && f.deleted_at.is_some())
            .cloned()
            .collect();
        folders.sort_by(|a, b| b.deleted_at.cmp(&a.deleted_at));
        Ok(folders)
    }

    async fn list_trashed_before(&self, cutoff: DateTime<Utc>) -> AppResult<Vec<Folder>> {
        Ok(self
            .lock()
            .folders
            .values()
            .filter(|f| f.deleted_at.is_some_and(|at| at < cutoff))
            .cloned()
            .collect())
    }
}
