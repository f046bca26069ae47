//! Shared test helpers for service integration tests.

use std::path::PathBuf;
use std::sync::Arc;

use vaultdrive_core::config::TrashConfig;
use vaultdrive_core::traits::storage::StorageBackend;
use vaultdrive_database::MemoryMetadataStore;
use vaultdrive_entity::User;
use vaultdrive_service::{FileService, FolderService, QuotaService, TrashService};
use vaultdrive_storage::LocalStorageBackend;

/// Everything a service test needs: services wired to an in-memory
/// metadata store and a temp-dir local storage backend.
pub struct TestEnv {
    pub store: MemoryMetadataStore,
    pub backend: Arc<dyn StorageBackend>,
    pub quota: QuotaService,
    pub files: FileService,
    pub folders: FolderService,
    pub trash: TrashService,
    /// Storage root, for asserting on physical objects.
    pub storage_root: PathBuf,
    _dir: tempfile::TempDir,
}

impl TestEnv {
    pub async fn new() -> Self {
        Self::with_retention(&TrashConfig::default()).await
    }

    pub async fn with_retention(trash_config: &TrashConfig) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let storage_root = dir.path().to_path_buf();

        let backend: Arc<dyn StorageBackend> = Arc::new(
            LocalStorageBackend::new(storage_root.to_str().unwrap())
                .await
                .expect("Failed to create local backend"),
        );

        let store = MemoryMetadataStore::new();
        let users = Arc::new(store.clone());
        let files = Arc::new(store.clone());
        let folders = Arc::new(store.clone());

        Self {
            quota: QuotaService::new(users),
            files: FileService::new(files.clone(), folders.clone(), backend.clone()),
            folders: FolderService::new(folders.clone(), files.clone()),
            trash: TrashService::new(files, folders, backend.clone(), trash_config),
            store,
            backend,
            storage_root,
            _dir: dir,
        }
    }

    /// Create a user with the given quota.
    pub async fn user(&self, quota_bytes: i64) -> User {
        self.quota
            .create_user_with_quota(quota_bytes)
            .await
            .expect("Failed to create user")
    }

    /// True when no metadata row remains for the file at all.
    #[allow(dead_code)]
    pub async fn store_has_no_file(&self, id: uuid::Uuid) -> bool {
        use vaultdrive_database::FileStore;
        self.store
            .find_file(id)
            .await
            .expect("Failed to query store")
            .is_none()
    }

    /// Number of physical objects currently in the storage root.
    pub fn object_count(&self) -> usize {
        std::fs::read_dir(&self.storage_root)
            .expect("Failed to read storage root")
            .filter(|e| e.as_ref().unwrap().file_type().unwrap().is_file())
            .count()
    }
}
