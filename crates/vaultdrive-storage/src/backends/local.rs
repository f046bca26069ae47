//! Local filesystem storage backend.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::StreamExt;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio_util::io::ReaderStream;
use tracing::debug;

use vaultdrive_core::error::{AppError, ErrorKind};
use vaultdrive_core::result::AppResult;
use vaultdrive_core::traits::storage::{
    ByteRange, ByteStream, SaveRequest, StorageBackend, StoredObject,
};

use super::object_key;

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorageBackend {
    /// Root directory for all stored objects.
    root: PathBuf,
}

impl LocalStorageBackend {
    /// Create a new local backend rooted at the given path.
    pub async fn new(root_path: &str) -> AppResult<Self> {
        let root = PathBuf::from(root_path);
        fs::create_dir_all(&root).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to create storage root: {}", root.display()),
                e,
            )
        })?;
        Ok(Self { root })
    }

    /// Resolve a storage key to an absolute path within the root.
    fn resolve(&self, storage_key: &str) -> PathBuf {
        let clean = storage_key.trim_start_matches('/');
        self.root.join(clean)
    }

    /// Ensure the parent directory of a path exists.
    async fn ensure_parent(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to create parent directory: {}", parent.display()),
                    e,
                )
            })?;
        }
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for LocalStorageBackend {
    fn backend_type(&self) -> &str {
        "local"
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(self.root.exists() && self.root.is_dir())
    }

    async fn save(&self, mut data: ByteStream, req: &SaveRequest) -> AppResult<StoredObject> {
        let storage_key = object_key(&req.name);
        let full_path = self.resolve(&storage_key);
        self.ensure_parent(&full_path).await?;

        let mut file = fs::File::create(&full_path).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to create object: {storage_key}"),
                e,
            )
        })?;

        let mut total_bytes = 0i64;
        while let Some(chunk) = data.next().await {
            let chunk = chunk
                .map_err(|e| AppError::with_source(ErrorKind::Storage, "Stream read error", e))?;
            total_bytes += chunk.len() as i64;
            file.write_all(&chunk).await.map_err(|e| {
                AppError::with_source(ErrorKind::Storage, "Failed to write chunk", e)
            })?;
        }

        file.flush()
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Storage, "Failed to flush object", e))?;

        debug!(storage_key, bytes = total_bytes, "Saved object");
        Ok(StoredObject {
            storage_key,
            size_bytes: total_bytes,
        })
    }

    async fn read_bytes(&self, storage_key: &str) -> AppResult<Bytes> {
        let full_path = self.resolve(storage_key);
        let data = fs::read(&full_path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::not_found(format!("Object not found: {storage_key}"))
            } else {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to read object: {storage_key}"),
                    e,
                )
            }
        })?;
        Ok(Bytes::from(data))
    }

    async fn read_stream(
        &self,
        storage_key: &str,
        range: Option<ByteRange>,
    ) -> AppResult<ByteStream> {
        let full_path = self.resolve(storage_key);
        let mut file = fs::File::open(&full_path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::not_found(format!("Object not found: {storage_key}"))
            } else {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to open object: {storage_key}"),
                    e,
                )
            }
        })?;

        match range {
            Some(range) => {
                file.seek(std::io::SeekFrom::Start(range.start))
                    .await
                    .map_err(|e| {
                        AppError::with_source(ErrorKind::Storage, "Failed to seek object", e)
                    })?;
                match range.len() {
                    Some(len) => {
                        let limited = file.take(len);
                        Ok(Box::pin(ReaderStream::new(limited)))
                    }
                    None => Ok(Box::pin(ReaderStream::new(file))),
                }
            }
            None => Ok(Box::pin(ReaderStream::new(file))),
        }
    }

    async fn exists(&self, storage_key: &str) -> AppResult<bool> {
        Ok(self.resolve(storage_key).exists())
    }

    async fn delete(&self, storage_key: &str) -> AppResult<()> {
        let full_path = self.resolve(storage_key);
        if full_path.exists() {
            fs::remove_file(&full_path).await.map_err(|e| {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to delete object: {storage_key}"),
                    e,
                )
            })?;
            debug!(storage_key, "Deleted object");
        }
        Ok(())
    }

    fn public_url(&self, _storage_key: &str) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vaultdrive_core::traits::storage::stream_from_bytes;

    async fn backend() -> (tempfile::TempDir, LocalStorageBackend) {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalStorageBackend::new(dir.path().to_str().unwrap())
            .await
            .unwrap();
        (dir, backend)
    }

    fn request(name: &str) -> SaveRequest {
        SaveRequest {
            name: name.to_string(),
            mime_type: None,
        }
    }

    #[tokio::test]
    async fn test_save_read_delete() {
        let (_dir, backend) = backend().await;

        let data = Bytes::from("hello world");
        let stored = backend
            .save(stream_from_bytes(data.clone()), &request("hello.txt"))
            .await
            .unwrap();
        assert_eq!(stored.size_bytes, 11);
        assert!(stored.storage_key.ends_with(".txt"));

        assert!(backend.exists(&stored.storage_key).await.unwrap());
        let read_back = backend.read_bytes(&stored.storage_key).await.unwrap();
        assert_eq!(read_back, data);

        backend.delete(&stored.storage_key).await.unwrap();
        assert!(!backend.exists(&stored.storage_key).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_missing_key_is_ok() {
        let (_dir, backend) = backend().await;
        backend.delete("never-existed.bin").await.unwrap();
    }

    #[tokio::test]
    async fn test_read_missing_key_is_not_found() {
        let (_dir, backend) = backend().await;
        let err = backend.read_bytes("missing.bin").await.unwrap_err();
        assert!(err.is_not_found());

        let err = backend.read_stream("missing.bin", None).await.err().unwrap();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_range_read() {
        let (_dir, backend) = backend().await;

        let stored = backend
            .save(
                stream_from_bytes(Bytes::from("0123456789")),
                &request("digits.txt"),
            )
            .await
            .unwrap();

        let mut stream = backend
            .read_stream(
                &stored.storage_key,
                Some(ByteRange {
                    start: 2,
                    end: Some(5),
                }),
            )
            .await
            .unwrap();

        let mut collected = Vec::new();
        while let Some(chunk) = stream.next().await {
            collected.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(collected, b"2345");

        // Open-ended range reads to the end of the object.
        let mut stream = backend
            .read_stream(
                &stored.storage_key,
                Some(ByteRange {
                    start: 7,
                    end: None,
                }),
            )
            .await
            .unwrap();
        let mut collected = Vec::new();
        while let Some(chunk) = stream.next().await {
            collected.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(collected, b"789");
    }
}
