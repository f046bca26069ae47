//! Backend selection from configuration.

use std::sync::Arc;

use tracing::info;

use vaultdrive_core::config::storage::StorageConfig;
use vaultdrive_core::error::AppError;
use vaultdrive_core::result::AppResult;
use vaultdrive_core::traits::storage::StorageBackend;

use crate::backends::local::LocalStorageBackend;

/// Build the configured storage backend. Called once at process startup;
/// everything downstream holds the backend as `Arc<dyn StorageBackend>`.
pub async fn create_backend(config: &StorageConfig) -> AppResult<Arc<dyn StorageBackend>> {
    info!(backend = %config.backend, "Creating storage backend");

    match config.backend.as_str() {
        "local" => {
            let backend = LocalStorageBackend::new(&config.local.root_path).await?;
            Ok(Arc::new(backend))
        }
        #[cfg(feature = "s3")]
        "s3" => {
            let backend = crate::backends::s3::S3StorageBackend::new(&config.s3).await?;
            Ok(Arc::new(backend))
        }
        #[cfg(not(feature = "s3"))]
        "s3" => Err(AppError::configuration(
            "Storage backend 's3' requires the `s3` feature",
        )),
        #[cfg(feature = "drive")]
        "drive" => {
            let backend = crate::backends::drive::RemoteDriveBackend::new(&config.drive)?;
            Ok(Arc::new(backend))
        }
        #[cfg(not(feature = "drive"))]
        "drive" => Err(AppError::configuration(
            "Storage backend 'drive' requires the `drive` feature",
        )),
        other => Err(AppError::configuration(format!(
            "Unknown storage backend: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vaultdrive_core::config::storage::LocalBackendConfig;

    #[tokio::test]
    async fn test_create_local_backend() {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig {
            backend: "local".to_string(),
            local: LocalBackendConfig {
                root_path: dir.path().to_str().unwrap().to_string(),
            },
            ..StorageConfig::default()
        };

        let backend = create_backend(&config).await.unwrap();
        assert_eq!(backend.backend_type(), "local");
        assert!(backend.health_check().await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_backend_is_rejected() {
        let config = StorageConfig {
            backend: "ftp".to_string(),
            ..StorageConfig::default()
        };
        let err = create_backend(&config).await.unwrap_err();
        assert_eq!(
            err.kind,
            vaultdrive_core::error::ErrorKind::Configuration
        );
    }
}
