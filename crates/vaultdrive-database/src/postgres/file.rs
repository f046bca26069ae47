//! PostgreSQL file store.
//!
//! Every multi-row mutation (insert with quota reservation, content
//! replacement, version promotion, trash transitions, purge) runs in a
//! single transaction so a failure partway through leaves no partial
//! state behind.

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use vaultdrive_core::error::{AppError, ErrorKind};
use vaultdrive_core::result::AppResult;
use vaultdrive_entity::{CreateFile, File, FileVersion};

use crate::store::{FileStore, NewFileContent};

/// File rows and version history, backed by PostgreSQL.
#[derive(Debug, Clone)]
pub struct PgFileStore {
    pool: PgPool,
}

impl PgFileStore {
    /// Create a new file store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Reserve `delta` bytes against a user's quota with a guarded update.
///
/// Zero rows affected means the reservation does not fit (or the user is
/// gone); the caller's transaction rolls back on the returned error.
pub(crate) async fn reserve_quota(
    conn: &mut PgConnection,
    owner_id: Uuid,
    delta: i64,
) -> AppResult<()> {
    let rows = sqlx::query(
        "UPDATE users SET used_bytes = GREATEST(used_bytes + $2, 0), updated_at = NOW() \
         WHERE id = $1 AND used_bytes + $2 <= quota_bytes",
    )
    .bind(owner_id)
    .bind(delta)
    .execute(&mut *conn)
    .await
    .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to reserve quota", e))?
    .rows_affected();

    if rows == 1 {
        return Ok(());
    }

    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
        .bind(owner_id)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to check user", e))?;

    if exists {
        Err(AppError::quota_exceeded(format!(
            "Storage quota exceeded for user {owner_id}"
        )))
    } else {
        Err(AppError::not_found(format!("User {owner_id} not found")))
    }
}

/// Adjust a user's used-bytes counter without a quota guard (clamped at
/// zero). Used for releases and trash re-accounting.
pub(crate) async fn release_quota(
    conn: &mut PgConnection,
    owner_id: Uuid,
    delta: i64,
) -> AppResult<()> {
    sqlx::query(
        "UPDATE users SET used_bytes = GREATEST(used_bytes + $2, 0), updated_at = NOW() \
         WHERE id = $1",
    )
    .bind(owner_id)
    .bind(delta)
    .execute(conn)
    .await
    .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to adjust usage", e))?;
    Ok(())
}

#[async_trait]
impl FileStore for PgFileStore {
    async fn find_file(&self, id: Uuid) -> AppResult<Option<File>> {
        sqlx::query_as::<_, File>("SELECT * FROM files WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find file", e))
    }

    async fn find_live_by_name(
        &self,
        owner_id: Uuid,
        folder_id: Option<Uuid>,
        name: &str,
    ) -> AppResult<Option<File>> {
        sqlx::query_as::<_, File>(
            "SELECT * FROM files \
             WHERE owner_id = $1 AND folder_id IS NOT DISTINCT FROM $2 \
               AND name = $3 AND deleted_at IS NULL",
        )
        .bind(owner_id)
        .bind(folder_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find file by name", e))
    }

    async fn list_live(&self, owner_id: Uuid, folder_id: Option<Uuid>) -> AppResult<Vec<File>> {
        sqlx::query_as::<_, File>(
            "SELECT * FROM files \
             WHERE owner_id = $1 AND folder_id IS NOT DISTINCT FROM $2 AND deleted_at IS NULL \
             ORDER BY name ASC",
        )
        .bind(owner_id)
        .bind(folder_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list files", e))
    }

    async fn list_in_folders(&self, folder_ids: &[Uuid]) -> AppResult<Vec<File>> {
        sqlx::query_as::<_, File>("SELECT * FROM files WHERE folder_id = ANY($1)")
            .bind(folder_ids)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to list folder files", e)
            })
    }

    async fn insert_with_quota(&self, data: &CreateFile) -> AppResult<File> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to begin transaction", e)
        })?;

        reserve_quota(&mut *tx, data.owner_id, data.size_bytes).await?;

        let file = sqlx::query_as::<_, File>(
            "INSERT INTO files (owner_id, folder_id, name, mime_type, size_bytes, storage_key) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING *",
        )
        .bind(data.owner_id)
        .bind(data.folder_id)
        .bind(&data.name)
        .bind(&data.mime_type)
        .bind(data.size_bytes)
        .bind(&data.storage_key)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            // The partial unique index on live sibling names catches the
            // race where two inserts pass the pre-check concurrently.
            if e.as_database_error().is_some_and(|d| d.is_unique_violation()) {
                AppError::conflict(format!(
                    "An item named '{}' already exists in this folder",
                    data.name
                ))
            } else {
                AppError::with_source(ErrorKind::Database, "Failed to insert file", e)
            }
        })?;

        tx.commit().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to commit transaction", e)
        })?;
        Ok(file)
    }

    async fn replace_content(&self, id: Uuid, content: &NewFileContent) -> AppResult<File> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to begin transaction", e)
        })?;

        let file = sqlx::query_as::<_, File>("SELECT * FROM files WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to lock file", e))?
            .ok_or_else(|| AppError::not_found(format!("File {id} not found")))?;

        if file.is_trashed() {
            return Err(AppError::invalid_operation(
                "Cannot overwrite a file that is in the trash",
            ));
        }

        // Archive the outgoing content under the number it was current as.
        sqlx::query(
            "INSERT INTO file_versions (file_id, version_number, storage_key, size_bytes) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(file.id)
        .bind(file.current_version)
        .bind(&file.storage_key)
        .bind(file.size_bytes)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to archive version", e))?;

        reserve_quota(&mut *tx, file.owner_id, content.size_bytes - file.size_bytes).await?;

        let updated = sqlx::query_as::<_, File>(
            "UPDATE files SET storage_key = $2, size_bytes = $3, \
             mime_type = COALESCE($4, mime_type), \
             current_version = current_version + 1, updated_at = NOW() \
             WHERE id = $1 RETURNING *",
        )
        .bind(file.id)
        .bind(&content.storage_key)
        .bind(content.size_bytes)
        .bind(&content.mime_type)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to update file", e))?;

        tx.commit().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to commit transaction", e)
        })?;
        Ok(updated)
    }

    async fn promote_version(&self, id: Uuid, version_number: i32) -> AppResult<File> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to begin transaction", e)
        })?;

        let file = sqlx::query_as::<_, File>("SELECT * FROM files WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to lock file", e))?
            .ok_or_else(|| AppError::not_found(format!("File {id} not found")))?;

        if file.is_trashed() {
            return Err(AppError::invalid_operation(
                "Cannot restore a version of a file that is in the trash",
            ));
        }

        let version = sqlx::query_as::<_, FileVersion>(
            "SELECT * FROM file_versions WHERE file_id = $1 AND version_number = $2",
        )
        .bind(file.id)
        .bind(version_number)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find version", e))?
        .ok_or_else(|| {
            AppError::not_found(format!("Version {version_number} of file {id} not found"))
        })?;

        sqlx::query(
            "INSERT INTO file_versions (file_id, version_number, storage_key, size_bytes) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(file.id)
        .bind(file.current_version)
        .bind(&file.storage_key)
        .bind(file.size_bytes)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to archive version", e))?;

        reserve_quota(&mut *tx, file.owner_id, version.size_bytes - file.size_bytes).await?;

        let updated = sqlx::query_as::<_, File>(
            "UPDATE files SET storage_key = $2, size_bytes = $3, \
             current_version = current_version + 1, updated_at = NOW() \
             WHERE id = $1 RETURNING *",
        )
        .bind(file.id)
        .bind(&version.storage_key)
        .bind(version.size_bytes)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to update file", e))?;

        tx.commit().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to commit transaction", e)
        })?;
        Ok(updated)
    }

    async fn find_version(
        &self,
        file_id: Uuid,
        version_number: i32,
    ) -> AppResult<Option<FileVersion>> {
        sqlx::query_as::<_, FileVersion>(
            "SELECT * FROM file_versions WHERE file_id = $1 AND version_number = $2",
        )
        .bind(file_id)
        .bind(version_number)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find version", e))
    }

    async fn list_versions(&self, file_id: Uuid) -> AppResult<Vec<FileVersion>> {
        sqlx::query_as::<_, FileVersion>(
            "SELECT * FROM file_versions WHERE file_id = $1 ORDER BY version_number DESC",
        )
        .bind(file_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list versions", e))
    }

    async fn set_folder(&self, id: Uuid, folder_id: Option<Uuid>) -> AppResult<File> {
        sqlx::query_as::<_, File>(
            "UPDATE files SET folder_id = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(folder_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to move file", e))?
        .ok_or_else(|| AppError::not_found(format!("File {id} not found")))
    }

    async fn soft_delete(&self, id: Uuid) -> AppResult<File> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to begin transaction", e)
        })?;

        let trashed = sqlx::query_as::<_, File>(
            "UPDATE files SET deleted_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL RETURNING *",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to trash file", e))?;

        let Some(trashed) = trashed else {
            return match self.find_file(id).await? {
                Some(_) => Err(AppError::invalid_operation(format!(
                    "File {id} is already in the trash"
                ))),
                None => Err(AppError::not_found(format!("File {id} not found"))),
            };
        };

        release_quota(&mut *tx, trashed.owner_id, -trashed.size_bytes).await?;

        tx.commit().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to commit transaction", e)
        })?;
        Ok(trashed)
    }

    async fn restore(&self, id: Uuid) -> AppResult<File> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to begin transaction", e)
        })?;

        let restored = sqlx::query_as::<_, File>(
            "UPDATE files SET deleted_at = NULL, updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NOT NULL RETURNING *",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to restore file", e))?;

        let Some(restored) = restored else {
            return match self.find_file(id).await? {
                Some(_) => Err(AppError::invalid_operation(format!(
                    "File {id} is not in the trash"
                ))),
                None => Err(AppError::not_found(format!("File {id} not found"))),
            };
        };

        release_quota(&mut *tx, restored.owner_id, restored.size_bytes).await?;

        tx.commit().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to commit transaction", e)
        })?;
        Ok(restored)
    }

    async fn purge(&self, id: Uuid) -> AppResult<()> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to begin transaction", e)
        })?;

        let file = sqlx::query_as::<_, File>("SELECT * FROM files WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to lock file", e))?
            .ok_or_else(|| AppError::not_found(format!("File {id} not found")))?;

        sqlx::query("DELETE FROM file_versions WHERE file_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to delete versions", e)
            })?;

        sqlx::query("DELETE FROM files WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to delete file", e))?;

        if !file.is_trashed() {
            release_quota(&mut *tx, file.owner_id, -file.size_bytes).await?;
        }

        tx.commit().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to commit transaction", e)
        })?;
        Ok(())
    }

    async fn list_trashed(&self, owner_id: Uuid) -> AppResult<Vec<File>> {
        sqlx::query_as::<_, File>(
            "SELECT * FROM files WHERE owner_id = $1 AND deleted_at IS NOT NULL \
             ORDER BY deleted_at DESC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list trashed files", e))
    }

    async fn list_trashed_before(&self, cutoff: chrono::DateTime<chrono::Utc>) -> AppResult<Vec<File>> {
        sqlx::query_as::<_, File>(
            "SELECT * FROM files WHERE deleted_at IS NOT NULL AND deleted_at < $1",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list expired files", e))
    }
}
