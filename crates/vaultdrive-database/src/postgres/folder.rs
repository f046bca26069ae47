//! PostgreSQL folder store.
//!
//! Subtree queries go through the materialized id path: a folder's
//! descendants are exactly the rows whose path starts with the folder's
//! path plus `/`. Moves rewrite that prefix for the whole subtree in one
//! statement, trash cascades stamp one shared timestamp, and restores use
//! that timestamp to leave independently trashed items in the trash.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use vaultdrive_core::error::{AppError, ErrorKind};
use vaultdrive_core::result::AppResult;
use vaultdrive_entity::{CreateFolder, Folder};

use crate::postgres::file::release_quota;
use crate::store::FolderStore;

/// Folder hierarchy, backed by PostgreSQL.
#[derive(Debug, Clone)]
pub struct PgFolderStore {
    pool: PgPool,
}

impl PgFolderStore {
    /// Create a new folder store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FolderStore for PgFolderStore {
    async fn find_folder(&self, id: Uuid) -> AppResult<Option<Folder>> {
        sqlx::query_as::<_, Folder>("SELECT * FROM folders WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find folder", e))
    }

    async fn find_live_by_name(
        &self,
        owner_id: Uuid,
        parent_id: Option<Uuid>,
        name: &str,
    ) -> AppResult<Option<Folder>> {
        sqlx::query_as::<_, Folder>(
            "SELECT * FROM folders \
             WHERE owner_id = $1 AND parent_id IS NOT DISTINCT FROM $2 \
               AND name = $3 AND deleted_at IS NULL",
        )
        .bind(owner_id)
        .bind(parent_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to find folder by name", e)
        })
    }

    async fn list_live_children(
        &self,
        owner_id: Uuid,
        parent_id: Option<Uuid>,
    ) -> AppResult<Vec<Folder>> {
        sqlx::query_as::<_, Folder>(
            "SELECT * FROM folders \
             WHERE owner_id = $1 AND parent_id IS NOT DISTINCT FROM $2 AND deleted_at IS NULL \
             ORDER BY name ASC",
        )
        .bind(owner_id)
        .bind(parent_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list folders", e))
    }

    async fn insert(&self, data: &CreateFolder) -> AppResult<Folder> {
        sqlx::query_as::<_, Folder>(
            "INSERT INTO folders (id, owner_id, parent_id, name, path, depth) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING *",
        )
        .bind(data.id)
        .bind(data.owner_id)
        .bind(data.parent_id)
        .bind(&data.name)
        .bind(&data.path)
        .bind(data.depth)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            // Unique index on live sibling names backstops the pre-check
            // against a concurrent insert of the same name.
            if e.as_database_error().is_some_and(|d| d.is_unique_violation()) {
                AppError::conflict(format!(
                    "A folder named '{}' already exists here",
                    data.name
                ))
            } else {
                AppError::with_source(ErrorKind::Database, "Failed to create folder", e)
            }
        })
    }

    async fn rename(&self, id: Uuid, name: &str) -> AppResult<Folder> {
        sqlx::query_as::<_, Folder>(
            "UPDATE folders SET name = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to rename folder", e))?
        .ok_or_else(|| AppError::not_found(format!("Folder {id} not found")))
    }

    async fn move_with_cascade(
        &self,
        id: Uuid,
        new_parent_id: Option<Uuid>,
        new_path: &str,
        new_depth: i32,
    ) -> AppResult<Folder> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to begin transaction", e)
        })?;

        let folder = sqlx::query_as::<_, Folder>("SELECT * FROM folders WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to lock folder", e))?
            .ok_or_else(|| AppError::not_found(format!("Folder {id} not found")))?;

        let depth_delta = new_depth - folder.depth;

        let moved = sqlx::query_as::<_, Folder>(
            "UPDATE folders SET parent_id = $2, path = $3, depth = $4, updated_at = NOW() \
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(new_parent_id)
        .bind(new_path)
        .bind(new_depth)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to move folder", e))?;

        // Prefix rewrite for every descendant, one statement.
        sqlx::query(
            "UPDATE folders \
             SET path = $2 || substring(path FROM char_length($1) + 1), \
                 depth = depth + $3, updated_at = NOW() \
             WHERE path LIKE $1 || '/%'",
        )
        .bind(&folder.path)
        .bind(new_path)
        .bind(depth_delta)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to update descendant paths", e)
        })?;

        tx.commit().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to commit transaction", e)
        })?;
        Ok(moved)
    }

    async fn find_descendants(&self, id: Uuid) -> AppResult<Vec<Folder>> {
        let folder = self
            .find_folder(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Folder {id} not found")))?;

        sqlx::query_as::<_, Folder>(
            "SELECT * FROM folders WHERE path LIKE $1 || '/%' ORDER BY depth ASC, name ASC",
        )
        .bind(&folder.path)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to list descendants", e)
        })
    }

    async fn soft_delete_cascade(&self, id: Uuid) -> AppResult<Folder> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to begin transaction", e)
        })?;

        let folder = sqlx::query_as::<_, Folder>("SELECT * FROM folders WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to lock folder", e))?
            .ok_or_else(|| AppError::not_found(format!("Folder {id} not found")))?;

        if folder.is_trashed() {
            return Err(AppError::invalid_operation(format!(
                "Folder {id} is already in the trash"
            )));
        }

        // NOW() is fixed for the transaction, so the folder, its descendant
        // folders, and the contained files all get the same trash timestamp.
        sqlx::query(
            "UPDATE folders SET deleted_at = NOW(), updated_at = NOW() \
             WHERE (id = $1 OR path LIKE $2 || '/%') AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(&folder.path)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to trash folders", e))?;

        let freed_bytes: i64 = sqlx::query_scalar(
            "WITH trashed AS ( \
                 UPDATE files SET deleted_at = NOW(), updated_at = NOW() \
                 WHERE deleted_at IS NULL AND folder_id IN ( \
                     SELECT id FROM folders WHERE id = $1 OR path LIKE $2 || '/%' \
                 ) RETURNING size_bytes \
             ) SELECT COALESCE(SUM(size_bytes), 0) FROM trashed",
        )
        .bind(id)
        .bind(&folder.path)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to trash files", e))?;

        release_quota(&mut *tx, folder.owner_id, -freed_bytes).await?;

        let trashed = sqlx::query_as::<_, Folder>("SELECT * FROM folders WHERE id = $1")
            .bind(id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to reload folder", e))?;

        tx.commit().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to commit transaction", e)
        })?;
        Ok(trashed)
    }

    async fn restore_cascade(&self, id: Uuid) -> AppResult<Folder> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to begin transaction", e)
        })?;

        let folder = sqlx::query_as::<_, Folder>("SELECT * FROM folders WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to lock folder", e))?
            .ok_or_else(|| AppError::not_found(format!("Folder {id} not found")))?;

        let Some(marker) = folder.deleted_at else {
            return Err(AppError::invalid_operation(format!(
                "Folder {id} is not in the trash"
            )));
        };

        // Items trashed at or after the folder itself came along with the
        // cascade; anything trashed earlier was deleted independently and
        // stays in the trash.
        sqlx::query(
            "UPDATE folders SET deleted_at = NULL, updated_at = NOW() \
             WHERE (id = $1 OR path LIKE $2 || '/%') AND deleted_at >= $3",
        )
        .bind(id)
        .bind(&folder.path)
        .bind(marker)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to restore folders", e))?;

        let restored_bytes: i64 = sqlx::query_scalar(
            "WITH restored AS ( \
                 UPDATE files SET deleted_at = NULL, updated_at = NOW() \
                 WHERE deleted_at >= $3 AND folder_id IN ( \
                     SELECT id FROM folders WHERE id = $1 OR path LIKE $2 || '/%' \
                 ) RETURNING size_bytes \
             ) SELECT COALESCE(SUM(size_bytes), 0) FROM restored",
        )
        .bind(id)
        .bind(&folder.path)
        .bind(marker)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to restore files", e))?;

        release_quota(&mut *tx, folder.owner_id, restored_bytes).await?;

        let restored = sqlx::query_as::<_, Folder>("SELECT * FROM folders WHERE id = $1")
            .bind(id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to reload folder", e))?;

        tx.commit().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to commit transaction", e)
        })?;
        Ok(restored)
    }

    async fn purge_subtree(&self, id: Uuid) -> AppResult<(u64, u64)> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to begin transaction", e)
        })?;

        let folder = sqlx::query_as::<_, Folder>("SELECT * FROM folders WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to lock folder", e))?
            .ok_or_else(|| AppError::not_found(format!("Folder {id} not found")))?;

        let subtree_ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT id FROM folders WHERE id = $1 OR path LIKE $2 || '/%'",
        )
        .bind(id)
        .bind(&folder.path)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to collect subtree", e)
        })?;

        // Only live files still count against the ledger; trashed ones were
        // released when they entered the trash.
        let live_bytes: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(size_bytes), 0) FROM files \
             WHERE deleted_at IS NULL AND folder_id = ANY($1)",
        )
        .bind(&subtree_ids)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to sum live bytes", e))?;

        sqlx::query(
            "DELETE FROM file_versions WHERE file_id IN ( \
                 SELECT id FROM files WHERE folder_id = ANY($1) \
             )",
        )
        .bind(&subtree_ids)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to delete versions", e)
        })?;

        let files_removed = sqlx::query("DELETE FROM files WHERE folder_id = ANY($1)")
            .bind(&subtree_ids)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to delete files", e))?
            .rows_affected();

        let folders_removed = sqlx::query(
            "DELETE FROM folders WHERE id IN ( \
                 SELECT id FROM folders WHERE id = $1 OR path LIKE $2 || '/%' \
             )",
        )
        .bind(id)
        .bind(&folder.path)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to delete folders", e))?
        .rows_affected();

        if live_bytes > 0 {
            release_quota(&mut *tx, folder.owner_id, -live_bytes).await?;
        }

        tx.commit().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to commit transaction", e)
        })?;
        Ok((files_removed, folders_removed))
    }

    async fn list_trashed(&self, owner_id: Uuid) -> AppResult<Vec<Folder>> {
        sqlx::query_as::<_, Folder>(
            "SELECT * FROM folders WHERE owner_id = $1 AND deleted_at IS NOT NULL \
             ORDER BY deleted_at DESC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to list trashed folders", e)
        })
    }

    async fn list_trashed_before(&self, cutoff: DateTime<Utc>) -> AppResult<Vec<Folder>> {
        sqlx::query_as::<_, Folder>(
            "SELECT * FROM folders WHERE deleted_at IS NOT NULL AND deleted_at < $1",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to list expired folders", e)
        })
    }
}
