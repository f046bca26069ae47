//! PostgreSQL user store.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use vaultdrive_core::error::{AppError, ErrorKind};
use vaultdrive_core::result::AppResult;
use vaultdrive_entity::User;

use crate::store::UserStore;

/// User rows and the quota ledger, backed by PostgreSQL.
#[derive(Debug, Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    /// Create a new user store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create_user(&self, quota_bytes: i64) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            "INSERT INTO users (quota_bytes) VALUES ($1) RETURNING *",
        )
        .bind(quota_bytes)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to create user", e))
    }

    async fn find_user(&self, id: Uuid) -> AppResult<Option<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find user", e))
    }

    async fn set_quota(&self, id: Uuid, quota_bytes: i64) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            "UPDATE users SET quota_bytes = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(quota_bytes)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to set quota", e))?
        .ok_or_else(|| AppError::not_found(format!("User {id} not found")))
    }

    async fn adjust_used_bytes(&self, id: Uuid, delta: i64) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            "UPDATE users SET used_bytes = GREATEST(used_bytes + $2, 0), updated_at = NOW() \
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(delta)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to adjust usage", e))?
        .ok_or_else(|| AppError::not_found(format!("User {id} not found")))
    }

    async fn recalculate_used_bytes(&self, id: Uuid) -> AppResult<i64> {
        sqlx::query_scalar::<_, i64>(
            "UPDATE users SET used_bytes = ( \
                 SELECT COALESCE(SUM(size_bytes), 0) FROM files \
                 WHERE owner_id = $1 AND deleted_at IS NULL \
             ), updated_at = NOW() \
             WHERE id = $1 RETURNING used_bytes",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to recalculate usage", e))?
        .ok_or_else(|| AppError::not_found(format!("User {id} not found")))
    }
}
