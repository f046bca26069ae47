//! Quota ledger operations.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use vaultdrive_core::error::AppError;
use vaultdrive_core::result::AppResult;
use vaultdrive_database::UserStore;
use vaultdrive_entity::{QuotaUsage, User};

/// Default quota for new users: 1 GiB.
pub const DEFAULT_QUOTA_BYTES: i64 = 1024 * 1024 * 1024;

/// Manages user quota limits and the used-bytes ledger.
///
/// The ledger itself moves inside the store transactions of every file
/// mutation; this service only exposes reads, limit changes, and the
/// drift-correcting recalculation.
#[derive(Clone)]
pub struct QuotaService {
    users: Arc<dyn UserStore>,
}

impl QuotaService {
    /// Create a new quota service.
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    /// Create a user with the default quota.
    pub async fn create_user(&self) -> AppResult<User> {
        self.users.create_user(DEFAULT_QUOTA_BYTES).await
    }

    /// Create a user with an explicit quota.
    pub async fn create_user_with_quota(&self, quota_bytes: i64) -> AppResult<User> {
        if quota_bytes < 0 {
            return Err(AppError::validation("Quota cannot be negative"));
        }
        self.users.create_user(quota_bytes).await
    }

    /// Current usage snapshot for a user.
    pub async fn usage(&self, user_id: Uuid) -> AppResult<QuotaUsage> {
        let user = self
            .users
            .find_user(user_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("User {user_id} not found")))?;
        Ok(QuotaUsage::new(user.used_bytes, user.quota_bytes))
    }

    /// Change a user's quota limit. Lowering it below current usage is
    /// allowed; the user simply cannot add bytes until usage drops.
    pub async fn set_quota(&self, user_id: Uuid, quota_bytes: i64) -> AppResult<User> {
        if quota_bytes < 0 {
            return Err(AppError::validation("Quota cannot be negative"));
        }
        let user = self.users.set_quota(user_id, quota_bytes).await?;
        info!(user_id = %user_id, quota_bytes, "Quota updated");
        Ok(user)
    }

    /// Resum live file sizes and overwrite the ledger counter, correcting
    /// any accumulated drift. Returns the corrected value.
    pub async fn recalculate(&self, user_id: Uuid) -> AppResult<i64> {
        let used_bytes = self.users.recalculate_used_bytes(user_id).await?;
        info!(user_id = %user_id, used_bytes, "Usage recalculated");
        Ok(used_bytes)
    }
}
