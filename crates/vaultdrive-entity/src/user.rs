//! User entity and quota usage value object.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A tenant owning files and folders, with quota ledger counters.
///
/// `used_bytes` is maintained incrementally by the quota ledger and may
/// drift from the true sum of live file sizes; recalculation resums it.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    /// Unique user identifier.
    pub id: Uuid,
    /// Bytes currently accounted against the quota.
    pub used_bytes: i64,
    /// Quota limit in bytes.
    pub quota_bytes: i64,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
    /// When the user was last updated.
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Whether `additional_bytes` more would still fit under the quota.
    pub fn has_available_storage(&self, additional_bytes: i64) -> bool {
        self.used_bytes + additional_bytes <= self.quota_bytes
    }
}

/// Quota usage snapshot for a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaUsage {
    /// Bytes currently used.
    pub used_bytes: i64,
    /// Quota limit in bytes.
    pub quota_bytes: i64,
    /// Bytes still available.
    pub available_bytes: i64,
    /// Usage percentage (0.0 - 100.0).
    pub usage_percent: f64,
}

impl QuotaUsage {
    /// Create a usage snapshot from raw counters.
    pub fn new(used_bytes: i64, quota_bytes: i64) -> Self {
        let usage_percent = if quota_bytes == 0 {
            0.0
        } else {
            (used_bytes as f64 / quota_bytes as f64) * 100.0
        };

        Self {
            used_bytes,
            quota_bytes,
            available_bytes: (quota_bytes - used_bytes).max(0),
            usage_percent,
        }
    }

    /// Whether adding the given number of bytes would exceed the quota.
    pub fn would_exceed(&self, additional_bytes: i64) -> bool {
        self.used_bytes + additional_bytes > self.quota_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_usage() {
        let usage = QuotaUsage::new(60, 100);
        assert_eq!(usage.available_bytes, 40);
        assert!((usage.usage_percent - 60.0).abs() < f64::EPSILON);
        assert!(!usage.would_exceed(40));
        assert!(usage.would_exceed(41));
    }

    #[test]
    fn test_quota_usage_zero_quota() {
        let usage = QuotaUsage::new(0, 0);
        assert_eq!(usage.usage_percent, 0.0);
        assert!(usage.would_exceed(1));
    }
}
