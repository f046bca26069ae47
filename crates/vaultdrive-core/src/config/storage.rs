//! Storage backend configuration.
//!
//! Exactly one backend is active per process; switching backends is a pure
//! configuration change.

use serde::{Deserialize, Serialize};

/// Top-level storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// The active backend: `"local"`, `"s3"`, or `"drive"`.
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Local filesystem backend configuration.
    #[serde(default)]
    pub local: LocalBackendConfig,
    /// S3-compatible object store configuration.
    #[serde(default)]
    pub s3: S3BackendConfig,
    /// Third-party drive API configuration.
    #[serde(default)]
    pub drive: DriveBackendConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            local: LocalBackendConfig::default(),
            s3: S3BackendConfig::default(),
            drive: DriveBackendConfig::default(),
        }
    }
}

/// Local filesystem backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalBackendConfig {
    /// Root directory all objects are written under.
    #[serde(default = "default_local_root")]
    pub root_path: String,
}

impl Default for LocalBackendConfig {
    fn default() -> Self {
        Self {
            root_path: default_local_root(),
        }
    }
}

/// S3-compatible object storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3BackendConfig {
    /// S3 endpoint URL (for non-AWS services like MinIO/Supabase).
    #[serde(default)]
    pub endpoint: String,
    /// AWS region.
    #[serde(default = "default_region")]
    pub region: String,
    /// S3 bucket name.
    #[serde(default)]
    pub bucket: String,
    /// Access key ID (empty = provider chain default).
    #[serde(default)]
    pub access_key: String,
    /// Secret access key.
    #[serde(default)]
    pub secret_key: String,
    /// Key prefix prepended to every object key.
    #[serde(default = "default_s3_prefix")]
    pub prefix: String,
}

impl Default for S3BackendConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            region: default_region(),
            bucket: String::new(),
            access_key: String::new(),
            secret_key: String::new(),
            prefix: default_s3_prefix(),
        }
    }
}

/// Third-party drive HTTP API configuration.
///
/// The drive addresses objects by opaque ids, so the backend keeps a
/// name-to-id lookup and resolves a root container lazily.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriveBackendConfig {
    /// Base URL of the drive REST API.
    #[serde(default)]
    pub api_base: String,
    /// Base URL for media uploads.
    #[serde(default)]
    pub upload_base: String,
    /// OAuth2 token endpoint.
    #[serde(default)]
    pub token_url: String,
    /// OAuth2 client id.
    #[serde(default)]
    pub client_id: String,
    /// OAuth2 client secret.
    #[serde(default)]
    pub client_secret: String,
    /// OAuth2 refresh token.
    #[serde(default)]
    pub refresh_token: String,
    /// Preconfigured root container id (tried first; may be inaccessible).
    #[serde(default)]
    pub root_container_id: String,
    /// Root container name used when the configured id is absent or
    /// inaccessible.
    #[serde(default = "default_root_container_name")]
    pub root_container_name: String,
    /// Prefix prepended to generated object names.
    #[serde(default = "default_drive_prefix")]
    pub key_prefix: String,
}

impl Default for DriveBackendConfig {
    fn default() -> Self {
        Self {
            api_base: String::new(),
            upload_base: String::new(),
            token_url: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            refresh_token: String::new(),
            root_container_id: String::new(),
            root_container_name: default_root_container_name(),
            key_prefix: default_drive_prefix(),
        }
    }
}

fn default_backend() -> String {
    "local".to_string()
}

fn default_local_root() -> String {
    "./data/storage".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_s3_prefix() -> String {
    "uploads/".to_string()
}

fn default_root_container_name() -> String {
    "VaultDrive Files".to_string()
}

fn default_drive_prefix() -> String {
    "vault_".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = StorageConfig::default();
        assert_eq!(cfg.backend, "local");
        assert_eq!(cfg.s3.region, "us-east-1");
        assert_eq!(cfg.drive.key_prefix, "vault_");
    }
}
