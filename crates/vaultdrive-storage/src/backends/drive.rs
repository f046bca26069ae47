//! Remote drive HTTP API storage backend.
//!
//! The drive addresses objects by opaque server-assigned ids while the
//! metadata store addresses them by storage key, so every operation starts
//! with a key-to-id lookup against the root container. The root container
//! itself is resolved lazily: the configured id is tried first, then a
//! container with the configured name is found or created.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, StatusCode};
use serde::Deserialize;
use tokio::sync::{OnceCell, RwLock};
use tracing::{debug, info, warn};

use vaultdrive_core::config::storage::DriveBackendConfig;
use vaultdrive_core::error::{AppError, ErrorKind};
use vaultdrive_core::result::AppResult;
use vaultdrive_core::traits::storage::{
    ByteRange, ByteStream, SaveRequest, StorageBackend, StoredObject,
};

use super::object_key;

const CONTAINER_MIME: &str = "application/vnd.google-apps.folder";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Deserialize)]
struct DriveObject {
    id: String,
}

#[derive(Debug, Deserialize)]
struct DriveList {
    #[serde(default)]
    files: Vec<DriveObject>,
}

/// Storage backend talking to a third-party drive REST API over OAuth2.
#[derive(Debug)]
pub struct RemoteDriveBackend {
    http: Client,
    config: DriveBackendConfig,
    token: RwLock<Option<CachedToken>>,
    root_container: OnceCell<String>,
}

impl RemoteDriveBackend {
    /// Create a new drive backend from configuration.
    pub fn new(config: &DriveBackendConfig) -> AppResult<Self> {
        if config.token_url.is_empty() || config.refresh_token.is_empty() {
            return Err(AppError::configuration(
                "Drive backend requires token_url and refresh_token",
            ));
        }

        info!(
            api_base = %config.api_base,
            configured_root = %config.root_container_id,
            "Initializing remote drive backend"
        );

        let http = Client::builder().build().map_err(|e| {
            AppError::with_source(ErrorKind::Storage, "Failed to build HTTP client", e)
        })?;

        Ok(Self {
            http,
            config: config.clone(),
            token: RwLock::new(None),
            root_container: OnceCell::new(),
        })
    }

    /// Get a valid access token, refreshing through the OAuth2 endpoint
    /// when the cached one is missing or about to expire.
    async fn access_token(&self) -> AppResult<String> {
        {
            let cached = self.token.read().await;
            if let Some(token) = cached.as_ref() {
                if token.expires_at > chrono::Utc::now() + chrono::Duration::seconds(60) {
                    return Ok(token.access_token.clone());
                }
            }
        }

        let resp = self
            .http
            .post(&self.config.token_url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("refresh_token", self.config.refresh_token.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Storage, "Token refresh failed", e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(AppError::storage(format!(
                "Token refresh failed ({status}): {body}"
            )));
        }

        let token: TokenResponse = resp.json().await.map_err(|e| {
            AppError::with_source(ErrorKind::Storage, "Invalid token response", e)
        })?;

        let cached = CachedToken {
            access_token: token.access_token.clone(),
            expires_at: chrono::Utc::now() + chrono::Duration::seconds(token.expires_in),
        };
        *self.token.write().await = Some(cached);
        Ok(token.access_token)
    }

    /// Resolve the root container id, trying the configured id first and
    /// falling back to find-or-create by name.
    async fn root_id(&self) -> AppResult<String> {
        self.root_container
            .get_or_try_init(|| self.resolve_root())
            .await
            .map(|id| id.clone())
    }

    async fn resolve_root(&self) -> AppResult<String> {
        let token = self.access_token().await?;

        if !self.config.root_container_id.is_empty() {
            let resp = self
                .http
                .get(format!(
                    "{}/files/{}?fields=id,name",
                    self.config.api_base, self.config.root_container_id
                ))
                .bearer_auth(&token)
                .send()
                .await
                .map_err(|e| {
                    AppError::with_source(ErrorKind::Storage, "Root container check failed", e)
                })?;
            if resp.status().is_success() {
                debug!(id = %self.config.root_container_id, "Using configured root container");
                return Ok(self.config.root_container_id.clone());
            }
            warn!(
                id = %self.config.root_container_id,
                status = %resp.status(),
                "Configured root container inaccessible, resolving by name"
            );
        }

        let name = &self.config.root_container_name;
        let query = format!("name='{name}' and mimeType='{CONTAINER_MIME}' and trashed=false");
        let list: DriveList = self
            .http
            .get(format!("{}/files", self.config.api_base))
            .bearer_auth(&token)
            .query(&[("q", query.as_str()), ("fields", "files(id,name)")])
            .send()
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Storage, "Root container search failed", e)
            })?
            .json()
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Storage, "Invalid container list response", e)
            })?;

        if let Some(existing) = list.files.first() {
            debug!(id = %existing.id, "Found existing root container");
            return Ok(existing.id.clone());
        }

        let created: DriveObject = self
            .http
            .post(format!("{}/files?fields=id,name", self.config.api_base))
            .bearer_auth(&token)
            .json(&serde_json::json!({
                "name": name,
                "mimeType": CONTAINER_MIME,
            }))
            .send()
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Storage, "Root container create failed", e)
            })?
            .json()
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Storage, "Invalid container create response", e)
            })?;

        info!(id = %created.id, "Created root container");
        Ok(created.id)
    }

    /// Look up the drive id for a storage key inside the root container.
    async fn find_id(&self, storage_key: &str) -> AppResult<Option<String>> {
        let token = self.access_token().await?;
        let root = self.root_id().await?;

        let query =
            format!("name='{storage_key}' and '{root}' in parents and trashed=false");
        let list: DriveList = self
            .http
            .get(format!("{}/files", self.config.api_base))
            .bearer_auth(&token)
            .query(&[("q", query.as_str()), ("fields", "files(id,name)")])
            .send()
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Storage, "Object lookup failed", e))?
            .json()
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Storage, "Invalid object list response", e)
            })?;

        Ok(list.files.into_iter().next().map(|f| f.id))
    }

    /// Fetch an object's media by id, optionally with a byte range.
    async fn fetch_media(
        &self,
        id: &str,
        storage_key: &str,
        range: Option<ByteRange>,
    ) -> AppResult<reqwest::Response> {
        let token = self.access_token().await?;
        let mut req = self
            .http
            .get(format!("{}/files/{id}?alt=media", self.config.api_base))
            .bearer_auth(&token);
        if let Some(range) = range {
            req = req.header(reqwest::header::RANGE, range.to_header_value());
        }

        let resp = req
            .send()
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Storage, "Object download failed", e))?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(AppError::not_found(format!(
                "Object not found: {storage_key}"
            )));
        }
        if !resp.status().is_success() {
            let status = resp.status();
            return Err(AppError::storage(format!(
                "Object download failed ({status}): {storage_key}"
            )));
        }
        Ok(resp)
    }
}

#[async_trait]
impl StorageBackend for RemoteDriveBackend {
    fn backend_type(&self) -> &str {
        "drive"
    }

    async fn health_check(&self) -> AppResult<bool> {
        let token = match self.access_token().await {
            Ok(token) => token,
            Err(_) => return Ok(false),
        };
        let resp = self
            .http
            .get(format!("{}/files", self.config.api_base))
            .bearer_auth(&token)
            .query(&[("pageSize", "1"), ("fields", "files(id)")])
            .send()
            .await;
        Ok(resp.is_ok_and(|r| r.status().is_success()))
    }

    async fn save(&self, mut data: ByteStream, req: &SaveRequest) -> AppResult<StoredObject> {
        let storage_key = format!("{}{}", self.config.key_prefix, object_key(&req.name));
        let token = self.access_token().await?;
        let root = self.root_id().await?;

        // The multipart media part needs a length for the drive API to
        // accept it, so the stream is buffered first and the exact size
        // recorded for the metadata row.
        let mut buf = Vec::new();
        while let Some(chunk) = data.next().await {
            let chunk = chunk
                .map_err(|e| AppError::with_source(ErrorKind::Storage, "Stream read error", e))?;
            buf.extend_from_slice(&chunk);
        }
        let size_bytes = buf.len() as i64;

        let metadata = serde_json::json!({
            "name": storage_key,
            "parents": [root],
            "mimeType": req.mime_type,
        });

        let metadata_part = Part::text(metadata.to_string())
            .mime_str("application/json")
            .map_err(|e| AppError::with_source(ErrorKind::Storage, "Invalid metadata part", e))?;
        let mut media_part = Part::stream_with_length(Body::from(buf), size_bytes as u64);
        if let Some(mime) = &req.mime_type {
            media_part = media_part.mime_str(mime).map_err(|e| {
                AppError::with_source(ErrorKind::Storage, "Invalid media MIME type", e)
            })?;
        }

        let form = Form::new()
            .part("metadata", metadata_part)
            .part("media", media_part);

        let resp = self
            .http
            .post(format!(
                "{}/files?uploadType=multipart&fields=id,name",
                self.config.upload_base
            ))
            .bearer_auth(&token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Storage, "Object upload failed", e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(AppError::storage(format!(
                "Object upload failed ({status}): {body}"
            )));
        }

        debug!(storage_key, bytes = size_bytes, "Uploaded object");
        Ok(StoredObject {
            storage_key,
            size_bytes,
        })
    }

    async fn read_bytes(&self, storage_key: &str) -> AppResult<Bytes> {
        let id = self
            .find_id(storage_key)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Object not found: {storage_key}")))?;
        let resp = self.fetch_media(&id, storage_key, None).await?;
        resp.bytes()
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Storage, "Object read failed", e))
    }

    async fn read_stream(
        &self,
        storage_key: &str,
        range: Option<ByteRange>,
    ) -> AppResult<ByteStream> {
        let id = self
            .find_id(storage_key)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Object not found: {storage_key}")))?;
        let resp = self.fetch_media(&id, storage_key, range).await?;

        let stream = resp
            .bytes_stream()
            .map(|chunk| chunk.map_err(std::io::Error::other));
        Ok(Box::pin(stream))
    }

    async fn exists(&self, storage_key: &str) -> AppResult<bool> {
        Ok(self.find_id(storage_key).await?.is_some())
    }

    async fn delete(&self, storage_key: &str) -> AppResult<()> {
        let Some(id) = self.find_id(storage_key).await? else {
            return Ok(());
        };

        let token = self.access_token().await?;
        let resp = self
            .http
            .delete(format!("{}/files/{id}", self.config.api_base))
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Storage, "Object delete failed", e))?;

        // Already gone counts as deleted.
        if !resp.status().is_success() && resp.status() != StatusCode::NOT_FOUND {
            let status = resp.status();
            return Err(AppError::storage(format!(
                "Object delete failed ({status}): {storage_key}"
            )));
        }
        debug!(storage_key, "Deleted object");
        Ok(())
    }

    fn public_url(&self, _storage_key: &str) -> Option<String> {
        None
    }
}
