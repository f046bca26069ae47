//! S3-compatible object storage backend.
//!
//! Works against AWS S3 and S3-compatible services (MinIO, Supabase
//! storage) via a custom endpoint with path-style addressing.

use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::Client;
use bytes::{Bytes, BytesMut};
use futures::stream::StreamExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

use vaultdrive_core::config::storage::S3BackendConfig;
use vaultdrive_core::error::{AppError, ErrorKind};
use vaultdrive_core::result::AppResult;
use vaultdrive_core::traits::storage::{
    ByteRange, ByteStream, SaveRequest, StorageBackend, StoredObject,
};

use super::object_key;

/// S3-compatible object storage backend.
#[derive(Debug, Clone)]
pub struct S3StorageBackend {
    client: Client,
    bucket: String,
    prefix: String,
    endpoint: Option<String>,
    region: String,
}

impl S3StorageBackend {
    /// Create a new S3 backend from configuration.
    pub async fn new(config: &S3BackendConfig) -> AppResult<Self> {
        if config.bucket.is_empty() {
            return Err(AppError::configuration("S3 bucket is not configured"));
        }

        info!(
            endpoint = %config.endpoint,
            region = %config.region,
            bucket = %config.bucket,
            "Initializing S3 storage backend"
        );

        let mut builder = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .force_path_style(true);

        if !config.access_key.is_empty() {
            builder = builder.credentials_provider(Credentials::new(
                config.access_key.clone(),
                config.secret_key.clone(),
                None,
                None,
                "vaultdrive-config",
            ));
        }
        if !config.endpoint.is_empty() {
            builder = builder.endpoint_url(&config.endpoint);
        }

        Ok(Self {
            client: Client::from_conf(builder.build()),
            bucket: config.bucket.clone(),
            prefix: config.prefix.clone(),
            endpoint: (!config.endpoint.is_empty()).then(|| config.endpoint.clone()),
            region: config.region.clone(),
        })
    }

    fn prefixed(&self, storage_key: &str) -> String {
        format!("{}{}", self.prefix, storage_key)
    }
}

#[async_trait]
impl StorageBackend for S3StorageBackend {
    fn backend_type(&self) -> &str {
        "s3"
    }

    async fn health_check(&self) -> AppResult<bool> {
        match self.client.head_bucket().bucket(&self.bucket).send().await {
            Ok(_) => Ok(true),
            Err(_) => Ok(false),
        }
    }

    async fn save(&self, mut data: ByteStream, req: &SaveRequest) -> AppResult<StoredObject> {
        let storage_key = object_key(&req.name);

        // put_object needs a known content length, so the stream is
        // buffered before the request.
        let mut buf = BytesMut::new();
        while let Some(chunk) = data.next().await {
            let chunk = chunk
                .map_err(|e| AppError::with_source(ErrorKind::Storage, "Stream read error", e))?;
            buf.extend_from_slice(&chunk);
        }
        let body = buf.freeze();
        let size_bytes = body.len() as i64;

        let mut put = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(self.prefixed(&storage_key))
            .body(aws_sdk_s3::primitives::ByteStream::from(body));
        if let Some(mime) = &req.mime_type {
            put = put.content_type(mime);
        }

        put.send().await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to upload object: {storage_key}"),
                e.into_service_error(),
            )
        })?;

        debug!(storage_key, bytes = size_bytes, "Uploaded object");
        Ok(StoredObject {
            storage_key,
            size_bytes,
        })
    }

    async fn read_bytes(&self, storage_key: &str) -> AppResult<Bytes> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(self.prefixed(storage_key))
            .send()
            .await
            .map_err(|e| {
                let svc = e.into_service_error();
                if svc.is_no_such_key() {
                    AppError::not_found(format!("Object not found: {storage_key}"))
                } else {
                    AppError::with_source(
                        ErrorKind::Storage,
                        format!("Failed to download object: {storage_key}"),
                        svc,
                    )
                }
            })?;

        let data = resp.body.collect().await.map_err(|e| {
            AppError::with_source(ErrorKind::Storage, "Failed to collect object body", e)
        })?;
        Ok(data.into_bytes())
    }

    async fn read_stream(
        &self,
        storage_key: &str,
        range: Option<ByteRange>,
    ) -> AppResult<ByteStream> {
        let mut get = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(self.prefixed(storage_key));
        if let Some(range) = range {
            get = get.range(range.to_header_value());
        }

        let resp = get.send().await.map_err(|e| {
            let svc = e.into_service_error();
            if svc.is_no_such_key() {
                AppError::not_found(format!("Object not found: {storage_key}"))
            } else {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to download object: {storage_key}"),
                    svc,
                )
            }
        })?;

        let reader = resp.body.into_async_read();
        Ok(Box::pin(ReaderStream::new(reader)))
    }

    async fn exists(&self, storage_key: &str) -> AppResult<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(self.prefixed(storage_key))
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                let svc = e.into_service_error();
                if svc.is_not_found() {
                    Ok(false)
                } else {
                    Err(AppError::with_source(
                        ErrorKind::Storage,
                        format!("Failed to check object: {storage_key}"),
                        svc,
                    ))
                }
            }
        }
    }

    async fn delete(&self, storage_key: &str) -> AppResult<()> {
        // S3 DeleteObject succeeds for missing keys, matching the trait's
        // idempotency contract.
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(self.prefixed(storage_key))
            .send()
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to delete object: {storage_key}"),
                    e.into_service_error(),
                )
            })?;
        debug!(storage_key, "Deleted object");
        Ok(())
    }

    fn public_url(&self, storage_key: &str) -> Option<String> {
        let key = self.prefixed(storage_key);
        match &self.endpoint {
            Some(endpoint) => Some(format!(
                "{}/{}/{}",
                endpoint.trim_end_matches('/'),
                self.bucket,
                key
            )),
            None => Some(format!(
                "https://{}.s3.{}.amazonaws.com/{}",
                self.bucket, self.region, key
            )),
        }
    }
}
