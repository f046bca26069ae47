//! Storage backend trait for pluggable physical byte stores.
//!
//! This trait is the single substitution point between metadata logic and
//! physical storage: every other crate talks to `dyn StorageBackend`, never
//! to a backend-specific API.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;

use crate::result::AppResult;

/// A byte stream type used for reading and writing object contents.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// Wrap a fully buffered payload as a [`ByteStream`].
pub fn stream_from_bytes(data: Bytes) -> ByteStream {
    Box::pin(futures::stream::once(async move { Ok(data) }))
}

/// An inclusive byte range for partial reads (seekable playback).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ByteRange {
    /// First byte offset to read.
    pub start: u64,
    /// Last byte offset to read (inclusive). `None` = to end of object.
    pub end: Option<u64>,
}

impl ByteRange {
    /// Number of bytes covered, when the end is known.
    pub fn len(&self) -> Option<u64> {
        self.end.map(|end| end.saturating_sub(self.start) + 1)
    }

    /// Whether the range covers zero bytes.
    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }

    /// Render as an HTTP `Range` header value.
    pub fn to_header_value(&self) -> String {
        match self.end {
            Some(end) => format!("bytes={}-{}", self.start, end),
            None => format!("bytes={}-", self.start),
        }
    }
}

/// Caller-supplied metadata accompanying a save.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SaveRequest {
    /// Original logical file name; backends derive the key extension from it.
    pub name: String,
    /// MIME type (if known).
    pub mime_type: Option<String>,
}

/// The result of persisting an object: the backend-chosen key and the exact
/// number of bytes written.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct StoredObject {
    /// Backend-scoped key addressing the stored bytes.
    pub storage_key: String,
    /// Size in bytes.
    pub size_bytes: i64,
}

/// Trait for physical storage backends.
///
/// Implementations exist for the local filesystem, S3-compatible object
/// stores, and a third-party drive HTTP API. The active backend is selected
/// once from configuration at process startup.
///
/// Contract notes:
/// - `delete` is idempotent: deleting a missing key succeeds.
/// - `read_bytes`/`read_stream` surface a missing key as
///   [`ErrorKind::NotFound`](crate::error::ErrorKind::NotFound), distinct
///   from other I/O failures.
/// - `read_stream` honors inclusive byte ranges.
#[async_trait]
pub trait StorageBackend: Send + Sync + std::fmt::Debug + 'static {
    /// Return the backend type name (e.g. "local", "s3", "drive").
    fn backend_type(&self) -> &str;

    /// Check whether the backend is healthy and reachable.
    async fn health_check(&self) -> AppResult<bool>;

    /// Persist a stream of bytes under a backend-chosen key.
    async fn save(&self, data: ByteStream, req: &SaveRequest) -> AppResult<StoredObject>;

    /// Read an object into memory as a complete byte vector.
    async fn read_bytes(&self, storage_key: &str) -> AppResult<Bytes>;

    /// Read an object as a stream, optionally restricted to a byte range.
    async fn read_stream(
        &self,
        storage_key: &str,
        range: Option<ByteRange>,
    ) -> AppResult<ByteStream>;

    /// Check whether an object exists.
    async fn exists(&self, storage_key: &str) -> AppResult<bool>;

    /// Delete an object. Deleting a missing key is not an error.
    async fn delete(&self, storage_key: &str) -> AppResult<()>;

    /// A directly fetchable URL for the object, when the backend has one.
    fn public_url(&self, storage_key: &str) -> Option<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_range_header() {
        let range = ByteRange {
            start: 0,
            end: Some(99),
        };
        assert_eq!(range.to_header_value(), "bytes=0-99");
        assert_eq!(range.len(), Some(100));

        let open = ByteRange {
            start: 512,
            end: None,
        };
        assert_eq!(open.to_header_value(), "bytes=512-");
        assert_eq!(open.len(), None);
    }

    #[tokio::test]
    async fn test_stream_from_bytes() {
        use futures::StreamExt;

        let mut stream = stream_from_bytes(Bytes::from("hello"));
        let chunk = stream.next().await.unwrap().unwrap();
        assert_eq!(chunk, Bytes::from("hello"));
        assert!(stream.next().await.is_none());
    }
}
