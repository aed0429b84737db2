//! S3 operations: presigned PUT, HEAD, streaming GET, PUT, LIST

use std::path::Path;
use std::time::Duration;

use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use chrono::{DateTime, TimeZone, Utc};
use tracing::debug;

use crate::{S3Client, StorageError};

/// HEAD result for a single object.
#[derive(Debug, Clone)]
pub struct ObjectMetadata {
    pub size_bytes: i64,
    pub content_type: Option<String>,
    pub etag: Option<String>,
}

/// One entry of a LIST page.
#[derive(Debug, Clone)]
pub struct ObjectSummary {
    pub key: String,
    pub size_bytes: i64,
    pub last_modified: Option<DateTime<Utc>>,
}

impl S3Client {
    /// Mint a presigned PUT URL. The holder may upload bytes under `key`
    /// for `ttl`; the content type is fixed at signing time.
    pub async fn presign_put(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        ttl: Duration,
    ) -> Result<String, StorageError> {
        let presigning = PresigningConfig::expires_in(ttl)
            .map_err(|e| StorageError::Presign(e.to_string()))?;

        let request = self
            .client()
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .presigned(presigning)
            .await
            .map_err(|e| StorageError::Presign(e.to_string()))?;

        Ok(request.uri().to_string())
    }

    /// HEAD an object. A missing key maps to `StorageError::NotFound`.
    pub async fn head(&self, bucket: &str, key: &str) -> Result<ObjectMetadata, StorageError> {
        let response = self
            .client()
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| {
                let service_err = err.into_service_error();
                if service_err.is_not_found() {
                    StorageError::NotFound {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                    }
                } else {
                    StorageError::Request(service_err.to_string())
                }
            })?;

        Ok(ObjectMetadata {
            size_bytes: response.content_length().unwrap_or(0),
            content_type: response.content_type().map(|s| s.to_string()),
            etag: response.e_tag().map(|s| s.to_string()),
        })
    }

    /// GET an object as a byte stream. The consumer must drain it.
    pub async fn get(&self, bucket: &str, key: &str) -> Result<ByteStream, StorageError> {
        let response = self
            .client()
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| {
                let service_err = err.into_service_error();
                if service_err.is_no_such_key() {
                    StorageError::NotFound {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                    }
                } else {
                    StorageError::Request(service_err.to_string())
                }
            })?;

        Ok(response.body)
    }

    /// PUT a local file under `key`. S3 replaces atomically.
    pub async fn put_file(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StorageError::Request(e.to_string()))?;

        self.client()
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .body(body)
            .send()
            .await
            .map_err(|e| StorageError::Request(e.to_string()))?;

        debug!(bucket, key, "uploaded object");
        Ok(())
    }

    /// PUT raw bytes under `key`.
    pub async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        self.client()
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| StorageError::Request(e.to_string()))?;

        Ok(())
    }

    /// LIST up to `max_keys` objects under `prefix`.
    pub async fn list(
        &self,
        bucket: &str,
        prefix: &str,
        max_keys: i32,
    ) -> Result<Vec<ObjectSummary>, StorageError> {
        let response = self
            .client()
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .max_keys(max_keys)
            .send()
            .await
            .map_err(|e| StorageError::Request(e.to_string()))?;

        let summaries = response
            .contents()
            .iter()
            .filter_map(|obj| {
                let key = obj.key()?.to_string();
                Some(ObjectSummary {
                    key,
                    size_bytes: obj.size().unwrap_or(0),
                    last_modified: obj
                        .last_modified()
                        .and_then(|t| Utc.timestamp_opt(t.secs(), t.subsec_nanos()).single()),
                })
            })
            .collect();

        Ok(summaries)
    }
}
