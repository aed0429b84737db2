//! Object store adapter shared by the ingress API and the transcode worker
//!
//! Wraps the AWS S3 client behind the handful of operations the pipeline
//! needs. Buckets are passed per call: the API touches the raw upload
//! bucket, the worker reads raw and writes processed.

use std::sync::Arc;
use std::time::Duration;

use aws_sdk_s3::Client;

pub mod operations;

pub use operations::{ObjectMetadata, ObjectSummary};

/// Errors surfaced by the object store adapter.
///
/// `NotFound` is distinguished so callers can treat a missing upload as a
/// client error rather than a dependency failure.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("object not found: s3://{bucket}/{key}")]
    NotFound { bucket: String, key: String },
    #[error("presigning failed: {0}")]
    Presign(String),
    #[error("s3 request failed: {0}")]
    Request(String),
}

/// Shared S3 client handle.
#[derive(Clone)]
pub struct S3Client {
    client: Arc<Client>,
}

impl S3Client {
    /// Build a client from the ambient AWS environment (region, credentials).
    pub async fn new() -> Self {
        let aws_config = aws_config::load_from_env().await;
        Self {
            client: Arc::new(Client::new(&aws_config)),
        }
    }

    /// Wrap an already-constructed SDK client, letting callers share one
    /// `aws_config` load across adapters.
    pub fn from_client(client: Client) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Deep-health probe: HEAD the bucket with a short deadline.
    pub async fn health_check(&self, bucket: &str, deadline: Duration) -> Result<(), StorageError> {
        tokio::time::timeout(deadline, async {
            self.client
                .head_bucket()
                .bucket(bucket)
                .send()
                .await
                .map_err(|e| StorageError::Request(e.to_string()))
        })
        .await
        .map_err(|_| StorageError::Request(format!("head_bucket {bucket} timed out")))?
        .map(|_| ())
    }
}
