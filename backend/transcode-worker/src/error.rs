//! Worker error taxonomy
//!
//! Every failure is classified by pipeline stage so the failure counter and
//! the redelivery decision stay mechanical: no variant here causes a queue
//! delete, so any failed job is redelivered until the queue's redrive
//! policy moves it to the dead-letter queue.

use metadata_store::MetadataError;
use s3_utils::StorageError;
use sqs_utils::QueueError;

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("job parse failed: {0}")]
    JobParseFailed(String),
    #[error("download failed: {0}")]
    DownloadFailed(#[source] StorageError),
    #[error("upload failed: {0}")]
    UploadFailed(String),
    #[error("queue operation failed: {0}")]
    QueueFailed(#[from] QueueError),
    #[error("metadata write failed: {0}")]
    MetadataFailed(#[from] MetadataError),
    #[error("ffmpeg failed: {0}")]
    FfmpegFailed(String),
    #[error("ffmpeg canceled")]
    FfmpegCanceled,
    #[error("canceled")]
    Canceled,
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    /// Label used by the failure counter.
    pub fn category(&self) -> &'static str {
        match self {
            WorkerError::JobParseFailed(_) => "parse",
            WorkerError::DownloadFailed(_) => "download",
            WorkerError::UploadFailed(_) => "upload",
            WorkerError::QueueFailed(_) => "queue",
            WorkerError::MetadataFailed(_) => "metadata",
            WorkerError::FfmpegFailed(_) => "ffmpeg",
            WorkerError::FfmpegCanceled | WorkerError::Canceled => "canceled",
            WorkerError::Io(_) => "io",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        assert_eq!(WorkerError::JobParseFailed("x".into()).category(), "parse");
        assert_eq!(WorkerError::FfmpegCanceled.category(), "canceled");
        assert_eq!(WorkerError::Canceled.category(), "canceled");
        assert_eq!(WorkerError::UploadFailed("x".into()).category(), "upload");
    }
}
