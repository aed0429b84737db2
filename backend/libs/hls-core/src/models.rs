//! Job and metadata models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Validation failures for a queue message payload.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum JobValidationError {
    #[error("missing videoId")]
    MissingVideoId,
    #[error("missing s3Key")]
    MissingS3Key,
    #[error("missing bucket")]
    MissingBucket,
    #[error("missing filename")]
    MissingFilename,
}

/// Queue message payload describing one transcode job.
///
/// Produced by the ingress API at upload-complete, consumed by the worker,
/// destroyed by a successful queue delete.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoJob {
    pub video_id: String,
    pub s3_key: String,
    pub bucket: String,
    pub filename: String,
}

impl VideoJob {
    /// All four fields must be non-empty.
    pub fn validate(&self) -> Result<(), JobValidationError> {
        if self.video_id.is_empty() {
            return Err(JobValidationError::MissingVideoId);
        }
        if self.s3_key.is_empty() {
            return Err(JobValidationError::MissingS3Key);
        }
        if self.bucket.is_empty() {
            return Err(JobValidationError::MissingBucket);
        }
        if self.filename.is_empty() {
            return Err(JobValidationError::MissingFilename);
        }
        Ok(())
    }
}

/// Video processing status.
///
/// Transitions move only along pending -> processing -> {completed | failed}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl VideoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoStatus::Pending => "pending",
            VideoStatus::Processing => "processing",
            VideoStatus::Completed => "completed",
            VideoStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(VideoStatus::Pending),
            "processing" => Some(VideoStatus::Processing),
            "completed" => Some(VideoStatus::Completed),
            "failed" => Some(VideoStatus::Failed),
            _ => None,
        }
    }
}

/// Metadata row for one video, retained indefinitely.
///
/// A completed record always carries a non-empty `hls_prefix` and
/// `playback_url`, and `processed_at` is set iff the status is completed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRecord {
    pub video_id: String,
    pub filename: String,
    pub status: VideoStatus,
    pub raw_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hls_prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playback_url: Option<String>,
    pub file_size_bytes: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality_presets: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Singleton pointer to the most recently completed video.
///
/// Rewritten after each successful completion so "get latest video" is a
/// single point lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestPointer {
    pub video_id: String,
    pub playback_url: String,
    pub processed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> VideoJob {
        VideoJob {
            video_id: "0b9af7c2-8a52-4f36-9f1a-2f6f4ef1f001".to_string(),
            s3_key: "uploads/0b9af7c2-8a52-4f36-9f1a-2f6f4ef1f001.mp4".to_string(),
            bucket: "raw-videos".to_string(),
            filename: "sample.mp4".to_string(),
        }
    }

    #[test]
    fn test_job_wire_format() {
        let json = serde_json::to_value(job()).unwrap();
        assert!(json.get("videoId").is_some());
        assert!(json.get("s3Key").is_some());
        assert!(json.get("bucket").is_some());
        assert!(json.get("filename").is_some());
    }

    #[test]
    fn test_job_validate() {
        assert!(job().validate().is_ok());

        let mut j = job();
        j.video_id.clear();
        assert_eq!(j.validate(), Err(JobValidationError::MissingVideoId));

        let mut j = job();
        j.s3_key.clear();
        assert_eq!(j.validate(), Err(JobValidationError::MissingS3Key));

        let mut j = job();
        j.bucket.clear();
        assert_eq!(j.validate(), Err(JobValidationError::MissingBucket));

        let mut j = job();
        j.filename.clear();
        assert_eq!(j.validate(), Err(JobValidationError::MissingFilename));
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            VideoStatus::Pending,
            VideoStatus::Processing,
            VideoStatus::Completed,
            VideoStatus::Failed,
        ] {
            assert_eq!(VideoStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(VideoStatus::parse("ready"), None);
    }
}
