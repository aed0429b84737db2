//! Worker configuration loaded from environment variables

use std::path::PathBuf;
use std::time::Duration;

use hls_core::{default_presets, Preset};

/// Fatal configuration errors; the process exits 1 on any of these.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
}

#[derive(Clone, Debug)]
pub struct WorkerConfig {
    pub aws_region: String,
    pub raw_bucket: String,
    pub processed_bucket: String,
    pub queue_url: String,
    /// Metadata is optional for the worker: with no table configured, all
    /// record writes are skipped and progression relies on the queue alone.
    pub metadata_table: Option<String>,
    pub cdn_domain: String,
    pub environment: String,
    pub metrics_port: u16,
    pub max_concurrent_jobs: usize,
    pub temp_upload_dir: PathBuf,
    pub temp_hls_dir: PathBuf,
    pub segment_seconds: u32,
    pub transcode_timeout: Duration,
    pub upload_concurrency: usize,
    pub queue_wait: Duration,
    pub queue_visibility: Duration,
    pub require_audio: bool,
    pub presets: Vec<Preset>,
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let temp_root = std::env::temp_dir();

        Ok(Self {
            aws_region: std::env::var("AWS_REGION").unwrap_or_else(|_| "us-west-2".to_string()),
            raw_bucket: required("S3_BUCKET")?,
            processed_bucket: required("PROCESSED_BUCKET")?,
            queue_url: required("SQS_QUEUE_URL")?,
            metadata_table: std::env::var("DYNAMODB_TABLE").ok().filter(|v| !v.is_empty()),
            cdn_domain: required("CDN_DOMAIN")?,
            environment: std::env::var("ENV").unwrap_or_else(|_| "development".to_string()),
            metrics_port: parse_var("METRICS_PORT", 2112),
            max_concurrent_jobs: parse_var("MAX_CONCURRENT_JOBS", 1),
            temp_upload_dir: std::env::var("TEMP_UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| temp_root.join("hls-uploads")),
            temp_hls_dir: std::env::var("TEMP_HLS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| temp_root.join("hls-output")),
            segment_seconds: parse_var("HLS_SEGMENT_SECONDS", 6),
            transcode_timeout: Duration::from_secs(parse_var("TRANSCODE_TIMEOUT_SECONDS", 900)),
            upload_concurrency: parse_var("UPLOAD_CONCURRENCY", 20),
            queue_wait: Duration::from_secs(parse_var("QUEUE_WAIT_SECONDS", 20)),
            queue_visibility: Duration::from_secs(parse_var("QUEUE_VISIBILITY_SECONDS", 900)),
            require_audio: std::env::var("TRANSCODE_REQUIRE_AUDIO")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            presets: default_presets(),
        })
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(name))
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_var_falls_back() {
        assert_eq!(parse_var("DOES_NOT_EXIST_12345", 42usize), 42);
    }
}
