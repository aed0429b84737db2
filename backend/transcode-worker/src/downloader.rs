//! Source video downloader

use std::path::{Path, PathBuf};

use hls_core::VideoJob;
use s3_utils::S3Client;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};
use tracing_opentelemetry::OpenTelemetrySpanExt;
use uuid::Uuid;

use crate::error::WorkerError;

/// Streams queued objects into scoped temp files.
#[derive(Clone)]
pub struct Downloader {
    s3: S3Client,
    dir: PathBuf,
}

impl Downloader {
    pub fn new(s3: S3Client, dir: PathBuf) -> Self {
        Self { s3, dir }
    }

    /// Stream the job's raw object to a uniquely-named temp file and return
    /// its path. The caller owns cleanup of the returned file; a partial
    /// file left by a failed transfer is removed here.
    #[instrument(name = "download-video", skip_all, fields(video_id = %job.video_id))]
    pub async fn download(&self, job: &VideoJob) -> Result<PathBuf, WorkerError> {
        fs::create_dir_all(&self.dir).await?;

        let path = self.dir.join(format!(
            "{}-{}{}",
            job.video_id,
            Uuid::new_v4(),
            source_extension(&job.s3_key)
        ));

        match self.stream_to_file(job, &path).await {
            Ok(size_bytes) => {
                tracing::Span::current().set_attribute("video.size_bytes", size_bytes);
                debug!(path = %path.display(), size_bytes, "downloaded source video");
                Ok(path)
            }
            Err(err) => {
                let _ = fs::remove_file(&path).await;
                Err(err)
            }
        }
    }

    async fn stream_to_file(&self, job: &VideoJob, path: &Path) -> Result<i64, WorkerError> {
        let mut body = self
            .s3
            .get(&job.bucket, &job.s3_key)
            .await
            .map_err(WorkerError::DownloadFailed)?;

        let mut file = fs::File::create(path).await?;
        let mut size_bytes: i64 = 0;

        while let Some(chunk) = body
            .try_next()
            .await
            .map_err(|e| WorkerError::DownloadFailed(s3_utils::StorageError::Request(e.to_string())))?
        {
            size_bytes += chunk.len() as i64;
            file.write_all(&chunk).await?;
        }

        file.sync_all().await?;
        Ok(size_bytes)
    }
}

fn source_extension(key: &str) -> String {
    Path::new(key)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{e}"))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_extension() {
        assert_eq!(source_extension("uploads/abc.mp4"), ".mp4");
        assert_eq!(source_extension("uploads/abc.MOV"), ".MOV");
        assert_eq!(source_extension("uploads/noext"), "");
    }
}
