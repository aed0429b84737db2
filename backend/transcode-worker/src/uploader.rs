//! Parallel HLS tree uploader

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, OnceLock};

use hls_core::content_type_for;
use s3_utils::S3Client;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, instrument};
use tracing_opentelemetry::OpenTelemetrySpanExt;

use crate::error::WorkerError;

/// Uploads a finished HLS directory tree into the processed bucket.
#[derive(Clone)]
pub struct Uploader {
    s3: S3Client,
    bucket: String,
    concurrency: usize,
}

impl Uploader {
    pub fn new(s3: S3Client, bucket: String, concurrency: usize) -> Self {
        Self {
            s3,
            bucket,
            concurrency,
        }
    }

    /// Upload every regular file under `hls_dir` (skipping `*.png`
    /// residuals) to `hls/<videoId>/<relativePath>`.
    ///
    /// Fan-out is bounded by a counting semaphore. The first error lands in
    /// a write-once cell and stops further scheduling; uploads already in
    /// flight run to completion before the error is returned.
    #[instrument(name = "upload-hls", skip_all, fields(video_id = %video_id))]
    pub async fn upload(&self, video_id: &str, hls_dir: &Path) -> Result<(), WorkerError> {
        let files = collect_files(hls_dir).await?;

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let first_error: Arc<OnceLock<String>> = Arc::new(OnceLock::new());
        let files_uploaded = Arc::new(AtomicI64::new(0));
        let bytes_total = Arc::new(AtomicI64::new(0));
        let mut tasks = JoinSet::new();

        for path in files {
            if first_error.get().is_some() {
                break;
            }

            let relative = path
                .strip_prefix(hls_dir)
                .map_err(|_| WorkerError::UploadFailed("file outside hls dir".to_string()))?;
            let key = format!("hls/{}/{}", video_id, relative.display());

            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .expect("upload semaphore closed");
            let s3 = self.s3.clone();
            let bucket = self.bucket.clone();
            let first_error = first_error.clone();
            let files_uploaded = files_uploaded.clone();
            let bytes_total = bytes_total.clone();

            tasks.spawn(async move {
                let _permit = permit;
                let size = tokio::fs::metadata(&path)
                    .await
                    .map(|m| m.len() as i64)
                    .unwrap_or(0);

                match s3
                    .put_file(&bucket, &key, &path, content_type_for(&key))
                    .await
                {
                    Ok(()) => {
                        files_uploaded.fetch_add(1, Ordering::Relaxed);
                        bytes_total.fetch_add(size, Ordering::Relaxed);
                    }
                    Err(err) => {
                        let _ = first_error.set(format!("{key}: {err}"));
                    }
                }
            });
        }

        while tasks.join_next().await.is_some() {}

        if let Some(err) = first_error.get() {
            return Err(WorkerError::UploadFailed(err.clone()));
        }

        let span = tracing::Span::current();
        span.set_attribute("files.uploaded", files_uploaded.load(Ordering::Relaxed));
        span.set_attribute("bytes.total", bytes_total.load(Ordering::Relaxed));
        debug!(
            files = files_uploaded.load(Ordering::Relaxed),
            bytes = bytes_total.load(Ordering::Relaxed),
            "uploaded hls tree"
        );

        Ok(())
    }
}

/// Walk `root` iteratively and return every regular file except PNG
/// residuals left by the quality check.
async fn collect_files(root: &Path) -> Result<Vec<PathBuf>, WorkerError> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                pending.push(path);
            } else if file_type.is_file() {
                if path.extension().and_then(|e| e.to_str()) == Some("png") {
                    continue;
                }
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[tokio::test]
    async fn test_collect_files_skips_png() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("720p")).unwrap();
        fs::write(dir.path().join("master.m3u8"), "#EXTM3U\n").unwrap();
        fs::write(dir.path().join("720p/playlist.m3u8"), "#EXTM3U\n").unwrap();
        fs::write(dir.path().join("720p/seg_000.ts"), [0u8; 16]).unwrap();
        fs::write(dir.path().join("ref_frame.png"), [0u8; 4]).unwrap();

        let files = collect_files(dir.path()).await.unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().display().to_string())
            .collect();

        assert_eq!(names, vec!["720p/playlist.m3u8", "720p/seg_000.ts", "master.m3u8"]);
    }

    #[test]
    fn test_key_layout() {
        let relative = Path::new("720p/seg_001.ts");
        let key = format!("hls/{}/{}", "vid-1", relative.display());
        assert_eq!(key, "hls/vid-1/720p/seg_001.ts");
    }
}
