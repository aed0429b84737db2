//! Worker runtime: poll loop, bounded job pool, per-job state machine

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use hls_core::{create_output_directories, generate_master_playlist, VideoJob};
use metadata_store::VideoRepository;
use sqs_utils::{QueueMessage, SqsClient};
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, instrument, warn, Instrument};
use tracing_opentelemetry::OpenTelemetrySpanExt;

use crate::config::WorkerConfig;
use crate::downloader::Downloader;
use crate::error::WorkerError;
use crate::metrics::{
    ACTIVE_JOBS, JOBS_FAILED, JOBS_SUCCEEDED, QUEUE_RECEIVE_ERRORS, STAGE_DURATION_SECONDS,
};
use crate::quality::calculate_quality_metrics;
use crate::transcoder::Transcoder;
use crate::uploader::Uploader;

const RECEIVE_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// The worker owns one long-poll loop and a pool of at most
/// `max_concurrent_jobs` in-flight jobs. Each job holds a semaphore permit
/// for its lifetime, so draining the pool at shutdown is just re-acquiring
/// every permit.
#[derive(Clone)]
pub struct Worker {
    config: WorkerConfig,
    queue: SqsClient,
    repo: Option<VideoRepository>,
    downloader: Downloader,
    transcoder: Transcoder,
    uploader: Uploader,
    shutdown: watch::Receiver<bool>,
}

impl Worker {
    pub fn new(
        config: WorkerConfig,
        queue: SqsClient,
        repo: Option<VideoRepository>,
        downloader: Downloader,
        transcoder: Transcoder,
        uploader: Uploader,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            config,
            queue,
            repo,
            downloader,
            transcoder,
            uploader,
            shutdown,
        }
    }

    /// Run until the shutdown signal fires, then drain in-flight jobs.
    pub async fn run(&self) -> Result<(), WorkerError> {
        let max_jobs = self.config.max_concurrent_jobs.max(1);
        let pool = Arc::new(Semaphore::new(max_jobs));
        let mut shutdown = self.shutdown.clone();

        info!(
            max_concurrent_jobs = max_jobs,
            queue_url = %self.queue.queue_url(),
            "worker started"
        );

        'poll: loop {
            if *shutdown.borrow() {
                break;
            }

            let messages = tokio::select! {
                result = self.queue.receive(
                    1,
                    self.config.queue_wait,
                    self.config.queue_visibility,
                ) => match result {
                    Ok(messages) => messages,
                    Err(err) => {
                        if *shutdown.borrow() {
                            continue;
                        }
                        QUEUE_RECEIVE_ERRORS.inc();
                        error!(error = %err, "queue receive failed");
                        tokio::select! {
                            _ = tokio::time::sleep(RECEIVE_ERROR_BACKOFF) => {}
                            _ = shutdown.changed() => {}
                        }
                        continue;
                    }
                },
                _ = shutdown.changed() => break,
            };

            for message in messages {
                let permit = tokio::select! {
                    permit = pool.clone().acquire_owned() => {
                        permit.expect("job pool semaphore closed")
                    }
                    _ = shutdown.changed() => break 'poll,
                };

                let worker = self.clone();
                tokio::spawn(async move {
                    let _permit = permit;
                    ACTIVE_JOBS.inc();
                    worker.process(message).await;
                    ACTIVE_JOBS.dec();
                });
            }
        }

        info!("shutdown requested; draining in-flight jobs");
        let _drain = pool
            .acquire_many(max_jobs as u32)
            .await
            .expect("job pool semaphore closed");
        info!("worker stopped");

        Ok(())
    }

    /// Process one message end to end. Deletes the message only on success;
    /// any failure leaves it for the visibility timeout to redeliver and,
    /// eventually, for the queue's redrive policy to dead-letter.
    async fn process(&self, message: QueueMessage) {
        let parent = otel_config::extract_trace_context(&message.attributes);
        let span = info_span!("process-message", message_id = %message.message_id);
        span.set_parent(parent);

        let receipt_handle = message.receipt_handle.clone();
        match self.handle_message(&message).instrument(span).await {
            Ok(video_id) => match self.queue.delete(&receipt_handle).await {
                Ok(()) => {
                    JOBS_SUCCEEDED.inc();
                    info!(video_id, "job completed");
                }
                Err(err) => {
                    // The job finished but the delete did not: the message
                    // will redeliver and replay onto the same output keys.
                    JOBS_FAILED.with_label_values(&["queue"]).inc();
                    error!(video_id, error = %err, "queue delete failed");
                }
            },
            Err(err) => {
                JOBS_FAILED.with_label_values(&[err.category()]).inc();
                warn!(error = %err, "job failed; message left for redelivery");
            }
        }
    }

    async fn handle_message(&self, message: &QueueMessage) -> Result<String, WorkerError> {
        let job = parse_job(&message.body)?;
        debug!(video_id = %job.video_id, s3_key = %job.s3_key, "job received");

        let _heartbeat = VisibilityHeartbeat::spawn(
            self.queue.clone(),
            message.receipt_handle.clone(),
            self.config.queue_visibility,
        );

        if let Err(err) = self.run_pipeline(&job).await {
            // A shutdown mid-job is not a job failure: the record stays in
            // processing and the redelivered message resumes it.
            if !matches!(err, WorkerError::Canceled | WorkerError::FfmpegCanceled) {
                self.mark_failed(&job.video_id, &err).await;
            }
            return Err(err);
        }

        Ok(job.video_id)
    }

    /// The per-job state machine: download, transcode, quality check,
    /// master playlist, upload, commit. Temp artifacts are tied to drop
    /// guards so cleanup runs on every exit path, panics included.
    async fn run_pipeline(&self, job: &VideoJob) -> Result<(), WorkerError> {
        // Best-effort: the metadata store is non-authoritative for
        // progression, so a failed processing write only logs.
        if let Some(repo) = &self.repo {
            if let Err(err) = repo.update_video_processing(&job.video_id).await {
                warn!(video_id = %job.video_id, error = %err, "processing status write failed");
            }
        }

        self.check_canceled()?;
        let stage = Instant::now();
        let input = self.downloader.download(job).await?;
        let _input_guard = TempFileGuard(input.clone());
        STAGE_DURATION_SECONDS
            .with_label_values(&["download"])
            .observe(stage.elapsed().as_secs_f64());

        self.check_canceled()?;
        let hls_dir = self.config.temp_hls_dir.join(&job.video_id);
        create_output_directories(&hls_dir, &self.config.presets)?;
        let _hls_guard = TempDirGuard(hls_dir.clone());

        let stage = Instant::now();
        self.transcoder
            .transcode(&input, &hls_dir, &self.config.presets, &self.shutdown)
            .await?;
        STAGE_DURATION_SECONDS
            .with_label_values(&["transcode"])
            .observe(stage.elapsed().as_secs_f64());

        let stage = Instant::now();
        calculate_quality_metrics(&input, &hls_dir).await;
        STAGE_DURATION_SECONDS
            .with_label_values(&["quality"])
            .observe(stage.elapsed().as_secs_f64());

        generate_master_playlist(&hls_dir, &self.config.presets)?;

        self.check_canceled()?;
        let stage = Instant::now();
        self.uploader.upload(&job.video_id, &hls_dir).await?;
        STAGE_DURATION_SECONDS
            .with_label_values(&["upload"])
            .observe(stage.elapsed().as_secs_f64());

        // The artifacts are durable at this point, so a failed commit only
        // logs; the record is repaired on the next successful redelivery.
        if let Some(repo) = &self.repo {
            let stage = Instant::now();
            let playback_url = hls_core::playback_url(&self.config.cdn_domain, &job.video_id);
            let hls_prefix = hls_core::hls_prefix(&job.video_id);
            if let Err(err) = repo
                .complete_video_processing(
                    &job.video_id,
                    &playback_url,
                    &hls_prefix,
                    &self.config.presets,
                )
                .await
            {
                warn!(video_id = %job.video_id, error = %err, "metadata commit failed");
            }
            STAGE_DURATION_SECONDS
                .with_label_values(&["commit"])
                .observe(stage.elapsed().as_secs_f64());
        }

        Ok(())
    }

    #[instrument(skip_all, fields(video_id = %video_id))]
    async fn mark_failed(&self, video_id: &str, err: &WorkerError) {
        if let Some(repo) = &self.repo {
            if let Err(meta_err) = repo.fail_video_processing(video_id, &err.to_string()).await {
                warn!(video_id, error = %meta_err, "failed status write failed");
            }
        }
    }

    fn check_canceled(&self) -> Result<(), WorkerError> {
        if *self.shutdown.borrow() {
            Err(WorkerError::Canceled)
        } else {
            Ok(())
        }
    }
}

fn parse_job(body: &str) -> Result<VideoJob, WorkerError> {
    if body.trim().is_empty() {
        return Err(WorkerError::JobParseFailed("empty message body".to_string()));
    }
    let job: VideoJob =
        serde_json::from_str(body).map_err(|e| WorkerError::JobParseFailed(e.to_string()))?;
    job.validate()
        .map_err(|e| WorkerError::JobParseFailed(e.to_string()))?;
    Ok(job)
}

/// Extends the message's visibility every third of the timeout while the
/// job is in flight. Aborted on drop, so a finished or failed job stops
/// extending and the normal delete/redeliver path takes over.
struct VisibilityHeartbeat {
    handle: JoinHandle<()>,
}

impl VisibilityHeartbeat {
    fn spawn(queue: SqsClient, receipt_handle: String, visibility: Duration) -> Self {
        let interval = visibility / 3;
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // immediate first tick
            loop {
                ticker.tick().await;
                if let Err(err) = queue.change_visibility(&receipt_handle, visibility).await {
                    warn!(error = %err, "visibility extension failed");
                }
            }
        });
        Self { handle }
    }
}

impl Drop for VisibilityHeartbeat {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

struct TempFileGuard(PathBuf);

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

struct TempDirGuard(PathBuf);

impl Drop for TempDirGuard {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_job_empty_body() {
        assert!(matches!(
            parse_job(""),
            Err(WorkerError::JobParseFailed(_))
        ));
        assert!(matches!(
            parse_job("   "),
            Err(WorkerError::JobParseFailed(_))
        ));
    }

    #[test]
    fn test_parse_job_bad_json() {
        assert!(matches!(
            parse_job("{not json"),
            Err(WorkerError::JobParseFailed(_))
        ));
    }

    #[test]
    fn test_parse_job_missing_field_fails_validation() {
        let body = r#"{"videoId":"v1","s3Key":"","bucket":"b","filename":"f.mp4"}"#;
        assert!(matches!(
            parse_job(body),
            Err(WorkerError::JobParseFailed(_))
        ));
    }

    #[test]
    fn test_parse_job_ok() {
        let body =
            r#"{"videoId":"v1","s3Key":"uploads/v1.mp4","bucket":"b","filename":"f.mp4"}"#;
        let job = parse_job(body).unwrap();
        assert_eq!(job.video_id, "v1");
        assert_eq!(job.s3_key, "uploads/v1.mp4");
    }

    #[test]
    fn test_temp_guards_remove_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("input.mp4");
        std::fs::write(&file, [0u8; 8]).unwrap();
        {
            let _guard = TempFileGuard(file.clone());
        }
        assert!(!file.exists());

        let tree = dir.path().join("v1");
        std::fs::create_dir_all(tree.join("720p")).unwrap();
        std::fs::write(tree.join("720p/seg_000.ts"), [0u8; 8]).unwrap();
        {
            let _guard = TempDirGuard(tree.clone());
        }
        assert!(!tree.exists());
    }
}
