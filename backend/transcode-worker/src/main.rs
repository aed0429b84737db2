//! Transcode Worker - queue consumer
//!
//! Drains the transcode job queue and produces HLS renditions in the
//! processed bucket. Exits 0 on a clean drain after SIGINT/SIGTERM, 1 on
//! fatal configuration or dependency init failure.

use metadata_store::VideoRepository;
use otel_config::TracingConfig;
use s3_utils::S3Client;
use sqs_utils::SqsClient;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tracing::{error, info};
use transcode_worker::downloader::Downloader;
use transcode_worker::transcoder::Transcoder;
use transcode_worker::uploader::Uploader;
use transcode_worker::{metrics, Worker, WorkerConfig};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let config = match WorkerConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("configuration error: {err}");
            std::process::exit(1);
        }
    };

    let tracing_config = TracingConfig::from_env(&config.environment);
    if let Err(err) = otel_config::init_tracing("transcode-worker", &tracing_config) {
        eprintln!("tracing init failed: {err}");
        std::process::exit(1);
    }

    let aws_config = aws_config::load_from_env().await;
    let s3 = S3Client::from_client(aws_sdk_s3::Client::new(&aws_config));
    let queue = SqsClient::from_client(
        aws_sdk_sqs::Client::new(&aws_config),
        config.queue_url.clone(),
    );
    let repo = config.metadata_table.clone().map(|table| {
        VideoRepository::from_client(aws_sdk_dynamodb::Client::new(&aws_config), table)
    });
    if repo.is_none() {
        info!("DYNAMODB_TABLE not set; metadata writes disabled");
    }

    let downloader = Downloader::new(s3.clone(), config.temp_upload_dir.clone());
    let transcoder = Transcoder::new(
        config.segment_seconds,
        config.require_audio,
        config.transcode_timeout,
    );
    let uploader = Uploader::new(
        s3.clone(),
        config.processed_bucket.clone(),
        config.upload_concurrency,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(err) => {
                error!(error = %err, "failed to install SIGTERM handler");
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("SIGINT received"),
            _ = sigterm.recv() => info!("SIGTERM received"),
        }
        let _ = shutdown_tx.send(true);
    });

    let metrics_port = config.metrics_port;
    std::thread::spawn(move || {
        actix_web::rt::System::new().block_on(async move {
            if let Err(err) = metrics::serve(metrics_port).await {
                error!(error = %err, "metrics listener failed");
            }
        });
    });

    let worker = Worker::new(
        config,
        queue,
        repo,
        downloader,
        transcoder,
        uploader,
        shutdown_rx,
    );

    let result = worker.run().await;
    otel_config::shutdown_tracing();

    if let Err(err) = result {
        error!(error = %err, "worker exited with error");
        std::process::exit(1);
    }
}
