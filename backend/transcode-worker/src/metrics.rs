//! Prometheus collectors and the worker metrics listener

use actix_web::{web, App, HttpResponse, HttpServer};
use prometheus::{Encoder, GaugeVec, HistogramVec, IntCounter, IntCounterVec, IntGauge, TextEncoder};

lazy_static::lazy_static! {
    pub static ref ACTIVE_JOBS: IntGauge = prometheus::register_int_gauge!(
        "hls_active_jobs",
        "Jobs currently being processed"
    ).unwrap();

    pub static ref JOBS_SUCCEEDED: IntCounter = prometheus::register_int_counter!(
        "hls_jobs_succeeded_total",
        "Jobs completed and deleted from the queue"
    ).unwrap();

    pub static ref JOBS_FAILED: IntCounterVec = prometheus::register_int_counter_vec!(
        "hls_jobs_failed_total",
        "Jobs that failed and were left for redelivery",
        &["category"]
    ).unwrap();

    pub static ref QUEUE_RECEIVE_ERRORS: IntCounter = prometheus::register_int_counter!(
        "hls_queue_receive_errors_total",
        "Long-poll receive failures"
    ).unwrap();

    pub static ref STAGE_DURATION_SECONDS: HistogramVec = prometheus::register_histogram_vec!(
        "hls_stage_duration_seconds",
        "Wall-clock duration of each pipeline stage",
        &["stage"],
        vec![0.1, 0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 900.0]
    ).unwrap();

    pub static ref SSIM_SCORE: GaugeVec = prometheus::register_gauge_vec!(
        "hls_ssim_score",
        "SSIM quality metric between output and source frames",
        &["comparison"]
    ).unwrap();
}

async fn render_metrics() -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(err.to_string());
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}

/// Run the metrics listener until the process exits. Signal handling is
/// owned by main, so the server's own handlers are disabled.
pub async fn serve(port: u16) -> std::io::Result<()> {
    HttpServer::new(|| App::new().route("/metrics", web::get().to(render_metrics)))
        .disable_signals()
        .workers(1)
        .bind(("0.0.0.0", port))?
        .run()
        .await
}
