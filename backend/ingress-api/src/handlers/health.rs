//! Liveness and deep health

use std::time::{Duration, Instant};

use actix_web::{web, HttpResponse};
use serde::Serialize;

use crate::error::{ApiError, Result};
use crate::state::AppState;

const COMPONENT_DEADLINE: Duration = Duration::from_secs(5);
const DEEP_HEALTH_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Serialize)]
#[serde(rename_all = "lowercase")]
enum ComponentStatus {
    Healthy,
    Unhealthy,
}

#[derive(Serialize)]
struct ComponentCheck {
    status: ComponentStatus,
    message: String,
    latency_ms: u64,
}

/// GET /health - liveness: 200 whenever the process is up.
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "service": "ingress-api",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /health/deep - probe the raw bucket and the queue.
///
/// Limited to one probe per 10 seconds so an aggressive checker cannot
/// turn health into load against the dependencies.
pub async fn deep_health(state: web::Data<AppState>) -> Result<HttpResponse> {
    {
        let mut last = state.deep_health_last.lock().await;
        if let Some(previous) = *last {
            if previous.elapsed() < DEEP_HEALTH_INTERVAL {
                return Err(ApiError::RateLimited(
                    "deep health is limited to one probe per 10 seconds".to_string(),
                ));
            }
        }
        *last = Some(Instant::now());
    }

    let bucket = state.config.raw_bucket.clone();

    let s3_start = Instant::now();
    let queue_start = Instant::now();
    let (s3_result, queue_result) = tokio::join!(
        state.s3.health_check(&bucket, COMPONENT_DEADLINE),
        state.queue.health_check(COMPONENT_DEADLINE),
    );

    let s3_check = match s3_result {
        Ok(()) => ComponentCheck {
            status: ComponentStatus::Healthy,
            message: "bucket reachable".to_string(),
            latency_ms: s3_start.elapsed().as_millis() as u64,
        },
        Err(err) => ComponentCheck {
            status: ComponentStatus::Unhealthy,
            message: err.to_string(),
            latency_ms: s3_start.elapsed().as_millis() as u64,
        },
    };
    let queue_check = match queue_result {
        Ok(()) => ComponentCheck {
            status: ComponentStatus::Healthy,
            message: "queue reachable".to_string(),
            latency_ms: queue_start.elapsed().as_millis() as u64,
        },
        Err(err) => ComponentCheck {
            status: ComponentStatus::Unhealthy,
            message: err.to_string(),
            latency_ms: queue_start.elapsed().as_millis() as u64,
        },
    };

    let healthy = matches!(s3_check.status, ComponentStatus::Healthy)
        && matches!(queue_check.status, ComponentStatus::Healthy);

    let body = serde_json::json!({
        "status": if healthy { "ok" } else { "degraded" },
        "checks": { "s3": s3_check, "sqs": queue_check },
    });

    if healthy {
        Ok(HttpResponse::Ok().json(body))
    } else {
        Ok(HttpResponse::ServiceUnavailable().json(body))
    }
}
