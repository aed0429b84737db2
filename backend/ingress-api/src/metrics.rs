//! Prometheus collectors and the guarded `/metrics` endpoint

use std::net::IpAddr;

use actix_web::{HttpRequest, HttpResponse};
use prometheus::{Encoder, HistogramVec, IntCounterVec, TextEncoder};

use crate::error::ApiError;

lazy_static::lazy_static! {
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = prometheus::register_int_counter_vec!(
        "http_requests_total",
        "Total HTTP requests",
        &["method", "path", "status"]
    ).unwrap();

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = prometheus::register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request latency",
        &["method", "path", "status"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    ).unwrap();

    pub static ref UPLOADS_INITIATED: IntCounterVec = prometheus::register_int_counter_vec!(
        "hls_uploads_total",
        "Upload protocol operations",
        &["phase"]
    ).unwrap();
}

/// Serve the Prometheus scrape, internal callers only.
///
/// Any request that traversed a proxy (X-Forwarded-For present) is refused;
/// direct connections must come from loopback or an RFC 1918 range.
pub async fn serve_metrics(req: HttpRequest) -> Result<HttpResponse, ApiError> {
    if req.headers().contains_key("X-Forwarded-For") {
        return Err(ApiError::Forbidden("metrics are internal-only".to_string()));
    }

    let allowed = req
        .peer_addr()
        .map(|addr| is_internal_addr(addr.ip()))
        .unwrap_or(false);
    if !allowed {
        return Err(ApiError::Forbidden("metrics are internal-only".to_string()));
    }

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer))
}

/// Loopback or RFC 1918 private ranges (plus the v6 unique-local block for
/// dual-stack pods).
pub fn is_internal_addr(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.octets()[0] == 10
                || (v4.octets()[0] == 172 && (16..=31).contains(&v4.octets()[1]))
                || (v4.octets()[0] == 192 && v4.octets()[1] == 168)
        }
        IpAddr::V6(v6) => v6.is_loopback() || (v6.segments()[0] & 0xfe00) == 0xfc00,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_ranges() {
        for addr in ["127.0.0.1", "10.0.0.5", "172.16.1.1", "172.31.255.1", "192.168.0.9"] {
            assert!(is_internal_addr(addr.parse().unwrap()), "{addr}");
        }
        assert!(is_internal_addr("::1".parse().unwrap()));
    }

    #[test]
    fn test_public_ranges_refused() {
        for addr in ["8.8.8.8", "172.32.0.1", "172.15.0.1", "193.168.0.1", "2001:db8::1"] {
            assert!(!is_internal_addr(addr.parse().unwrap()), "{addr}");
        }
    }
}
