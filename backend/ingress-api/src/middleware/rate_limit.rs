//! Login failure rate limiting
//!
//! Failed login attempts are tracked per client IP in a sliding window.
//! Hitting the cap rejects further attempts until old failures age out of
//! the window; a successful login clears the counter immediately. A
//! background ticker prunes idle entries so the map cannot grow without
//! bound.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use actix_web::HttpRequest;
use tokio::task::JoinHandle;
use tracing::debug;

const MAX_FAILURES: usize = 5;
const WINDOW: Duration = Duration::from_secs(15 * 60);
const CLEANUP_INTERVAL: Duration = Duration::from_secs(5 * 60);

pub struct LoginRateLimiter {
    attempts: Arc<Mutex<HashMap<String, Vec<Instant>>>>,
    max_failures: usize,
    window: Duration,
    cleanup: Mutex<Option<JoinHandle<()>>>,
}

impl LoginRateLimiter {
    /// Create the limiter and start its cleanup ticker. Must run inside a
    /// tokio runtime.
    pub fn new() -> Arc<Self> {
        Self::with_limits(MAX_FAILURES, WINDOW, CLEANUP_INTERVAL)
    }

    pub fn with_limits(
        max_failures: usize,
        window: Duration,
        cleanup_interval: Duration,
    ) -> Arc<Self> {
        let attempts: Arc<Mutex<HashMap<String, Vec<Instant>>>> =
            Arc::new(Mutex::new(HashMap::new()));

        let cleanup_attempts = attempts.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(cleanup_interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let mut map = cleanup_attempts.lock().expect("rate limiter poisoned");
                map.retain(|_, failures| {
                    failures.retain(|t| t.elapsed() < window);
                    !failures.is_empty()
                });
                debug!(tracked_ips = map.len(), "rate limiter cleanup");
            }
        });

        Arc::new(Self {
            attempts,
            max_failures,
            window,
            cleanup: Mutex::new(Some(handle)),
        })
    }

    /// True when the client has reached the failure cap within the window.
    pub fn is_limited(&self, client: &str) -> bool {
        let mut map = self.attempts.lock().expect("rate limiter poisoned");
        match map.get_mut(client) {
            Some(failures) => {
                failures.retain(|t| t.elapsed() < self.window);
                failures.len() >= self.max_failures
            }
            None => false,
        }
    }

    pub fn record_failure(&self, client: &str) {
        let mut map = self.attempts.lock().expect("rate limiter poisoned");
        map.entry(client.to_string())
            .or_default()
            .push(Instant::now());
    }

    /// A successful login clears the client's failure history.
    pub fn record_success(&self, client: &str) {
        let mut map = self.attempts.lock().expect("rate limiter poisoned");
        map.remove(client);
    }

    /// Stop the cleanup ticker. One-shot: later calls are no-ops.
    pub fn stop(&self) {
        if let Some(handle) = self
            .cleanup
            .lock()
            .expect("rate limiter poisoned")
            .take()
        {
            handle.abort();
        }
    }
}

/// Client IP for rate limiting: first X-Forwarded-For token, then
/// X-Real-IP, then the socket peer address.
pub fn client_ip(req: &HttpRequest) -> String {
    if let Some(forwarded) = req
        .headers()
        .get("X-Forwarded-For")
        .and_then(|v| v.to_str().ok())
    {
        if let Some(first) = forwarded
            .split(',')
            .next()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            return first.to_string();
        }
    }

    if let Some(real_ip) = req
        .headers()
        .get("X-Real-IP")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        return real_ip.to_string();
    }

    req.peer_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[tokio::test]
    async fn test_limit_hits_on_fifth_failure() {
        let limiter = LoginRateLimiter::with_limits(5, WINDOW, CLEANUP_INTERVAL);
        for _ in 0..4 {
            limiter.record_failure("1.2.3.4");
        }
        assert!(!limiter.is_limited("1.2.3.4"));

        limiter.record_failure("1.2.3.4");
        assert!(limiter.is_limited("1.2.3.4"));
        limiter.stop();
    }

    #[tokio::test]
    async fn test_success_clears_counter() {
        let limiter = LoginRateLimiter::with_limits(5, WINDOW, CLEANUP_INTERVAL);
        for _ in 0..5 {
            limiter.record_failure("1.2.3.4");
        }
        assert!(limiter.is_limited("1.2.3.4"));

        limiter.record_success("1.2.3.4");
        assert!(!limiter.is_limited("1.2.3.4"));
        limiter.stop();
    }

    #[tokio::test]
    async fn test_clients_are_independent() {
        let limiter = LoginRateLimiter::with_limits(5, WINDOW, CLEANUP_INTERVAL);
        for _ in 0..5 {
            limiter.record_failure("1.1.1.1");
        }
        assert!(limiter.is_limited("1.1.1.1"));
        assert!(!limiter.is_limited("2.2.2.2"));
        limiter.stop();
    }

    #[tokio::test]
    async fn test_failures_age_out() {
        let limiter =
            LoginRateLimiter::with_limits(2, Duration::from_millis(50), CLEANUP_INTERVAL);
        limiter.record_failure("1.2.3.4");
        limiter.record_failure("1.2.3.4");
        assert!(limiter.is_limited("1.2.3.4"));

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(!limiter.is_limited("1.2.3.4"));
        limiter.stop();
    }

    #[tokio::test]
    async fn test_stop_is_one_shot() {
        let limiter = LoginRateLimiter::with_limits(5, WINDOW, CLEANUP_INTERVAL);
        limiter.stop();
        limiter.stop();
    }

    #[tokio::test]
    async fn test_client_ip_precedence() {
        let req = TestRequest::default()
            .insert_header(("X-Forwarded-For", "10.1.2.3, 172.16.0.1"))
            .insert_header(("X-Real-IP", "192.168.9.9"))
            .to_http_request();
        assert_eq!(client_ip(&req), "10.1.2.3");

        let req = TestRequest::default()
            .insert_header(("X-Real-IP", "192.168.9.9"))
            .to_http_request();
        assert_eq!(client_ip(&req), "192.168.9.9");

        let req = TestRequest::default().to_http_request();
        assert_eq!(client_ip(&req), "unknown");
    }
}
