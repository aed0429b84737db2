//! Shared application state

use std::sync::Arc;
use std::time::Instant;

use jwt_security::JwtManager;
use metadata_store::VideoRepository;
use s3_utils::S3Client;
use sqs_utils::SqsClient;
use tokio::sync::Mutex;

use crate::config::ApiConfig;
use crate::middleware::rate_limit::LoginRateLimiter;

#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub s3: S3Client,
    pub queue: SqsClient,
    pub repo: VideoRepository,
    pub jwt: Arc<JwtManager>,
    pub login_limiter: Arc<LoginRateLimiter>,
    /// Timestamp of the last deep health probe, for its 1-per-10s limit.
    pub deep_health_last: Arc<Mutex<Option<Instant>>>,
}
