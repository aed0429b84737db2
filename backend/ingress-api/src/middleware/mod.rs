pub mod jwt_auth;
pub mod metrics;
pub mod rate_limit;
pub mod request_id;

pub use jwt_auth::{AuthenticatedUser, JwtAuthMiddleware};
pub use metrics::MetricsMiddleware;
pub use rate_limit::{client_ip, LoginRateLimiter};
pub use request_id::{request_id, RequestIdMiddleware};
