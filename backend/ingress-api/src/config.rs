//! API configuration loaded from environment variables

use std::time::Duration;

/// Fatal configuration errors; the process exits 1 on any of these.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
}

#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub aws_region: String,
    pub raw_bucket: String,
    pub queue_url: String,
    pub metadata_table: String,
    pub port: u16,
    pub environment: String,
    pub api_username: String,
    pub api_password: String,
    pub jwt_secret: String,
    pub cors_allowed_origins: Vec<String>,
    pub presign_ttl: Duration,
    /// JSON body cap for init/complete; oversize bodies get 413.
    pub max_body_bytes: usize,
    pub header_timeout: Duration,
    /// actix-web 4 has no per-phase read/write body timeout; the connection
    /// disconnect timeout is the closest enforceable knob for slow writers.
    pub write_timeout: Duration,
    pub idle_timeout: Duration,
    pub shutdown_timeout: Duration,
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = std::env::var("ENV").unwrap_or_else(|_| "development".to_string());
        let production = is_production(&environment);

        Ok(Self {
            aws_region: std::env::var("AWS_REGION").unwrap_or_else(|_| "us-west-2".to_string()),
            raw_bucket: required("S3_BUCKET")?,
            queue_url: required("SQS_QUEUE_URL")?,
            metadata_table: required("DYNAMODB_TABLE")?,
            port: parse_var("PORT", 8080),
            api_username: credential("API_USERNAME", "admin", production)?,
            api_password: credential("API_PASSWORD", "admin", production)?,
            jwt_secret: credential(
                "JWT_SECRET",
                "local-development-secret-not-for-prod",
                production,
            )?,
            cors_allowed_origins: std::env::var("CORS_ALLOWED_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            presign_ttl: Duration::from_secs(parse_var("UPLOAD_URL_TTL_SECONDS", 600)),
            max_body_bytes: 1024 * 1024,
            header_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(300),
            idle_timeout: Duration::from_secs(120),
            shutdown_timeout: Duration::from_secs(30),
            environment,
        })
    }

    pub fn is_production(&self) -> bool {
        is_production(&self.environment)
    }
}

fn is_production(environment: &str) -> bool {
    environment.eq_ignore_ascii_case("prod") || environment.eq_ignore_ascii_case("production")
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(name))
}

/// Credentials fall back to a development default outside production and
/// are hard-required in it.
fn credential(
    name: &'static str,
    dev_default: &str,
    production: bool,
) -> Result<String, ConfigError> {
    match std::env::var(name).ok().filter(|v| !v.is_empty()) {
        Some(value) => Ok(value),
        None if production => Err(ConfigError::Missing(name)),
        None => Ok(dev_default.to_string()),
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_production() {
        assert!(is_production("prod"));
        assert!(is_production("Production"));
        assert!(!is_production("development"));
        assert!(!is_production("staging"));
    }

    #[test]
    fn test_credential_dev_fallback() {
        assert_eq!(
            credential("NOT_SET_VAR_123", "fallback", false).unwrap(),
            "fallback"
        );
        assert!(credential("NOT_SET_VAR_123", "fallback", true).is_err());
    }
}
