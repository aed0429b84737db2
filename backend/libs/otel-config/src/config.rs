//! Tracing configuration loaded from the environment

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct TracingConfig {
    pub enabled: bool,
    pub otlp_endpoint: String,
    pub sample_rate: f64,
    pub service_version: String,
    pub environment: String,
}

impl TracingConfig {
    /// Read `OTEL_*` variables, defaulting to a localhost collector.
    pub fn from_env(environment: &str) -> Self {
        Self {
            enabled: std::env::var("OTEL_TRACES_ENABLED")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(true),
            otlp_endpoint: std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
                .unwrap_or_else(|_| "http://localhost:4317".to_string()),
            sample_rate: std::env::var("OTEL_TRACES_SAMPLER_ARG")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1.0),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            environment: environment.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TracingConfig {
            enabled: true,
            otlp_endpoint: "http://localhost:4317".to_string(),
            sample_rate: 1.0,
            service_version: "0.1.0".to_string(),
            environment: "development".to_string(),
        };
        assert!(config.enabled);
        assert_eq!(config.sample_rate, 1.0);
    }
}
