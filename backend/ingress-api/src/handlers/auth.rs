//! Login handler - HTTP Basic in, JWT out

use actix_web::{web, HttpRequest, HttpResponse};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{ApiError, Result};
use crate::middleware::client_ip;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub token_type: &'static str,
    pub expires_in: u64,
}

/// Validate HTTP Basic credentials against the configured pair and return
/// a bearer token. Failed attempts count against the client's sliding
/// window; a success clears it.
pub async fn login(state: web::Data<AppState>, req: HttpRequest) -> Result<HttpResponse> {
    let client = client_ip(&req);
    if state.login_limiter.is_limited(&client) {
        warn!(client = %client, "login rate limited");
        return Err(ApiError::RateLimited(
            "too many failed login attempts, try again later".to_string(),
        ));
    }

    let header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok());
    let (username, password) = parse_basic(header)?;

    if username != state.config.api_username || password != state.config.api_password {
        state.login_limiter.record_failure(&client);
        warn!(client = %client, "failed login attempt");
        return Err(ApiError::Unauthorized("invalid credentials".to_string()));
    }

    state.login_limiter.record_success(&client);
    let token = state
        .jwt
        .issue_token(&username)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    info!(username = %username, "login succeeded");
    Ok(HttpResponse::Ok().json(LoginResponse {
        token,
        token_type: "Bearer",
        expires_in: 24 * 3600,
    }))
}

fn parse_basic(header: Option<&str>) -> Result<(String, String)> {
    let header =
        header.ok_or_else(|| ApiError::Unauthorized("missing Authorization header".to_string()))?;
    let encoded = header
        .strip_prefix("Basic ")
        .ok_or_else(|| ApiError::Unauthorized("expected Basic authorization".to_string()))?;

    let decoded = STANDARD
        .decode(encoded)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .ok_or_else(|| ApiError::Unauthorized("malformed Basic credentials".to_string()))?;

    let (username, password) = decoded
        .split_once(':')
        .ok_or_else(|| ApiError::Unauthorized("malformed Basic credentials".to_string()))?;

    Ok((username.to_string(), password.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic() {
        let header = format!("Basic {}", STANDARD.encode("admin:s3cret"));
        let (user, pass) = parse_basic(Some(&header)).unwrap();
        assert_eq!(user, "admin");
        assert_eq!(pass, "s3cret");
    }

    #[test]
    fn test_parse_basic_password_with_colon() {
        let header = format!("Basic {}", STANDARD.encode("admin:pa:ss"));
        let (_, pass) = parse_basic(Some(&header)).unwrap();
        assert_eq!(pass, "pa:ss");
    }

    #[test]
    fn test_parse_basic_rejects_bearer() {
        assert!(parse_basic(Some("Bearer abc")).is_err());
        assert!(parse_basic(None).is_err());
        assert!(parse_basic(Some("Basic !!!")).is_err());
    }
}
