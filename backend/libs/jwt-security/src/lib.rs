//! JWT issue/validate for the ingress API
//!
//! HS256 tokens for the single configured operator credential. Secret
//! strength is enforced at startup (see [`secret_validation`]); token
//! validation pins the signing method to HMAC and checks `exp`, `nbf`,
//! and `iat` with a small leeway.

use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, decode_header, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};

pub mod secret_validation;

pub use secret_validation::{validate_secret, SecretError};

const TOKEN_TTL_HOURS: i64 = 24;
const VALIDATION_LEEWAY_SECS: u64 = 30;
const MAX_IAT_FUTURE_SKEW_SECS: i64 = 300;

/// Token issuer name baked into every JWT.
pub const ISSUER: &str = "hls-pipeline";

/// Token validation failures.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("missing Authorization header")]
    MissingAuthHeader,
    #[error("invalid Authorization header format")]
    InvalidAuthFormat,
    #[error("invalid token: {0}")]
    InvalidToken(String),
    #[error("token carries an empty username")]
    EmptyUsername,
}

/// JWT claims for an authenticated operator session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub username: String,
    pub iss: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
    pub jti: String,
}

/// HS256 token mint/validate handle.
#[derive(Clone)]
pub struct JwtManager {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl JwtManager {
    /// Build from a shared secret. `production` tightens the strength
    /// check; a weak secret is a fatal startup error either way the caller
    /// chooses to treat it.
    pub fn new(secret: &str, production: bool) -> Result<Self, SecretError> {
        validate_secret(secret, production)?;
        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        })
    }

    /// Mint a token for `username`, valid for 24 hours.
    pub fn issue_token(&self, username: &str) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = Claims {
            sub: username.to_string(),
            username: username.to_string(),
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: (now + Duration::hours(TOKEN_TTL_HOURS)).timestamp(),
            jti: now.timestamp_nanos_opt().unwrap_or_default().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::InvalidToken(e.to_string()))
    }

    /// Validate a token and return its claims.
    pub fn validate_token(&self, token: &str) -> Result<Claims, TokenError> {
        // The signing method must be HMAC before the signature is checked;
        // an RS256 header with our secret as a "public key" must not pass.
        let header =
            decode_header(token).map_err(|e| TokenError::InvalidToken(e.to_string()))?;
        if !matches!(
            header.alg,
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
        ) {
            return Err(TokenError::InvalidToken(format!(
                "unexpected signing method {:?}",
                header.alg
            )));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.leeway = VALIDATION_LEEWAY_SECS;

        let data = decode::<Claims>(token, &self.decoding, &validation)
            .map_err(|e| TokenError::InvalidToken(e.to_string()))?;

        let claims = data.claims;
        if claims.iat > Utc::now().timestamp() + MAX_IAT_FUTURE_SKEW_SECS {
            return Err(TokenError::InvalidToken("token issued in the future".to_string()));
        }
        if claims.username.trim().is_empty() {
            return Err(TokenError::EmptyUsername);
        }

        Ok(claims)
    }
}

/// Pull the raw token out of an `Authorization: Bearer <jwt>` header value.
pub fn parse_bearer(header: Option<&str>) -> Result<&str, TokenError> {
    let header = header.ok_or(TokenError::MissingAuthHeader)?;
    let token = header
        .strip_prefix("Bearer ")
        .ok_or(TokenError::InvalidAuthFormat)?;
    if token.is_empty() {
        return Err(TokenError::InvalidAuthFormat);
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_SECRET: &str = "J8Kq2mPvRx4TnZs9YwLcGf7DhBe3Xa6W";

    fn manager() -> JwtManager {
        JwtManager::new(TEST_SECRET, true).unwrap()
    }

    #[test]
    fn test_issue_and_validate() {
        let manager = manager();
        let token = manager.issue_token("admin").unwrap();
        let claims = manager.validate_token(&token).unwrap();
        assert_eq!(claims.username, "admin");
        assert_eq!(claims.sub, "admin");
        assert_eq!(claims.iss, ISSUER);
        assert!(!claims.jti.is_empty());
        assert_eq!(claims.exp - claims.iat, TOKEN_TTL_HOURS * 3600);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = manager().issue_token("admin").unwrap();
        let other = JwtManager::new("Wq7pLm3kVx9BnRt2SdYf5ChJa8Ze4Xg6", true).unwrap();
        assert!(matches!(
            other.validate_token(&token),
            Err(TokenError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_expired_token_rejected() {
        let manager = manager();
        let now = Utc::now();
        let claims = Claims {
            sub: "admin".to_string(),
            username: "admin".to_string(),
            iss: ISSUER.to_string(),
            iat: (now - Duration::hours(48)).timestamp(),
            nbf: (now - Duration::hours(48)).timestamp(),
            exp: (now - Duration::hours(24)).timestamp(),
            jti: "1".to_string(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
        )
        .unwrap();

        assert!(matches!(
            manager.validate_token(&token),
            Err(TokenError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_empty_username_rejected() {
        let manager = manager();
        let now = Utc::now();
        let claims = Claims {
            sub: String::new(),
            username: "  ".to_string(),
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: (now + Duration::hours(1)).timestamp(),
            jti: "1".to_string(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
        )
        .unwrap();

        assert_eq!(manager.validate_token(&token), Err(TokenError::EmptyUsername));
    }

    #[test]
    fn test_parse_bearer() {
        assert_eq!(parse_bearer(Some("Bearer abc")), Ok("abc"));
        assert_eq!(parse_bearer(None), Err(TokenError::MissingAuthHeader));
        assert_eq!(
            parse_bearer(Some("Basic dXNlcjpwYXNz")),
            Err(TokenError::InvalidAuthFormat)
        );
        assert_eq!(parse_bearer(Some("Bearer ")), Err(TokenError::InvalidAuthFormat));
    }
}
