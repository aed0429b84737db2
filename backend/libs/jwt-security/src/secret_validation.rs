//! Secret strength checks run once at startup

const MIN_SECRET_LENGTH: usize = 32; // 256 bits

/// Startup-time secret failures. Fatal in production.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SecretError {
    #[error("JWT secret is not set")]
    MissingSecret,
    #[error("JWT secret too short: {0} bytes, minimum {MIN_SECRET_LENGTH}")]
    SecretTooShort(usize),
    #[error("JWT secret is a single repeated byte")]
    DegenerateSecret,
}

/// Validate the shared secret.
///
/// In production a short or degenerate secret is rejected outright. Outside
/// production the same findings are logged as warnings so local setups with
/// throwaway secrets still boot.
pub fn validate_secret(secret: &str, production: bool) -> Result<(), SecretError> {
    let finding = check(secret);
    match finding {
        Ok(()) => Ok(()),
        Err(err) if production => Err(err),
        Err(err) => {
            tracing::warn!("weak JWT secret accepted outside production: {err}");
            Ok(())
        }
    }
}

fn check(secret: &str) -> Result<(), SecretError> {
    let bytes = secret.as_bytes();
    if bytes.is_empty() {
        return Err(SecretError::MissingSecret);
    }
    if bytes.len() < MIN_SECRET_LENGTH {
        return Err(SecretError::SecretTooShort(bytes.len()));
    }
    if bytes.iter().all(|b| *b == bytes[0]) {
        return Err(SecretError::DegenerateSecret);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_secret() {
        assert_eq!(validate_secret("", true), Err(SecretError::MissingSecret));
    }

    #[test]
    fn test_short_secret_fatal_in_prod() {
        assert_eq!(
            validate_secret("short", true),
            Err(SecretError::SecretTooShort(5))
        );
    }

    #[test]
    fn test_short_secret_tolerated_in_dev() {
        assert_eq!(validate_secret("dev-secret", false), Ok(()));
    }

    #[test]
    fn test_repeated_byte_secret() {
        let degenerate = "a".repeat(64);
        assert_eq!(
            validate_secret(&degenerate, true),
            Err(SecretError::DegenerateSecret)
        );
    }

    #[test]
    fn test_acceptable_secret() {
        assert_eq!(
            validate_secret("J8Kq2mPvRx4TnZs9YwLcGf7DhBe3Xa6W", true),
            Ok(())
        );
    }
}
