//! Upload request validation

use std::path::Path;

use crate::error::ApiError;

pub const MAX_FILENAME_LENGTH: usize = 255;

pub const ALLOWED_EXTENSIONS: [&str; 5] = ["mp4", "mov", "avi", "mkv", "webm"];

pub const ALLOWED_CONTENT_TYPES: [&str; 5] = [
    "video/mp4",
    "video/quicktime",
    "video/x-msvideo",
    "video/x-matroska",
    "video/webm",
];

/// Lowercased extension of a filename, without the dot.
pub fn file_extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Filename: non-empty, at most 255 characters, allowed video extension
/// (case-insensitive).
pub fn validate_filename(filename: &str) -> Result<(), ApiError> {
    if filename.is_empty() {
        return Err(ApiError::BadRequest("filename is required".to_string()));
    }
    if filename.chars().count() > MAX_FILENAME_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "filename too long: maximum {MAX_FILENAME_LENGTH} characters"
        )));
    }
    match file_extension(filename) {
        Some(ext) if ALLOWED_EXTENSIONS.contains(&ext.as_str()) => Ok(()),
        _ => Err(ApiError::BadRequest(format!(
            "invalid file type: allowed extensions are {}",
            ALLOWED_EXTENSIONS.join(", ")
        ))),
    }
}

/// Content type must be an exact member of the allow-list.
pub fn validate_content_type(content_type: &str) -> Result<(), ApiError> {
    if ALLOWED_CONTENT_TYPES.contains(&content_type) {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!(
            "invalid content type: {content_type}"
        )))
    }
}

/// Validate the S3 key reported at upload-complete and return its decoded
/// form.
///
/// The key is URL-decoded before checking; `..` is rejected in both the raw
/// and decoded forms so percent-encoded traversal cannot slip through. The
/// decoded key must sit directly under `uploads/<videoId>` and carry an
/// allowed extension.
pub fn validate_upload_key(key: &str, video_id: &str) -> Result<String, ApiError> {
    let decoded = urlencoding::decode(key)
        .map_err(|_| ApiError::BadRequest("invalid key format: bad encoding".to_string()))?
        .into_owned();

    if key.contains("..") || decoded.contains("..") {
        return Err(ApiError::BadRequest(
            "invalid key format: path traversal not allowed".to_string(),
        ));
    }

    let expected_prefix = format!("uploads/{video_id}");
    if !decoded.starts_with(&expected_prefix) {
        return Err(ApiError::BadRequest(
            "invalid key format: key does not match upload prefix".to_string(),
        ));
    }

    match file_extension(&decoded) {
        Some(ext) if ALLOWED_EXTENSIONS.contains(&ext.as_str()) => Ok(decoded),
        _ => Err(ApiError::BadRequest(
            "invalid key format: disallowed extension".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filename_boundaries() {
        // Exactly 255 characters with a valid extension is accepted.
        let name_255 = format!("{}.mp4", "a".repeat(251));
        assert_eq!(name_255.chars().count(), 255);
        assert!(validate_filename(&name_255).is_ok());

        // 256 characters is rejected.
        let name_256 = format!("{}.mp4", "a".repeat(252));
        assert!(validate_filename(&name_256).is_err());

        assert!(validate_filename("").is_err());
    }

    #[test]
    fn test_filename_extension_case_insensitive() {
        assert!(validate_filename("clip.MP4").is_ok());
        assert!(validate_filename("clip.MoV").is_ok());
        assert!(validate_filename("clip.exe").is_err());
        assert!(validate_filename("noextension").is_err());
    }

    #[test]
    fn test_content_type_exact_match() {
        for ct in ALLOWED_CONTENT_TYPES {
            assert!(validate_content_type(ct).is_ok());
        }
        assert!(validate_content_type("video/mp4; codecs=avc1").is_err());
        assert!(validate_content_type("VIDEO/MP4").is_err());
        assert!(validate_content_type("application/octet-stream").is_err());
    }

    #[test]
    fn test_upload_key_happy_path() {
        let decoded = validate_upload_key("uploads/v1.mp4", "v1").unwrap();
        assert_eq!(decoded, "uploads/v1.mp4");
    }

    #[test]
    fn test_upload_key_traversal_rejected() {
        let err = validate_upload_key("uploads/../v1.mp4", "v1").unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid key format: path traversal not allowed"
        );
    }

    #[test]
    fn test_upload_key_encoded_traversal_rejected() {
        let err = validate_upload_key("uploads/%2e%2e/v1.mp4", "v1").unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid key format: path traversal not allowed"
        );
    }

    #[test]
    fn test_upload_key_prefix_mismatch() {
        assert!(validate_upload_key("other/v1.mp4", "v1").is_err());
        assert!(validate_upload_key("uploads/v2.mp4", "v1").is_err());
    }

    #[test]
    fn test_upload_key_extension() {
        assert!(validate_upload_key("uploads/v1.exe", "v1").is_err());
        assert!(validate_upload_key("uploads/v1.webm", "v1").is_ok());
    }
}
