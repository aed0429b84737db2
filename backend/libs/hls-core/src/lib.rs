//! Core HLS pipeline types shared by the ingress API and the transcode worker
//!
//! Holds the job/record models, the rendition preset table, and the
//! master-playlist writer so both services agree on the wire format and the
//! output object layout.

pub mod models;
pub mod playlist;
pub mod presets;

pub use models::{JobValidationError, LatestPointer, VideoJob, VideoRecord, VideoStatus};
pub use playlist::{create_output_directories, generate_master_playlist};
pub use presets::{build_filter_complex, default_presets, Preset};

/// Object-key prefix that every HLS artifact for a video lives under.
///
/// `hls/<videoId>/...` is the durability contract: replaying a job must
/// produce a byte-identical keyspace, so nothing may append nondeterministic
/// suffixes to this prefix.
pub fn hls_prefix(video_id: &str) -> String {
    format!("hls/{}", video_id)
}

/// CDN playback URL for a video's master playlist.
pub fn playback_url(cdn_domain: &str, video_id: &str) -> String {
    format!(
        "https://{}/hls/{}/master.m3u8",
        cdn_domain.trim_end_matches('/'),
        video_id
    )
}

/// Content type for an HLS artifact, keyed on file extension.
pub fn content_type_for(key: &str) -> &'static str {
    if key.ends_with(".m3u8") {
        "application/vnd.apple.mpegurl"
    } else if key.ends_with(".ts") {
        "video/MP2T"
    } else {
        "application/octet-stream"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hls_prefix() {
        assert_eq!(hls_prefix("abc"), "hls/abc");
    }

    #[test]
    fn test_playback_url() {
        assert_eq!(
            playback_url("cdn.example.com", "abc"),
            "https://cdn.example.com/hls/abc/master.m3u8"
        );
        // Trailing slash on the domain must not double up.
        assert_eq!(
            playback_url("cdn.example.com/", "abc"),
            "https://cdn.example.com/hls/abc/master.m3u8"
        );
    }

    #[test]
    fn test_content_type_mapping() {
        assert_eq!(content_type_for("master.m3u8"), "application/vnd.apple.mpegurl");
        assert_eq!(content_type_for("720p/seg_000.ts"), "video/MP2T");
        assert_eq!(content_type_for("ref_frame.png"), "application/octet-stream");
    }
}
