//! Best-effort SSIM quality check
//!
//! Compares a frame of the 720p rendition against the same frame of the
//! source, scaled to 720p. Never fatal: any failure logs a warning and the
//! job proceeds. Frame PNGs are removed on every path.

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, instrument, warn};

use crate::metrics::SSIM_SCORE;

const FFMPEG_BIN: &str = "ffmpeg";
const FRAME_TIMESTAMP: &str = "00:00:01";

/// Extract reference and distorted frames, run the SSIM filter, and publish
/// the score as a gauge labelled `720p_vs_source`.
#[instrument(name = "calculate-quality", skip_all)]
pub async fn calculate_quality_metrics(input: &Path, hls_dir: &Path) {
    let ref_frame = hls_dir.join("ref_frame.png");
    let dist_frame = hls_dir.join("dist_frame.png");

    let result = run_comparison(input, hls_dir, &ref_frame, &dist_frame).await;

    let _ = tokio::fs::remove_file(&ref_frame).await;
    let _ = tokio::fs::remove_file(&dist_frame).await;

    match result {
        Some(score) => {
            SSIM_SCORE.with_label_values(&["720p_vs_source"]).set(score);
            debug!(score, "ssim computed");
        }
        None => warn!("ssim calculation skipped"),
    }
}

async fn run_comparison(
    input: &Path,
    hls_dir: &Path,
    ref_frame: &Path,
    dist_frame: &Path,
) -> Option<f64> {
    // Reference frame from the source, scaled to the 720p raster.
    if !extract_frame(input, ref_frame, true).await {
        return None;
    }

    // Distorted frame from the 720p rendition playlist.
    let playlist = hls_dir.join("720p").join("playlist.m3u8");
    if !extract_frame(&playlist, dist_frame, false).await {
        return None;
    }

    let output = Command::new(FFMPEG_BIN)
        .args([
            "-hide_banner",
            "-i",
            &ref_frame.display().to_string(),
            "-i",
            &dist_frame.display().to_string(),
            "-lavfi",
            "ssim",
            "-f",
            "null",
            "-",
        ])
        .stdin(Stdio::null())
        .output()
        .await
        .ok()?;

    // The SSIM summary lands on stderr; take both streams to be safe.
    let mut combined = String::from_utf8_lossy(&output.stderr).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stdout));
    parse_ssim_output(&combined)
}

async fn extract_frame(source: &Path, target: &Path, scale: bool) -> bool {
    let mut args = vec![
        "-hide_banner".to_string(),
        "-y".to_string(),
        "-ss".to_string(),
        FRAME_TIMESTAMP.to_string(),
        "-i".to_string(),
        source.display().to_string(),
        "-vframes".to_string(),
        "1".to_string(),
    ];
    if scale {
        args.push("-vf".to_string());
        args.push("scale=1280:720".to_string());
    }
    args.push(target.display().to_string());

    match Command::new(FFMPEG_BIN)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
    {
        Ok(status) if status.success() => true,
        Ok(status) => {
            warn!(source = %source.display(), %status, "frame extraction failed");
            false
        }
        Err(err) => {
            warn!(source = %source.display(), error = %err, "frame extraction failed");
            false
        }
    }
}

/// Parse the float following the literal `All:` in ffmpeg's SSIM summary.
fn parse_ssim_output(output: &str) -> Option<f64> {
    let rest = output.split("All:").nth(1)?;
    let token: String = rest
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    token.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ssim_output() {
        let line = "[Parsed_ssim_0 @ 0x7f] SSIM Y:0.981 U:0.992 V:0.991 All:0.984567 (18.12)";
        assert_eq!(parse_ssim_output(line), Some(0.984567));
    }

    #[test]
    fn test_parse_ssim_output_trailing_paren() {
        assert_eq!(parse_ssim_output("All:1.000000 (inf)"), Some(1.0));
    }

    #[test]
    fn test_parse_ssim_output_missing_marker() {
        assert_eq!(parse_ssim_output("no summary here"), None);
        assert_eq!(parse_ssim_output("All:"), None);
    }
}
