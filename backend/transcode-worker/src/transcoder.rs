//! FFmpeg driver
//!
//! One ffmpeg invocation per job: the input video is split into one scaled
//! branch per preset by the filter graph, and each branch is encoded to an
//! independent HLS output under `<output_dir>/<preset>/`. The child process
//! is supervised with both pipes drained concurrently so it can never block
//! on a full pipe, and is killed on cancellation or on the per-job
//! wall-clock timeout.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use hls_core::{build_filter_complex, Preset};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::watch;
use tracing::{debug, instrument, warn};

use crate::error::WorkerError;

const FFMPEG_BIN: &str = "ffmpeg";

#[derive(Clone)]
pub struct Transcoder {
    segment_seconds: u32,
    require_audio: bool,
    timeout: Duration,
}

impl Transcoder {
    pub fn new(segment_seconds: u32, require_audio: bool, timeout: Duration) -> Self {
        Self {
            segment_seconds,
            require_audio,
            timeout,
        }
    }

    /// Transcode `input` into per-preset HLS renditions under `output_dir`.
    /// The per-preset directories must already exist.
    #[instrument(name = "transcode-hls", skip_all)]
    pub async fn transcode(
        &self,
        input: &Path,
        output_dir: &Path,
        presets: &[Preset],
        shutdown: &watch::Receiver<bool>,
    ) -> Result<(), WorkerError> {
        let args = self.build_args(input, output_dir, presets);
        self.execute(args, shutdown).await
    }

    /// Assemble the full ffmpeg argument list.
    ///
    /// Output options (codec, rate control, GOP shape, HLS muxer settings)
    /// are repeated per output because each preset is an independent HLS
    /// output of the one invocation.
    pub fn build_args(&self, input: &Path, output_dir: &Path, presets: &[Preset]) -> Vec<String> {
        let mut args = vec![
            "-hide_banner".to_string(),
            "-y".to_string(),
            "-i".to_string(),
            input.display().to_string(),
            "-filter_complex".to_string(),
            build_filter_complex(presets),
        ];

        // Audio is optional by default so silent sources still transcode;
        // the strict mapping fails fast when audio is contractually required.
        let audio_map = if self.require_audio { "0:a:0" } else { "0:a?" };

        for (i, preset) in presets.iter().enumerate() {
            let preset_dir = output_dir.join(&preset.name);
            args.extend([
                "-map".to_string(),
                format!("[v{}out]", i + 1),
                "-c:v".to_string(),
                "libx264".to_string(),
                "-b:v".to_string(),
                preset.video_bitrate.clone(),
                "-maxrate".to_string(),
                preset.max_rate.clone(),
                "-bufsize".to_string(),
                preset.buf_size.clone(),
                "-map".to_string(),
                audio_map.to_string(),
                "-c:a".to_string(),
                "aac".to_string(),
                "-b:a".to_string(),
                preset.audio_bitrate.clone(),
                "-preset".to_string(),
                "veryfast".to_string(),
                "-profile:v".to_string(),
                "main".to_string(),
                "-level".to_string(),
                "4.1".to_string(),
                "-g".to_string(),
                "100".to_string(),
                "-keyint_min".to_string(),
                "100".to_string(),
                "-sc_threshold".to_string(),
                "0".to_string(),
                "-flags".to_string(),
                "+cgop".to_string(),
                "-f".to_string(),
                "hls".to_string(),
                "-hls_time".to_string(),
                self.segment_seconds.to_string(),
                "-hls_playlist_type".to_string(),
                "vod".to_string(),
                "-hls_list_size".to_string(),
                "0".to_string(),
                "-hls_segment_filename".to_string(),
                preset_dir.join("seg_%03d.ts").display().to_string(),
                preset_dir.join("playlist.m3u8").display().to_string(),
            ]);
        }

        args
    }

    #[instrument(name = "ffmpeg-execute", skip_all)]
    async fn execute(
        &self,
        args: Vec<String>,
        shutdown: &watch::Receiver<bool>,
    ) -> Result<(), WorkerError> {
        if *shutdown.borrow() {
            return Err(WorkerError::FfmpegCanceled);
        }

        let mut child = Command::new(FFMPEG_BIN)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| WorkerError::FfmpegFailed(format!("failed to spawn ffmpeg: {e}")))?;

        let mut stdout = child.stdout.take().expect("stdout piped");
        let stderr = child.stderr.take().expect("stderr piped");

        let stdout_drain = tokio::spawn(async move {
            let _ = tokio::io::copy(&mut stdout, &mut tokio::io::sink()).await;
        });
        let stderr_scan = tokio::spawn(scan_stderr(stderr));

        let mut shutdown = shutdown.clone();
        let status = tokio::select! {
            status = child.wait() => {
                status.map_err(|e| WorkerError::FfmpegFailed(format!("wait failed: {e}")))?
            }
            _ = shutdown.changed() => {
                let _ = child.kill().await;
                let _ = stdout_drain.await;
                let _ = stderr_scan.await;
                return Err(WorkerError::FfmpegCanceled);
            }
            _ = tokio::time::sleep(self.timeout) => {
                let _ = child.kill().await;
                let _ = stdout_drain.await;
                let _ = stderr_scan.await;
                return Err(WorkerError::FfmpegFailed(format!(
                    "timed out after {:?}",
                    self.timeout
                )));
            }
        };

        let _ = stdout_drain.await;
        let _ = stderr_scan.await;

        if !status.success() {
            if *shutdown.borrow() {
                return Err(WorkerError::FfmpegCanceled);
            }
            return Err(WorkerError::FfmpegFailed(format!("exit status {status}")));
        }

        Ok(())
    }
}

/// Scan ffmpeg's stderr line by line: progress chatter at debug, anything
/// that mentions an error at warn. Everything else is dropped.
async fn scan_stderr(stderr: tokio::process::ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if line.contains("frame=") || line.contains("time=") {
            debug!(target: "ffmpeg", "{line}");
        } else if line.contains("error") || line.contains("Error") {
            warn!(target: "ffmpeg", "{line}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hls_core::default_presets;
    use std::path::PathBuf;

    fn args_for(require_audio: bool) -> Vec<String> {
        Transcoder::new(6, require_audio, Duration::from_secs(900)).build_args(
            &PathBuf::from("/tmp/in.mp4"),
            &PathBuf::from("/tmp/out"),
            &default_presets(),
        )
    }

    #[test]
    fn test_args_filter_graph_and_outputs() {
        let args = args_for(false);

        let filter_pos = args.iter().position(|a| a == "-filter_complex").unwrap();
        assert!(args[filter_pos + 1].starts_with("[0:v]split=3"));

        // One independent HLS output per preset, in declaration order.
        let playlists: Vec<&String> = args
            .iter()
            .filter(|a| a.ends_with("playlist.m3u8"))
            .collect();
        assert_eq!(
            playlists,
            vec![
                "/tmp/out/1080p/playlist.m3u8",
                "/tmp/out/720p/playlist.m3u8",
                "/tmp/out/480p/playlist.m3u8"
            ]
        );

        let segments: Vec<&String> = args.iter().filter(|a| a.ends_with("seg_%03d.ts")).collect();
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0], "/tmp/out/1080p/seg_%03d.ts");
    }

    #[test]
    fn test_args_rate_control_per_preset() {
        let args = args_for(false);
        for expected in ["5000k", "2500k", "1000k", "5500k", "7500k", "192k", "96k"] {
            assert!(args.iter().any(|a| a == expected), "missing {expected}");
        }
    }

    #[test]
    fn test_args_common_flags() {
        let args = args_for(false);
        for (flag, value) in [
            ("-preset", "veryfast"),
            ("-profile:v", "main"),
            ("-level", "4.1"),
            ("-g", "100"),
            ("-keyint_min", "100"),
            ("-sc_threshold", "0"),
            ("-flags", "+cgop"),
            ("-hls_time", "6"),
        ] {
            let pos = args.iter().position(|a| a == flag).unwrap_or_else(|| {
                panic!("missing flag {flag}");
            });
            assert_eq!(args[pos + 1], value);
        }
    }

    #[test]
    fn test_audio_mapping_modes() {
        assert!(args_for(false).iter().any(|a| a == "0:a?"));
        assert!(!args_for(false).iter().any(|a| a == "0:a:0"));
        assert!(args_for(true).iter().any(|a| a == "0:a:0"));
        assert!(!args_for(true).iter().any(|a| a == "0:a?"));
    }

    #[test]
    fn test_segment_seconds_configurable() {
        let args = Transcoder::new(4, false, Duration::from_secs(900)).build_args(
            &PathBuf::from("in.mp4"),
            &PathBuf::from("out"),
            &default_presets(),
        );
        let pos = args.iter().position(|a| a == "-hls_time").unwrap();
        assert_eq!(args[pos + 1], "4");
    }
}
