//! Rendition preset table and ffmpeg filter-graph assembly

use serde::{Deserialize, Serialize};

/// One adaptive-bitrate rendition.
///
/// Bitrate fields are ffmpeg-style strings ("5000k"); `bandwidth` is the
/// bits-per-second figure advertised in the master playlist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preset {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub video_bitrate: String,
    pub max_rate: String,
    pub buf_size: String,
    pub audio_bitrate: String,
    pub bandwidth: u64,
}

impl Preset {
    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

/// The default rendition ladder: 1080p, 720p, 480p.
pub fn default_presets() -> Vec<Preset> {
    vec![
        Preset {
            name: "1080p".to_string(),
            width: 1920,
            height: 1080,
            video_bitrate: "5000k".to_string(),
            max_rate: "5500k".to_string(),
            buf_size: "7500k".to_string(),
            audio_bitrate: "192k".to_string(),
            bandwidth: 5_500_000,
        },
        Preset {
            name: "720p".to_string(),
            width: 1280,
            height: 720,
            video_bitrate: "2500k".to_string(),
            max_rate: "2750k".to_string(),
            buf_size: "5000k".to_string(),
            audio_bitrate: "128k".to_string(),
            bandwidth: 2_750_000,
        },
        Preset {
            name: "480p".to_string(),
            width: 854,
            height: 480,
            video_bitrate: "1000k".to_string(),
            max_rate: "1100k".to_string(),
            buf_size: "2000k".to_string(),
            audio_bitrate: "96k".to_string(),
            bandwidth: 1_100_000,
        },
    ]
}

/// Build the `-filter_complex` graph that splits the input video into one
/// scaled branch per preset:
///
/// `[0:v]split=N[v1]...[vN];[v1]scale=W1:H1[v1out];...;[vN]scale=WN:HN[vNout]`
///
/// An empty preset slice yields an empty string. Pure function of the table.
pub fn build_filter_complex(presets: &[Preset]) -> String {
    if presets.is_empty() {
        return String::new();
    }

    let mut graph = format!("[0:v]split={}", presets.len());
    for i in 1..=presets.len() {
        graph.push_str(&format!("[v{}]", i));
    }
    for (i, preset) in presets.iter().enumerate() {
        graph.push_str(&format!(
            ";[v{idx}]scale={w}:{h}[v{idx}out]",
            idx = i + 1,
            w = preset.width,
            h = preset.height
        ));
    }
    graph
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ladder() {
        let presets = default_presets();
        assert_eq!(presets.len(), 3);
        assert_eq!(presets[0].name, "1080p");
        assert_eq!(presets[0].resolution(), "1920x1080");
        assert_eq!(presets[0].bandwidth, 5_500_000);
        assert_eq!(presets[1].name, "720p");
        assert_eq!(presets[1].audio_bitrate, "128k");
        assert_eq!(presets[2].name, "480p");
        assert_eq!(presets[2].resolution(), "854x480");
        assert_eq!(presets[2].bandwidth, 1_100_000);
    }

    #[test]
    fn test_filter_complex_default_table() {
        let graph = build_filter_complex(&default_presets());
        assert_eq!(
            graph,
            "[0:v]split=3[v1][v2][v3];\
             [v1]scale=1920:1080[v1out];\
             [v2]scale=1280:720[v2out];\
             [v3]scale=854:480[v3out]"
        );
    }

    #[test]
    fn test_filter_complex_empty() {
        assert_eq!(build_filter_complex(&[]), "");
    }

    #[test]
    fn test_filter_complex_is_pure() {
        let presets = default_presets();
        assert_eq!(build_filter_complex(&presets), build_filter_complex(&presets));
    }
}
