//! Master playlist writer and output directory layout

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::presets::Preset;

/// Write `master.m3u8` into `dir`, one `EXT-X-STREAM-INF` block per preset
/// in declaration order. The byte layout is part of the output contract:
///
/// ```text
/// #EXTM3U
/// #EXT-X-VERSION:3
/// #EXT-X-STREAM-INF:BANDWIDTH=<bw>,RESOLUTION=<w>x<h>
/// <name>/playlist.m3u8
/// ```
pub fn generate_master_playlist(dir: &Path, presets: &[Preset]) -> std::io::Result<()> {
    let mut contents = String::from("#EXTM3U\n#EXT-X-VERSION:3\n");
    for preset in presets {
        contents.push_str(&format!(
            "#EXT-X-STREAM-INF:BANDWIDTH={},RESOLUTION={}x{}\n{}/playlist.m3u8\n",
            preset.bandwidth, preset.width, preset.height, preset.name
        ));
    }

    let mut file = fs::File::create(dir.join("master.m3u8"))?;
    file.write_all(contents.as_bytes())?;
    file.sync_all()
}

/// Create `dir/<name>` for every preset.
///
/// Not atomic across presets; the caller discards `dir` wholesale on any
/// error.
pub fn create_output_directories(dir: &Path, presets: &[Preset]) -> std::io::Result<()> {
    for preset in presets {
        fs::create_dir_all(dir.join(&preset.name))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presets::default_presets;

    #[test]
    fn test_master_playlist_exact_bytes() {
        let dir = tempfile::tempdir().unwrap();
        generate_master_playlist(dir.path(), &default_presets()).unwrap();

        let contents = fs::read_to_string(dir.path().join("master.m3u8")).unwrap();
        assert_eq!(
            contents,
            "#EXTM3U\n\
             #EXT-X-VERSION:3\n\
             #EXT-X-STREAM-INF:BANDWIDTH=5500000,RESOLUTION=1920x1080\n\
             1080p/playlist.m3u8\n\
             #EXT-X-STREAM-INF:BANDWIDTH=2750000,RESOLUTION=1280x720\n\
             720p/playlist.m3u8\n\
             #EXT-X-STREAM-INF:BANDWIDTH=1100000,RESOLUTION=854x480\n\
             480p/playlist.m3u8\n"
        );
    }

    #[test]
    fn test_master_playlist_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let presets = default_presets();
        generate_master_playlist(dir.path(), &presets).unwrap();

        // Re-parse the produced file back into (bandwidth, resolution, uri)
        // tuples and check they mirror the table in order.
        let contents = fs::read_to_string(dir.path().join("master.m3u8")).unwrap();
        let mut lines = contents.lines();
        assert_eq!(lines.next(), Some("#EXTM3U"));
        assert_eq!(lines.next(), Some("#EXT-X-VERSION:3"));

        let mut parsed = Vec::new();
        while let Some(inf) = lines.next() {
            let uri = lines.next().expect("stream URI after EXT-X-STREAM-INF");
            let attrs = inf.strip_prefix("#EXT-X-STREAM-INF:").unwrap();
            let mut bandwidth = 0u64;
            let mut resolution = String::new();
            for attr in attrs.split(',') {
                if let Some(v) = attr.strip_prefix("BANDWIDTH=") {
                    bandwidth = v.parse().unwrap();
                } else if let Some(v) = attr.strip_prefix("RESOLUTION=") {
                    resolution = v.to_string();
                }
            }
            parsed.push((bandwidth, resolution, uri.to_string()));
        }

        assert_eq!(parsed.len(), presets.len());
        for (preset, (bandwidth, resolution, uri)) in presets.iter().zip(parsed) {
            assert_eq!(bandwidth, preset.bandwidth);
            assert_eq!(resolution, preset.resolution());
            assert_eq!(uri, format!("{}/playlist.m3u8", preset.name));
        }
    }

    #[test]
    fn test_output_directories() {
        let dir = tempfile::tempdir().unwrap();
        let presets = default_presets();
        create_output_directories(dir.path(), &presets).unwrap();
        for preset in &presets {
            assert!(dir.path().join(&preset.name).is_dir());
        }
    }
}
