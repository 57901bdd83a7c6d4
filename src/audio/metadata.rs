use std::fs::File;
use std::path::Path;

use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::{MetadataOptions, StandardTagKey, Tag};
use symphonia::core::probe::Hint;

use crate::{Result, TrackMetadata};

/// Reads display metadata through symphonia. Only used for presentation;
/// matching never looks at tags.
pub struct MetadataExtractor;

impl MetadataExtractor {
    /// `Ok(None)` when the file opens but is not a readable audio stream.
    pub fn read_tags(path: impl AsRef<Path>) -> Result<Option<TrackMetadata>> {
        let path = path.as_ref();
        let file = File::open(path)?;

        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(extension) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(extension);
        }

        let mut probed = match symphonia::default::get_probe().format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        ) {
            Ok(probed) => probed,
            Err(e) => {
                log::debug!("Not a readable audio file {}: {}", path.display(), e);
                return Ok(None);
            }
        };

        let mut metadata = TrackMetadata::default();

        if let Some(track) = probed.format.default_track() {
            let params = &track.codec_params;
            if let (Some(time_base), Some(n_frames)) = (params.time_base, params.n_frames) {
                let time = time_base.calc_time(n_frames);
                metadata.duration_secs = Some(time.seconds as f64 + time.frac);
            }
        }

        // Tags found while probing (ID3v2 and friends) come first; tags in
        // the container override them.
        if let Some(probed_meta) = probed.metadata.get() {
            if let Some(revision) = probed_meta.current() {
                Self::apply_tags(&mut metadata, revision.tags());
            }
        }
        if let Some(revision) = probed.format.metadata().current() {
            Self::apply_tags(&mut metadata, revision.tags());
        }

        Ok(Some(metadata))
    }

    fn apply_tags(metadata: &mut TrackMetadata, tags: &[Tag]) {
        for tag in tags {
            let value = tag.value.to_string();
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match tag.std_key {
                Some(StandardTagKey::TrackTitle) => metadata.title = Some(value.to_string()),
                Some(StandardTagKey::Artist) => metadata.artist = Some(value.to_string()),
                Some(StandardTagKey::Album) => metadata.album = Some(value.to_string()),
                Some(StandardTagKey::Genre) => metadata.genre = Some(value.to_string()),
                Some(StandardTagKey::Date) | Some(StandardTagKey::ReleaseDate) => {
                    if let Some(year) = parse_year(value) {
                        metadata.year = Some(year);
                    }
                }
                Some(StandardTagKey::TrackNumber) => {
                    if let Some(number) = parse_track_number(value) {
                        metadata.track_number = Some(number);
                    }
                }
                _ => {}
            }
        }
    }
}

/// Year from a date tag such as `1987`, `1987-05-12` or `1987/05`.
fn parse_year(value: &str) -> Option<i32> {
    let digits: String = value.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.len() == 4 {
        digits.parse().ok()
    } else {
        None
    }
}

/// Track number from `7` or `7/12`.
fn parse_track_number(value: &str) -> Option<u32> {
    value.split('/').next()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::test_support::write_wav;
    use crate::LibraryError;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn years_and_track_numbers() {
        assert_eq!(parse_year("1987"), Some(1987));
        assert_eq!(parse_year("1987-05-12"), Some(1987));
        assert_eq!(parse_year("87"), None);
        assert_eq!(parse_year("Unknown"), None);
        assert_eq!(parse_track_number("7/12"), Some(7));
        assert_eq!(parse_track_number(" 3 "), Some(3));
        assert_eq!(parse_track_number("A1"), None);
    }

    #[test]
    fn reads_duration_from_wav() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tone.wav");
        write_wav(&path);

        let metadata = MetadataExtractor::read_tags(&path).unwrap().unwrap();
        let duration = metadata.duration_secs.unwrap();
        assert!((duration - 1.0).abs() < 1e-6);
        assert_eq!(metadata.title, None);
    }

    #[test]
    fn non_audio_content_is_none() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fake.mp3");
        File::create(&path).unwrap().write_all(b"definitely not an mp3 stream").unwrap();
        assert_eq!(MetadataExtractor::read_tags(&path).unwrap(), None);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = TempDir::new().unwrap();
        let result = MetadataExtractor::read_tags(dir.path().join("gone.flac"));
        assert!(matches!(result, Err(LibraryError::Io(_))));
    }
}
