//! Acoustic fingerprinting collaborators.
//!
//! The analysis core never decodes audio itself. It asks a [`Fingerprinter`]
//! for an opaque, content-derived identifier and compares those for equality.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Mutex;

use serde::Deserialize;

use crate::config::Config;
use crate::{LibraryError, Result};

/// Produces `(duration_secs, fingerprint)` for an audio file. Identical audio
/// must yield identical fingerprints regardless of file name or tags.
pub trait Fingerprinter: Send + Sync {
    fn fingerprint(&self, path: &Path) -> Result<(f64, String)>;
}

impl<T: Fingerprinter + ?Sized> Fingerprinter for &T {
    fn fingerprint(&self, path: &Path) -> Result<(f64, String)> {
        (**self).fingerprint(path)
    }
}

#[derive(Debug, Deserialize)]
struct FpcalcOutput {
    duration: f64,
    fingerprint: String,
}

/// Runs Chromaprint's `fpcalc` tool and reads its JSON output.
pub struct FpcalcFingerprinter {
    program: PathBuf,
    length: u32,
}

impl FpcalcFingerprinter {
    pub fn new(config: &Config) -> Self {
        Self {
            program: config.fpcalc_path.clone(),
            length: config.fingerprint_length,
        }
    }

    fn parse_output(path: &Path, stdout: &[u8]) -> Result<(f64, String)> {
        let output: FpcalcOutput = serde_json::from_slice(stdout)?;
        if output.fingerprint.is_empty() {
            return Err(LibraryError::Fingerprint {
                path: path.to_path_buf(),
                reason: "fpcalc returned an empty fingerprint".into(),
            });
        }
        Ok((output.duration, output.fingerprint))
    }
}

impl Fingerprinter for FpcalcFingerprinter {
    fn fingerprint(&self, path: &Path) -> Result<(f64, String)> {
        let output = Command::new(&self.program)
            .arg("-json")
            .arg("-length")
            .arg(self.length.to_string())
            .arg(path)
            .output()
            .map_err(|e| LibraryError::Fingerprint {
                path: path.to_path_buf(),
                reason: format!("failed to run {}: {}", self.program.display(), e),
            })?;

        if !output.status.success() {
            return Err(LibraryError::Fingerprint {
                path: path.to_path_buf(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Self::parse_output(path, &output.stdout)
    }
}

/// Remembers successful fingerprints per path. Failures are not cached.
pub struct CachedFingerprinter<F> {
    inner: F,
    cache: Mutex<HashMap<PathBuf, (f64, String)>>,
}

impl<F: Fingerprinter> CachedFingerprinter<F> {
    pub fn new(inner: F) -> Self {
        Self { inner, cache: Mutex::new(HashMap::new()) }
    }

    pub fn cached_len(&self) -> usize {
        self.cache.lock().map(|cache| cache.len()).unwrap_or(0)
    }
}

impl<F: Fingerprinter> Fingerprinter for CachedFingerprinter<F> {
    fn fingerprint(&self, path: &Path) -> Result<(f64, String)> {
        if let Ok(cache) = self.cache.lock() {
            if let Some(hit) = cache.get(path) {
                return Ok(hit.clone());
            }
        }

        let computed = self.inner.fingerprint(path)?;
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(path.to_path_buf(), computed.clone());
        }
        Ok(computed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        calls: AtomicUsize,
    }

    impl Fingerprinter for Counting {
        fn fingerprint(&self, path: &Path) -> Result<(f64, String)> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if path.ends_with("broken.mp3") {
                return Err(LibraryError::Fingerprint { path: path.to_path_buf(), reason: "codec".into() });
            }
            Ok((180.0, format!("fp:{}", path.display())))
        }
    }

    #[test]
    fn parses_fpcalc_json() {
        let json = br#"{"duration": 212.53, "fingerprint": "AQADtEmUaEkSRZEGAA"}"#;
        let (duration, fp) = FpcalcFingerprinter::parse_output(Path::new("a.mp3"), json).unwrap();
        assert_eq!(duration, 212.53);
        assert_eq!(fp, "AQADtEmUaEkSRZEGAA");
    }

    #[test]
    fn rejects_malformed_or_empty_output() {
        assert!(matches!(
            FpcalcFingerprinter::parse_output(Path::new("a.mp3"), b"ERROR: no audio"),
            Err(LibraryError::Json(_))
        ));
        assert!(matches!(
            FpcalcFingerprinter::parse_output(Path::new("a.mp3"), br#"{"duration": 1.0, "fingerprint": ""}"#),
            Err(LibraryError::Fingerprint { .. })
        ));
    }

    #[test]
    fn missing_program_is_a_fingerprint_error() {
        let config = Config::default().with_fpcalc_path("/nonexistent/fpcalc-binary");
        let result = FpcalcFingerprinter::new(&config).fingerprint(Path::new("song.mp3"));
        assert!(matches!(result, Err(LibraryError::Fingerprint { .. })));
    }

    #[test]
    fn cache_hits_skip_the_inner_fingerprinter() {
        let cached = CachedFingerprinter::new(Counting { calls: AtomicUsize::new(0) });
        let first = cached.fingerprint(Path::new("a.mp3")).unwrap();
        let second = cached.fingerprint(Path::new("a.mp3")).unwrap();
        assert_eq!(first, second);
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cached.cached_len(), 1);
    }

    #[test]
    fn failures_are_retried() {
        let cached = CachedFingerprinter::new(Counting { calls: AtomicUsize::new(0) });
        assert!(cached.fingerprint(Path::new("broken.mp3")).is_err());
        assert!(cached.fingerprint(Path::new("broken.mp3")).is_err());
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cached.cached_len(), 0);
    }
}
