use std::path::{Path, PathBuf};
use serde::Serialize;

pub mod analyzers;
pub mod audio;
pub mod cli;
pub mod config;
pub mod repository;
pub mod utils;

/// Extensions (lowercase, without the dot) recognised as audio files.
pub const SUPPORTED_EXTENSIONS: [&str; 5] = ["mp3", "m4a", "wav", "flac", "aac"];

/// Returns true when `path` carries one of the supported audio extensions,
/// compared case-insensitively.
pub fn is_supported_audio(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_lowercase();
            SUPPORTED_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Display metadata read from a file's tags. Every field is optional; nothing
/// is filled in with placeholder values.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrackMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub genre: Option<String>,
    pub year: Option<i32>,
    pub track_number: Option<u32>,
    pub duration_secs: Option<f64>,
}

/// A library entry as held by a [`repository::TrackRepository`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Track {
    pub path: PathBuf,
    pub fingerprint: Option<String>,
    pub duration_secs: Option<f64>,
    pub loudness: Option<f64>,
    pub metadata: TrackMetadata,
}

impl Track {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            fingerprint: None,
            duration_secs: None,
            loudness: None,
            metadata: TrackMetadata::default(),
        }
    }

    pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.fingerprint = Some(fingerprint.into());
        self
    }

    /// File name without its extension.
    pub fn basename(&self) -> String {
        self.path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Tag title if present, otherwise the basename.
    pub fn display_title(&self) -> String {
        self.metadata.title.clone().unwrap_or_else(|| self.basename())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LibraryError {
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),
    #[error("Fingerprinting failed for {path}: {reason}")]
    Fingerprint { path: PathBuf, reason: String },
    #[error("Track repository error: {0}")]
    Repository(String),
    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LibraryError>;

// Re-exports for convenience
pub use analyzers::duplicate::{
    compare_audio_properties, AudioComparison, DuplicateDetector, DuplicateGroup, MatchCandidate,
    MatchType,
};
pub use analyzers::hierarchy::{DepthStats, DirectoryAnalyzer, HierarchyLabel, PathRecord, YearTierMap};
pub use analyzers::similarity::similarity_ratio;
pub use audio::fingerprint::{CachedFingerprinter, Fingerprinter, FpcalcFingerprinter};
pub use audio::metadata::MetadataExtractor;
pub use audio::scanner::LibraryScanner;
pub use config::Config;
pub use repository::{MemoryRepository, TrackRepository};
pub use utils::progress::{CancellationFlag, LogProgress, ProgressSink, ProgressTracker};
