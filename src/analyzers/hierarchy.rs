use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use walkdir::WalkDir;

use crate::config::Config;
use crate::utils::file_ops::is_hidden_dir;
use crate::utils::progress::{NoProgress, ProgressSink, ProgressTracker};
use crate::{is_supported_audio, LibraryError, Result};

/// Share of observations at a segment index that must be years for the index
/// to count as a year tier.
pub const YEAR_TIER_THRESHOLD: f64 = 0.90;

const YEAR_PATTERN: &str = r"^[0-9]{4}$";

fn year_pattern() -> &'static Regex {
    static YEAR: OnceLock<Regex> = OnceLock::new();
    YEAR.get_or_init(|| Regex::new(YEAR_PATTERN).unwrap())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum HierarchyLabel {
    ArtistAlbumSong,
    YearArtistAlbumSong,
    ArtistYearAlbumSong,
    ArtistAlbumYearSong,
    GenreArtistAlbumSong,
    GenreYearArtistAlbumSong,
    GenreArtistYearAlbumSong,
    GenreArtistAlbumYearSong,
    AlbumSong,
    Song,
}

impl HierarchyLabel {
    /// Options always offered after the inferred label.
    pub const DEFAULTS: [HierarchyLabel; 3] = [
        HierarchyLabel::ArtistAlbumSong,
        HierarchyLabel::AlbumSong,
        HierarchyLabel::Song,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HierarchyLabel::ArtistAlbumSong => "Artist > Album > Song",
            HierarchyLabel::YearArtistAlbumSong => "Year > Artist > Album > Song",
            HierarchyLabel::ArtistYearAlbumSong => "Artist > Year > Album > Song",
            HierarchyLabel::ArtistAlbumYearSong => "Artist > Album > Year > Song",
            HierarchyLabel::GenreArtistAlbumSong => "Genre > Artist > Album > Song",
            HierarchyLabel::GenreYearArtistAlbumSong => "Genre > Year > Artist > Album > Song",
            HierarchyLabel::GenreArtistYearAlbumSong => "Genre > Artist > Year > Album > Song",
            HierarchyLabel::GenreArtistAlbumYearSong => "Genre > Artist > Album > Year > Song",
            HierarchyLabel::AlbumSong => "Album > Song",
            HierarchyLabel::Song => "Song",
        }
    }

    /// This label followed by the defaults, without repeats.
    pub fn with_defaults(self) -> Vec<HierarchyLabel> {
        let mut options = vec![self];
        for default in HierarchyLabel::DEFAULTS {
            if !options.contains(&default) {
                options.push(default);
            }
        }
        options
    }
}

impl Default for HierarchyLabel {
    fn default() -> Self {
        HierarchyLabel::ArtistAlbumSong
    }
}

impl fmt::Display for HierarchyLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One audio-bearing directory, relative to the scanned root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathRecord {
    pub depth: usize,
    pub segments: Vec<String>,
}

impl PathRecord {
    fn from_relative(relative: &Path) -> Option<Self> {
        let segments: Vec<String> = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();
        if segments.is_empty() {
            return None;
        }
        Some(Self { depth: segments.len(), segments })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepthStats {
    pub max_depth: usize,
    /// Most frequent depth; the depth seen first wins a tie.
    pub common_depth: usize,
    pub distribution: BTreeMap<usize, f64>,
}

impl DepthStats {
    pub fn from_records(records: &[PathRecord]) -> Self {
        // (depth, count) in order of first appearance
        let mut counts: Vec<(usize, usize)> = Vec::new();
        for record in records {
            match counts.iter_mut().find(|(depth, _)| *depth == record.depth) {
                Some((_, count)) => *count += 1,
                None => counts.push((record.depth, 1)),
            }
        }

        let max_depth = counts.iter().map(|(depth, _)| *depth).max().unwrap_or(0);
        let mut common_depth = 0;
        let mut best = 0;
        for (depth, count) in &counts {
            if *count > best {
                best = *count;
                common_depth = *depth;
            }
        }

        let total = records.len() as f64;
        let distribution = counts
            .iter()
            .map(|(depth, count)| (*depth, *count as f64 / total))
            .collect();

        Self { max_depth, common_depth, distribution }
    }
}

/// Segment indices that are consistently year tokens, with their ratio.
/// Iteration runs from the lowest index upward.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct YearTierMap(pub BTreeMap<usize, f64>);

impl YearTierMap {
    pub fn from_records(records: &[PathRecord]) -> Self {
        let year_pattern = year_pattern();
        // index -> (records with a segment there, of which are years)
        let mut observed: BTreeMap<usize, (usize, usize)> = BTreeMap::new();
        for record in records {
            for (index, segment) in record.segments.iter().enumerate() {
                let entry = observed.entry(index).or_insert((0, 0));
                entry.0 += 1;
                if year_pattern.is_match(segment) {
                    entry.1 += 1;
                }
            }
        }

        let tiers = observed
            .into_iter()
            .filter_map(|(index, (total, years))| {
                let ratio = years as f64 / total as f64;
                (ratio > YEAR_TIER_THRESHOLD).then_some((index, ratio))
            })
            .collect();

        YearTierMap(tiers)
    }

    pub fn first_tier(&self) -> Option<usize> {
        self.0.keys().next().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Maps depth and year-tier signals onto a label.
pub fn classify(stats: &DepthStats, years: &YearTierMap) -> HierarchyLabel {
    match (stats.max_depth, years.first_tier()) {
        (2, _) => HierarchyLabel::ArtistAlbumSong,
        (3, Some(0)) => HierarchyLabel::YearArtistAlbumSong,
        (3, Some(1)) => HierarchyLabel::ArtistYearAlbumSong,
        (3, Some(_)) => HierarchyLabel::ArtistAlbumYearSong,
        (3, None) => HierarchyLabel::GenreArtistAlbumSong,
        (4, Some(1)) => HierarchyLabel::GenreYearArtistAlbumSong,
        (4, Some(2)) => HierarchyLabel::GenreArtistYearAlbumSong,
        (4, Some(_)) => HierarchyLabel::GenreArtistAlbumYearSong,
        (4, None) => HierarchyLabel::GenreArtistAlbumSong,
        _ => HierarchyLabel::default(),
    }
}

/// Infers how a music collection is organised on disk.
pub struct DirectoryAnalyzer {
    config: Config,
}

impl DirectoryAnalyzer {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn analyze_hierarchy(&self, root: impl AsRef<Path>) -> Result<HierarchyLabel> {
        self.analyze_hierarchy_with_progress(root, &NoProgress)
    }

    /// Returns the inferred label. Only a missing root is an error; any
    /// failure past that point falls back to the default label.
    pub fn analyze_hierarchy_with_progress(
        &self,
        root: impl AsRef<Path>,
        progress: &dyn ProgressSink,
    ) -> Result<HierarchyLabel> {
        let root = root.as_ref();
        if !root.exists() {
            return Err(LibraryError::PathNotFound(root.to_path_buf()));
        }

        let mut tracker = ProgressTracker::new(progress);
        let label = match self.scan_directory(root, &mut tracker) {
            Ok(records) => {
                let stats = DepthStats::from_records(&records);
                let years = YearTierMap::from_records(&records);
                log::debug!(
                    "{} audio directories, max depth {}, common depth {}, year tiers {:?}",
                    records.len(),
                    stats.max_depth,
                    stats.common_depth,
                    years.0
                );
                classify(&stats, &years)
            }
            Err(e) => {
                log::warn!("Hierarchy analysis of {} degraded: {}", root.display(), e);
                HierarchyLabel::default()
            }
        };

        tracker.finish(&format!("Detected hierarchy: {}", label));
        Ok(label)
    }

    /// The inferred label followed by the defaults, without repeats. Never
    /// fails; an unusable root yields just the defaults.
    pub fn hierarchy_options(&self, root: impl AsRef<Path>) -> Vec<HierarchyLabel> {
        let root = root.as_ref();
        match self.analyze_hierarchy(root) {
            Ok(label) => label.with_defaults(),
            Err(e) => {
                log::error!("Error analyzing directory {}: {}", root.display(), e);
                HierarchyLabel::DEFAULTS.to_vec()
            }
        }
    }

    /// Lists every non-hidden directory under `root`, then records those that
    /// directly contain a supported audio file.
    pub fn scan_directory(&self, root: &Path, tracker: &mut ProgressTracker<'_>) -> Result<Vec<PathRecord>> {
        let directories = self.collect_directories(root)?;
        let total = directories.len();
        let mut records = Vec::new();

        for (index, dir) in directories.iter().enumerate() {
            match Self::contains_audio(dir) {
                Ok(true) => {
                    let record = dir
                        .strip_prefix(root)
                        .ok()
                        .and_then(PathRecord::from_relative);
                    if let Some(record) = record {
                        records.push(record);
                    }
                }
                Ok(false) => {}
                Err(e) => log::warn!("Skipping unreadable directory {}: {}", dir.display(), e),
            }
            tracker.step(index + 1, total, &format!("Scanned {}", dir.display()));
        }

        Ok(records)
    }

    fn collect_directories(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let mut directories = Vec::new();
        let walker = WalkDir::new(root)
            .follow_links(self.config.follow_links)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_hidden_dir(e));

        for entry in walker {
            match entry {
                Ok(entry) if entry.file_type().is_dir() => directories.push(entry.into_path()),
                Ok(_) => {}
                Err(e) if e.depth() == 0 => return Err(e.into()),
                Err(e) => log::warn!("Error accessing entry: {}", e),
            }
        }

        Ok(directories)
    }

    fn contains_audio(dir: &Path) -> Result<bool> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                continue;
            }
            if is_supported_audio(&entry.path()) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
