use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use rayon::ThreadPool;

use crate::analyzers::similarity::similarity_ratio;
use crate::audio::fingerprint::Fingerprinter;
use crate::config::Config;
use crate::repository::TrackRepository;
use crate::utils::parallel::ParallelProcessor;
use crate::utils::progress::{CancellationFlag, NoProgress, ProgressSink, ProgressTracker};
use crate::{Result, Track};

/// Filename similarity a candidate must exceed to count as a duplicate.
pub const SIMILARITY_THRESHOLD: f64 = 0.85;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MatchType {
    Original,
    Fingerprint,
    Filename,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::Original => "original",
            MatchType::Fingerprint => "fingerprint",
            MatchType::Filename => "filename",
        }
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchCandidate {
    pub path: PathBuf,
    pub match_type: MatchType,
    pub confidence: f64,
    pub track: Track,
}

impl MatchCandidate {
    pub fn original(track: Track) -> Self {
        Self { path: track.path.clone(), match_type: MatchType::Original, confidence: 1.0, track }
    }

    pub fn fingerprint(track: Track) -> Self {
        Self { path: track.path.clone(), match_type: MatchType::Fingerprint, confidence: 1.0, track }
    }

    /// `None` unless `ratio` is above [`SIMILARITY_THRESHOLD`].
    pub fn filename(track: Track, ratio: f64) -> Option<Self> {
        (ratio > SIMILARITY_THRESHOLD).then(|| Self {
            path: track.path.clone(),
            match_type: MatchType::Filename,
            confidence: ratio,
            track,
        })
    }
}

/// A cluster of tracks believed to be the same recording. The first member
/// is always the original the group was seeded from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateGroup {
    members: Vec<MatchCandidate>,
}

impl DuplicateGroup {
    pub fn new(original: Track, duplicates: Vec<MatchCandidate>) -> Self {
        let mut members = Vec::with_capacity(duplicates.len() + 1);
        members.push(MatchCandidate::original(original));
        members.extend(duplicates);
        Self { members }
    }

    pub fn original(&self) -> &MatchCandidate {
        &self.members[0]
    }

    pub fn duplicates(&self) -> &[MatchCandidate] {
        &self.members[1..]
    }

    /// The original followed by its duplicates.
    pub fn members(&self) -> &[MatchCandidate] {
        &self.members
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.members.iter().map(|m| m.path.as_path())
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AudioComparison {
    pub duration_diff: Option<f64>,
    pub loudness_diff: Option<f64>,
}

/// Absolute differences in duration and loudness; a difference is only
/// reported when both tracks carry the value.
pub fn compare_audio_properties(a: &Track, b: &Track) -> AudioComparison {
    let diff = |x: Option<f64>, y: Option<f64>| match (x, y) {
        (Some(x), Some(y)) => Some((x - y).abs()),
        _ => None,
    };
    AudioComparison {
        duration_diff: diff(a.duration_secs, b.duration_secs),
        loudness_diff: diff(a.loudness, b.loudness),
    }
}

/// Owns the paths already placed into a group and the groups formed so far.
#[derive(Debug, Default)]
struct GroupAccumulator {
    processed: HashSet<PathBuf>,
    groups: Vec<DuplicateGroup>,
}

impl GroupAccumulator {
    fn is_processed(&self, path: &Path) -> bool {
        self.processed.contains(path)
    }

    /// Forms a group from `seed` and the matches no earlier group has
    /// claimed. Returns false when nothing is left to group with.
    fn add_group(&mut self, seed: &Track, matches: Vec<MatchCandidate>) -> bool {
        let mut claimed: HashSet<PathBuf> = HashSet::from([seed.path.clone()]);
        let mut duplicates = Vec::new();

        for candidate in matches {
            if self.processed.contains(&candidate.path) || !claimed.insert(candidate.path.clone()) {
                continue;
            }
            duplicates.push(candidate);
        }
        if duplicates.is_empty() {
            return false;
        }

        self.processed.extend(claimed);
        self.groups.push(DuplicateGroup::new(seed.clone(), duplicates));
        true
    }

    fn into_groups(self) -> Vec<DuplicateGroup> {
        self.groups
    }
}

/// Finds duplicate tracks by exact fingerprint and by similar file names.
pub struct DuplicateDetector<R, F> {
    repository: R,
    fingerprinter: F,
    pool: ThreadPool,
}

impl<R, F> ParallelProcessor for DuplicateDetector<R, F> {}

impl<R: TrackRepository, F: Fingerprinter> DuplicateDetector<R, F> {
    pub fn new(config: &Config, repository: R, fingerprinter: F) -> Result<Self> {
        let pool = Self::build_thread_pool(config.threads)?;
        Ok(Self { repository, fingerprinter, pool })
    }

    /// Other tracks that look like duplicates of `path`, best first. Ties
    /// keep fingerprint matches ahead of filename matches and repository
    /// order within each kind. Never fails; problems are logged.
    pub fn find_duplicates(&self, path: impl AsRef<Path>) -> Vec<MatchCandidate> {
        let path = path.as_ref();
        let tracks = match self.repository.list_all() {
            Ok(tracks) => tracks,
            Err(e) => {
                log::error!("Could not list tracks while checking {}: {}", path.display(), e);
                Vec::new()
            }
        };
        self.find_duplicates_among(path, &tracks)
    }

    fn find_duplicates_among(&self, path: &Path, tracks: &[Track]) -> Vec<MatchCandidate> {
        self.pool.install(|| {
            let mut candidates = self.fingerprint_matches(path);
            candidates.extend(self.filename_matches(path, tracks));
            candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

            // A track matched both ways keeps only its best entry.
            let mut seen: HashSet<PathBuf> = HashSet::new();
            candidates.retain(|c| seen.insert(c.path.clone()));
            candidates
        })
    }

    fn fingerprint_matches(&self, path: &Path) -> Vec<MatchCandidate> {
        let fingerprint = match self.fingerprinter.fingerprint(path) {
            Ok((_, fingerprint)) => fingerprint,
            Err(e) => {
                log::warn!("Error fingerprinting {}: {}", path.display(), e);
                return Vec::new();
            }
        };

        match self.repository.find_by_fingerprint(&fingerprint) {
            Ok(tracks) => tracks
                .into_iter()
                .filter(|track| track.path != path)
                .map(MatchCandidate::fingerprint)
                .collect(),
            Err(e) => {
                log::warn!("Fingerprint lookup failed for {}: {}", path.display(), e);
                Vec::new()
            }
        }
    }

    fn filename_matches(&self, path: &Path, tracks: &[Track]) -> Vec<MatchCandidate> {
        let probe = normalized_basename(path);
        Self::parallel_filter_map(&self.pool, tracks, |track| {
            if track.path == path {
                return None;
            }
            let ratio = similarity_ratio(&probe, &normalized_basename(&track.path));
            if ratio <= SIMILARITY_THRESHOLD {
                return None;
            }
            MatchCandidate::filename(track.clone(), ratio)
        })
    }

    pub fn analyze_duplicates(&self) -> Vec<DuplicateGroup> {
        self.analyze_duplicates_with_progress(&NoProgress, &CancellationFlag::new())
    }

    /// Partitions the library into disjoint duplicate groups, walking the
    /// repository once in its own order. Tracks without matches are not
    /// reported. On cancellation the groups formed so far are returned.
    pub fn analyze_duplicates_with_progress(
        &self,
        progress: &dyn ProgressSink,
        cancel: &CancellationFlag,
    ) -> Vec<DuplicateGroup> {
        let mut tracker = ProgressTracker::new(progress);
        tracker.update(0, "Analyzing duplicates...");

        let tracks = match self.repository.list_all() {
            Ok(tracks) => tracks,
            Err(e) => {
                log::error!("Error analyzing duplicates: {}", e);
                tracker.finish("Duplicate analysis failed: track list unavailable");
                return Vec::new();
            }
        };

        let total = tracks.len();
        let mut accumulator = GroupAccumulator::default();

        for (index, track) in tracks.iter().enumerate() {
            if cancel.is_cancelled() {
                log::info!("Duplicate analysis cancelled after {}/{} tracks", index, total);
                let status = format!("Cancelled with {} duplicate groups", accumulator.groups.len());
                let last = tracker.last_percent();
                tracker.update(last, &status);
                return accumulator.into_groups();
            }

            if !accumulator.is_processed(&track.path) {
                let matches = self.find_duplicates_among(&track.path, &tracks);
                if accumulator.add_group(track, matches) {
                    log::debug!("Duplicate group seeded by {}", track.path.display());
                }
            }

            tracker.step(index + 1, total, &format!("Checked {}/{} tracks", index + 1, total));
        }

        let groups = accumulator.into_groups();
        log::info!("Found {} duplicate groups among {} tracks", groups.len(), total);
        tracker.finish(&format!("Found {} duplicate groups", groups.len()));
        groups
    }
}

/// Lowercased file name without its extension.
fn normalized_basename(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryRepository;
    use crate::{LibraryError, Result};
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    /// Fingerprints come from a fixed table; unknown paths fail.
    struct TableFingerprinter(HashMap<PathBuf, String>);

    impl TableFingerprinter {
        fn from_tracks(tracks: &[Track]) -> Self {
            Self(
                tracks
                    .iter()
                    .filter_map(|t| t.fingerprint.clone().map(|fp| (t.path.clone(), fp)))
                    .collect(),
            )
        }
    }

    impl Fingerprinter for TableFingerprinter {
        fn fingerprint(&self, path: &Path) -> Result<(f64, String)> {
            self.0.get(path).map(|fp| (200.0, fp.clone())).ok_or_else(|| LibraryError::Fingerprint {
                path: path.to_path_buf(),
                reason: "unsupported codec".into(),
            })
        }
    }

    fn detector(tracks: Vec<Track>) -> DuplicateDetector<MemoryRepository, TableFingerprinter> {
        let fingerprinter = TableFingerprinter::from_tracks(&tracks);
        DuplicateDetector::new(&Config::default(), MemoryRepository::from_tracks(tracks), fingerprinter).unwrap()
    }

    fn member_paths(group: &DuplicateGroup) -> Vec<&str> {
        group.paths().map(|p| p.to_str().unwrap()).collect()
    }

    #[test]
    fn single_fingerprint_match() {
        let d = detector(vec![
            Track::new("/lib/a/Intro.mp3").with_fingerprint("FP1"),
            Track::new("/lib/b/Something Else.flac").with_fingerprint("FP1"),
            Track::new("/lib/c/Outro.mp3").with_fingerprint("FP2"),
        ]);

        let matches = d.find_duplicates("/lib/a/Intro.mp3");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].path, PathBuf::from("/lib/b/Something Else.flac"));
        assert_eq!(matches[0].match_type, MatchType::Fingerprint);
        assert_eq!(matches[0].confidence, 1.0);
    }

    #[test]
    fn filename_match_without_fingerprint() {
        let d = detector(vec![
            Track::new("/lib/Bohemian Rhapsody.mp3"),
            Track::new("/lib/copies/bohemian rhapsody (1).M4A"),
            Track::new("/lib/Totally Different Title.mp3"),
        ]);

        let matches = d.find_duplicates("/lib/Bohemian Rhapsody.mp3");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].match_type, MatchType::Filename);
        assert!((matches[0].confidence - 34.0 / 38.0).abs() < 1e-12);
    }

    #[test]
    fn candidates_sorted_by_confidence_with_stable_ties() {
        let d = detector(vec![
            Track::new("/x/Midnight City Drive.mp3").with_fingerprint("A"),
            Track::new("/y/Midnight City Drive (2).mp3"),
            Track::new("/z/midnight city drive.wav"),
            Track::new("/w/unrelated.mp3").with_fingerprint("A"),
            Track::new("/v/Midnight City Drive.flac"),
        ]);

        let matches = d.find_duplicates("/x/Midnight City Drive.mp3");
        let summary: Vec<(&str, MatchType)> =
            matches.iter().map(|m| (m.path.to_str().unwrap(), m.match_type)).collect();
        assert_eq!(
            summary,
            vec![
                ("/w/unrelated.mp3", MatchType::Fingerprint),
                ("/z/midnight city drive.wav", MatchType::Filename),
                ("/v/Midnight City Drive.flac", MatchType::Filename),
                ("/y/Midnight City Drive (2).mp3", MatchType::Filename),
            ]
        );
    }

    #[test]
    fn track_matched_both_ways_is_listed_once() {
        let d = detector(vec![
            Track::new("/a/Song Title.mp3").with_fingerprint("F"),
            Track::new("/b/Song Title.mp3").with_fingerprint("F"),
        ]);
        let matches = d.find_duplicates("/a/Song Title.mp3");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].match_type, MatchType::Fingerprint);
    }

    #[test]
    fn fingerprint_failure_still_checks_filenames() {
        let d = detector(vec![
            Track::new("/a/Morning Song.mp3"),
            Track::new("/b/Morning Song.flac").with_fingerprint("F"),
        ]);
        let matches = d.find_duplicates("/a/Morning Song.mp3");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].match_type, MatchType::Filename);
        assert_eq!(matches[0].confidence, 1.0);
    }

    #[test]
    fn groups_are_disjoint_and_skip_singletons() {
        let d = detector(vec![
            Track::new("/lib/A.mp3").with_fingerprint("shared"),
            Track::new("/lib/B.mp3").with_fingerprint("shared"),
            Track::new("/lib/Summer Nights Extended.mp3").with_fingerprint("c"),
            Track::new("/lib/Summer Nights Extended (1).mp3").with_fingerprint("d"),
            Track::new("/lib/E.mp3").with_fingerprint("e"),
        ]);

        let groups = d.analyze_duplicates();
        assert_eq!(groups.len(), 2);
        assert_eq!(member_paths(&groups[0]), vec!["/lib/A.mp3", "/lib/B.mp3"]);
        assert_eq!(
            member_paths(&groups[1]),
            vec!["/lib/Summer Nights Extended.mp3", "/lib/Summer Nights Extended (1).mp3"]
        );
        for group in &groups {
            assert_eq!(group.original().match_type, MatchType::Original);
            assert_eq!(group.original().confidence, 1.0);
        }
    }

    #[test]
    fn claimed_tracks_never_join_a_later_group() {
        // The middle title is similar to both others, which are not similar
        // to each other. The first group claims it, so the last track has
        // nothing left to pair with.
        let d = detector(vec![
            Track::new("/m/Blue Monday.mp3"),
            Track::new("/m/Blue Monday 88.mp3"),
            Track::new("/m/Blue Monday 88 (2).mp3"),
        ]);

        let groups = d.analyze_duplicates();
        assert_eq!(groups.len(), 1);
        assert_eq!(member_paths(&groups[0]), vec!["/m/Blue Monday.mp3", "/m/Blue Monday 88.mp3"]);

        let direct = d.find_duplicates("/m/Blue Monday 88 (2).mp3");
        assert_eq!(direct.len(), 1);
        assert_eq!(direct[0].path, PathBuf::from("/m/Blue Monday 88.mp3"));
    }

    #[test]
    fn repeated_runs_agree() {
        let tracks = vec![
            Track::new("/a/One.mp3").with_fingerprint("1"),
            Track::new("/b/One.flac").with_fingerprint("1"),
            Track::new("/c/Running Up That Hill.mp3"),
            Track::new("/d/Running Up That Hill (1).mp3"),
        ];
        let d = detector(tracks);
        assert_eq!(d.analyze_duplicates(), d.analyze_duplicates());
    }

    #[test]
    fn cancellation_returns_partial_groups() {
        let d = detector(vec![
            Track::new("/a.mp3").with_fingerprint("1"),
            Track::new("/b.mp3").with_fingerprint("1"),
            Track::new("/c.mp3").with_fingerprint("2"),
            Track::new("/d.mp3").with_fingerprint("2"),
        ]);
        let cancel = CancellationFlag::new();
        let events = std::sync::Mutex::new(Vec::new());
        let sink = |p: u8, _: &str| {
            events.lock().unwrap().push(p);
            if p >= 25 {
                cancel.cancel();
            }
        };

        let groups = d.analyze_duplicates_with_progress(&sink, &cancel);
        assert_eq!(groups.len(), 1);
        assert_eq!(member_paths(&groups[0]), vec!["/a.mp3", "/b.mp3"]);
        assert!(events.into_inner().unwrap().iter().all(|p| *p < 100));
    }

    #[test]
    fn compares_audio_properties() {
        let mut a = Track::new("/a.mp3");
        let mut b = Track::new("/b.mp3");
        a.duration_secs = Some(200.5);
        b.duration_secs = Some(198.0);
        a.loudness = Some(-9.0);

        let comparison = compare_audio_properties(&a, &b);
        assert_eq!(comparison.duration_diff, Some(2.5));
        assert_eq!(comparison.loudness_diff, None);
    }

    #[test]
    fn filename_candidates_respect_threshold() {
        let track = Track::new("/a.mp3");
        assert!(MatchCandidate::filename(track.clone(), 0.85).is_none());
        assert!(MatchCandidate::filename(track, 0.851).is_some());
    }

    #[test]
    fn short_copy_suffix_falls_below_threshold() {
        let d = detector(vec![Track::new("/lib/Song.mp3"), Track::new("/lib/Song (1).mp3")]);
        assert!(d.find_duplicates("/lib/Song.mp3").is_empty());
        assert!(d.analyze_duplicates().is_empty());
    }

    #[test]
    fn group_always_starts_with_its_original() {
        let group = DuplicateGroup::new(
            Track::new("/a.mp3"),
            vec![MatchCandidate::fingerprint(Track::new("/b.mp3"))],
        );
        assert_eq!(group.len(), 2);
        assert_eq!(group.original().match_type, MatchType::Original);
        assert_eq!(member_paths(&group), vec!["/a.mp3", "/b.mp3"]);

        let lone = DuplicateGroup::new(Track::new("/c.mp3"), Vec::new());
        assert_eq!(lone.original().path, PathBuf::from("/c.mp3"));
        assert!(lone.duplicates().is_empty());
    }

    /// Reports the size of the pool each lookup runs on.
    struct PoolSizeFingerprinter(std::sync::Mutex<Vec<usize>>);

    impl Fingerprinter for PoolSizeFingerprinter {
        fn fingerprint(&self, _path: &Path) -> Result<(f64, String)> {
            self.0.lock().unwrap().push(rayon::current_num_threads());
            Ok((1.0, "shared".into()))
        }
    }

    #[test]
    fn each_detector_uses_its_configured_thread_count() {
        for threads in [2, 3] {
            let tracks = vec![
                Track::new("/a.mp3").with_fingerprint("shared"),
                Track::new("/b.mp3").with_fingerprint("shared"),
            ];
            let fingerprinter = PoolSizeFingerprinter(std::sync::Mutex::new(Vec::new()));
            let config = Config::default().with_threads(threads);
            let d = DuplicateDetector::new(&config, MemoryRepository::from_tracks(tracks), &fingerprinter).unwrap();

            assert_eq!(d.analyze_duplicates().len(), 1);
            let seen = fingerprinter.0.lock().unwrap().clone();
            assert!(!seen.is_empty());
            assert!(seen.iter().all(|n| *n == threads));
        }
    }
}
