use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;

use rayon::prelude::*;
use rayon::ThreadPool;

use crate::audio::fingerprint::Fingerprinter;
use crate::audio::metadata::MetadataExtractor;
use crate::config::Config;
use crate::utils::file_ops::collect_audio_files;
use crate::utils::parallel::ParallelProcessor;
use crate::utils::progress::{CancellationFlag, ProgressSink, ProgressTracker};
use crate::{Result, Track};

/// Builds library tracks from audio files on disk: display tags plus the
/// acoustic fingerprint used for duplicate matching.
pub struct LibraryScanner<F> {
    config: Config,
    fingerprinter: F,
    pool: ThreadPool,
}

impl<F> ParallelProcessor for LibraryScanner<F> {}

impl<F: Fingerprinter> LibraryScanner<F> {
    pub fn new(config: Config, fingerprinter: F) -> Result<Self> {
        let pool = Self::build_thread_pool(config.threads)?;
        Ok(Self { config, fingerprinter, pool })
    }

    /// Scans every root and returns one track per readable audio file, in
    /// walk order. Missing roots and bad files are logged and skipped.
    pub fn scan(
        &self,
        roots: &[impl AsRef<Path>],
        progress: &dyn ProgressSink,
        cancel: &CancellationFlag,
    ) -> Vec<Track> {
        let mut tracker = ProgressTracker::new(progress);
        tracker.update(0, "Scanning music directory...");

        let mut files: Vec<PathBuf> = Vec::new();
        for root in roots {
            let root = root.as_ref();
            if !root.exists() {
                log::error!("Library root {} does not exist", root.display());
                continue;
            }
            let found = collect_audio_files(root, self.config.follow_links);
            log::info!("Found {} audio files in {}", found.len(), root.display());
            files.extend(found);
        }

        let total = files.len();
        log::info!("Processing {} files using {} threads", total, self.pool.current_num_threads());

        // Workers report each finished file; this thread owns the sink.
        let (done_tx, done_rx) = mpsc::channel::<()>();
        let tracks = thread::scope(|scope| {
            let worker = scope.spawn(move || {
                self.pool.install(|| {
                    files
                        .par_iter()
                        .map_with(done_tx, |done_tx, path| {
                            let track = if cancel.is_cancelled() { None } else { self.build_track(path) };
                            let _ = done_tx.send(());
                            track
                        })
                        .collect::<Vec<Option<Track>>>()
                })
            });

            for (index, ()) in done_rx.iter().enumerate() {
                let processed = index + 1;
                tracker.step(processed, total, &format!("Processing files... ({}/{})", processed, total));
            }

            match worker.join() {
                Ok(tracks) => tracks.into_iter().flatten().collect::<Vec<Track>>(),
                Err(_) => {
                    log::error!("Library scan worker panicked");
                    Vec::new()
                }
            }
        });

        if cancel.is_cancelled() {
            let last = tracker.last_percent();
            tracker.update(last, &format!("Scan cancelled with {} tracks", tracks.len()));
        } else {
            tracker.finish("Processing complete");
        }
        tracks
    }

    /// Reads one file. Files that turn out not to be audio, or cannot be
    /// opened, yield `None`. A failed fingerprint leaves the field empty.
    fn build_track(&self, path: &Path) -> Option<Track> {
        let metadata = match MetadataExtractor::read_tags(path) {
            Ok(Some(metadata)) => metadata,
            Ok(None) => {
                log::debug!("Skipping unreadable audio file: {}", path.display());
                return None;
            }
            Err(e) => {
                log::warn!("Error processing {}: {}", path.display(), e);
                return None;
            }
        };

        let mut track = Track::new(path);
        track.duration_secs = metadata.duration_secs;
        track.metadata = metadata;

        match self.fingerprinter.fingerprint(path) {
            Ok((duration, fingerprint)) => {
                track.fingerprint = Some(fingerprint);
                track.duration_secs = track.duration_secs.or(Some(duration));
            }
            Err(e) => log::warn!("Error fingerprinting {}: {}", path.display(), e),
        }

        log::debug!(
            "Processed file: {} (Duration: {:?}s, Fingerprint: {})",
            track.display_title(),
            track.duration_secs,
            track.fingerprint.is_some()
        );
        Some(track)
    }
}
