//! Read-only access to the tracks known to the library.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::{Result, Track};

/// Source of library tracks. The analysis core only reads from it.
pub trait TrackRepository: Send + Sync {
    /// Tracks whose stored fingerprint equals `fingerprint`.
    fn find_by_fingerprint(&self, fingerprint: &str) -> Result<Vec<Track>>;

    /// Every track, in the repository's own stable order.
    fn list_all(&self) -> Result<Vec<Track>>;
}

impl<T: TrackRepository + ?Sized> TrackRepository for &T {
    fn find_by_fingerprint(&self, fingerprint: &str) -> Result<Vec<Track>> {
        (**self).find_by_fingerprint(fingerprint)
    }

    fn list_all(&self) -> Result<Vec<Track>> {
        (**self).list_all()
    }
}

/// Insertion-ordered, path-keyed track store with a fingerprint index.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    tracks: Vec<Track>,
    by_path: HashMap<PathBuf, usize>,
    by_fingerprint: HashMap<String, Vec<usize>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tracks(tracks: impl IntoIterator<Item = Track>) -> Self {
        let mut repository = Self::new();
        for track in tracks {
            repository.upsert(track);
        }
        repository
    }

    /// Adds a track, or replaces the stored one with the same path while
    /// keeping its original position.
    pub fn upsert(&mut self, track: Track) {
        match self.by_path.get(&track.path).copied() {
            Some(index) => {
                if let Some(old) = self.tracks[index].fingerprint.take() {
                    if let Some(slots) = self.by_fingerprint.get_mut(&old) {
                        slots.retain(|slot| *slot != index);
                    }
                }
                self.index_fingerprint(&track, index);
                self.tracks[index] = track;
            }
            None => {
                let index = self.tracks.len();
                self.by_path.insert(track.path.clone(), index);
                self.index_fingerprint(&track, index);
                self.tracks.push(track);
            }
        }
    }

    fn index_fingerprint(&mut self, track: &Track, index: usize) {
        if let Some(fingerprint) = &track.fingerprint {
            self.by_fingerprint.entry(fingerprint.clone()).or_default().push(index);
        }
    }

    pub fn get(&self, path: &Path) -> Option<&Track> {
        self.by_path.get(path).map(|index| &self.tracks[*index])
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

impl TrackRepository for MemoryRepository {
    fn find_by_fingerprint(&self, fingerprint: &str) -> Result<Vec<Track>> {
        let mut slots = self.by_fingerprint.get(fingerprint).cloned().unwrap_or_default();
        slots.sort_unstable();
        Ok(slots.into_iter().map(|index| self.tracks[index].clone()).collect())
    }

    fn list_all(&self) -> Result<Vec<Track>> {
        Ok(self.tracks.clone())
    }
}
