use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

use crate::is_supported_audio;

/// True for directories below the walk root whose name starts with a dot.
pub fn is_hidden_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry.file_name().to_str().map(|name| name.starts_with('.')).unwrap_or(false)
}

/// Every supported audio file below `root`, in file-name order. Hidden
/// directories are walked like any other. Unreadable entries are logged and
/// skipped.
pub fn collect_audio_files(root: &Path, follow_links: bool) -> Vec<PathBuf> {
    WalkDir::new(root)
        .follow_links(follow_links)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| match e {
            Ok(entry) => Some(entry),
            Err(err) => {
                log::warn!("Error accessing entry: {}", err);
                None
            }
        })
        .filter(|e| {
            let keep = e.file_type().is_file() && is_supported_audio(e.path());
            if e.file_type().is_file() && !keep {
                log::debug!("Skipping non-audio file: {}", e.path().display());
            }
            keep
        })
        .map(DirEntry::into_path)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs::{self, File};
    use tempfile::TempDir;

    #[test]
    fn collects_audio_including_hidden_directories() {
        let dir = TempDir::new().unwrap();
        for relative in ["b/2.flac", "a/1.MP3", "a/notes.txt", ".trash/3.mp3", "a/.4.wav"] {
            let path = dir.path().join(relative);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            File::create(path).unwrap();
        }

        let files: Vec<PathBuf> = collect_audio_files(dir.path(), true)
            .into_iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            files,
            vec![
                PathBuf::from(".trash/3.mp3"),
                PathBuf::from("a/.4.wav"),
                PathBuf::from("a/1.MP3"),
                PathBuf::from("b/2.flac"),
            ]
        );
    }

    #[test]
    fn hidden_directory_check_ignores_the_root_and_files() {
        let dir = TempDir::new().unwrap();
        let hidden_root = dir.path().join(".library");
        fs::create_dir_all(hidden_root.join(".cache")).unwrap();
        File::create(hidden_root.join(".notes.mp3")).unwrap();

        let hidden: Vec<PathBuf> = WalkDir::new(&hidden_root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(is_hidden_dir)
            .map(|e| e.file_name().into())
            .collect();
        assert_eq!(hidden, vec![PathBuf::from(".cache")]);
    }
}
