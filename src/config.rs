use std::path::PathBuf;

/// Runtime settings handed to each component at construction.
#[derive(Debug, Clone)]
pub struct Config {
    /// Worker threads for the rayon pool.
    pub threads: usize,
    /// Follow symbolic links while walking a library.
    pub follow_links: bool,
    /// Location of the Chromaprint `fpcalc` executable.
    pub fpcalc_path: PathBuf,
    /// Seconds of audio fed to the fingerprinter.
    pub fingerprint_length: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            threads: num_cpus::get(),
            follow_links: true,
            fpcalc_path: PathBuf::from("fpcalc"),
            fingerprint_length: 120,
        }
    }
}

impl Config {
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    pub fn with_fpcalc_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.fpcalc_path = path.into();
        self
    }

    pub fn with_fingerprint_length(mut self, seconds: u32) -> Self {
        self.fingerprint_length = seconds;
        self
    }

    pub fn with_follow_links(mut self, follow: bool) -> Self {
        self.follow_links = follow;
        self
    }
}
