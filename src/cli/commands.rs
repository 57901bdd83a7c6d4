use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "library-analyzer")]
#[command(version = "1.0")]
#[command(about = "Music library analysis: folder hierarchy inference and duplicate detection", long_about = None)]
pub struct Cli {
    /// Worker threads (defaults to the number of CPU cores)
    #[arg(short = 't', long, global = true)]
    pub threads: Option<usize>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Infer how a music folder is organised
    Hierarchy {
        /// Library root to analyze
        #[arg(short = 'i', long = "input")]
        input: PathBuf,
    },

    /// Find duplicate tracks by fingerprint and similar file names
    Duplicates {
        /// Directories to scan for duplicates
        #[arg(short = 'i', long = "input", required = true, num_args = 1..)]
        dirs: Vec<PathBuf>,

        /// Write a CSV report of the duplicate groups
        #[arg(short = 'o', long = "output")]
        output: Option<PathBuf>,

        /// Path to the Chromaprint fpcalc executable
        #[arg(long, default_value = "fpcalc")]
        fpcalc: PathBuf,

        /// Seconds of audio to fingerprint
        #[arg(long, default_value_t = 120)]
        length: u32,
    },
}
