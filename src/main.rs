use clap::Parser;
use library_analyzer::cli::commands::{Cli, Commands};
use library_analyzer::utils::reporting::Reporter;
use library_analyzer::{
    CachedFingerprinter, CancellationFlag, Config, DirectoryAnalyzer, DuplicateDetector, FpcalcFingerprinter,
    LibraryScanner, LogProgress, MemoryRepository,
};

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let mut config = Config::default();
    if let Some(threads) = cli.threads {
        config = config.with_threads(threads);
    }

    match cli.command {
        Commands::Hierarchy { input } => {
            println!("=== Analyzing Folder Hierarchy ===");
            println!("Library root: {}", input.display());

            let analyzer = DirectoryAnalyzer::new(config);
            let label = match analyzer.analyze_hierarchy_with_progress(&input, &LogProgress) {
                Ok(label) => label,
                Err(e) => {
                    eprintln!("Error analyzing directory: {}", e);
                    std::process::exit(1);
                }
            };
            println!("\nDetected hierarchy: {}", label);

            println!("\nAvailable options:");
            for option in label.with_defaults() {
                println!("  - {}", option);
            }
        }

        Commands::Duplicates { dirs, output, fpcalc, length } => {
            println!("=== Starting Duplicate Analysis ===");
            println!("Scanning directories for duplicates:");
            for dir in &dirs {
                println!("  - {}", dir.display());
            }

            let config = config.with_fpcalc_path(fpcalc).with_fingerprint_length(length);
            let fingerprinter = CachedFingerprinter::new(FpcalcFingerprinter::new(&config));
            let cancel = CancellationFlag::new();

            println!("\nScanning for audio files...");
            let scanner = match LibraryScanner::new(config.clone(), &fingerprinter) {
                Ok(scanner) => scanner,
                Err(e) => {
                    eprintln!("Error initializing scanner: {}", e);
                    std::process::exit(1);
                }
            };
            let tracks = scanner.scan(dirs.as_slice(), &LogProgress, &cancel);
            println!("Found {} audio files", tracks.len());

            if tracks.is_empty() {
                println!("No audio files found to analyze.");
                return;
            }

            println!("\nAnalyzing for duplicates...");
            let detector = match DuplicateDetector::new(&config, MemoryRepository::from_tracks(tracks), &fingerprinter) {
                Ok(detector) => detector,
                Err(e) => {
                    eprintln!("Error initializing duplicate detector: {}", e);
                    std::process::exit(1);
                }
            };
            let groups = detector.analyze_duplicates_with_progress(&LogProgress, &cancel);

            println!("\nFound {} groups of duplicates", groups.len());
            for group in &groups {
                println!("\nOriginal: {}", group.original().path.display());
                for duplicate in group.duplicates() {
                    println!(
                        "  {} match ({:.0}%): {}",
                        duplicate.match_type,
                        duplicate.confidence * 100.0,
                        duplicate.path.display()
                    );
                }
            }

            if let Some(report_path) = output {
                println!("\nGenerating report...");
                match Reporter::new().generate_duplicate_report(&groups, &report_path) {
                    Ok(()) => println!("Report saved to: {}", report_path.display()),
                    Err(e) => eprintln!("Error generating report: {}", e),
                }
            }

            println!("\n=== Duplicate Analysis Complete ===");
        }
    }
}
