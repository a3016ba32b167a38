//! ziparc-cli - Command-line interface for ziparc
//!
//! Extracts ZIP archives (from files or a bundled asset directory), packs
//! files and directory trees into ZIP archives, and lists archive entries.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use ziparc_core::assets::DirAssets;
use ziparc_core::config::{parse_size, Config};
use ziparc_core::progress::LogProgress;
use ziparc_core::{EntryNaming, ErrorKind, ExtractOptions, PackOptions, ProgressSink};

mod progress;

use progress::{BarProgress, JsonProgress};

/// ziparc - streaming ZIP extraction and packing
#[derive(Parser)]
#[command(name = "ziparc")]
#[command(author, version, about = "Streaming ZIP extraction and packing", long_about = None)]
struct Cli {
    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Show progress bar during operations
    #[arg(long, global = true)]
    progress: bool,

    /// Print progress events as JSON lines on stderr
    #[arg(long, global = true, conflicts_with = "progress")]
    json_progress: bool,

    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true, env = "ZIPARC_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract a ZIP archive into a directory
    Unzip {
        /// Archive file to extract
        archive: PathBuf,

        /// Destination directory (created if missing)
        destination: PathBuf,

        #[command(flatten)]
        extract: ExtractArgs,
    },

    /// Extract a ZIP archive shipped in an asset directory
    UnzipAsset {
        /// Asset identifier, relative to the asset directory
        asset: String,

        /// Destination directory (created if missing)
        destination: PathBuf,

        /// Directory holding the packaged assets
        #[arg(long)]
        assets: PathBuf,

        #[command(flatten)]
        extract: ExtractArgs,
    },

    /// Pack a file or directory into a ZIP archive
    Zip {
        /// Input file or directory
        source: PathBuf,

        /// Output archive file (replaced if it exists)
        destination: PathBuf,

        /// Do not store entries for directories
        #[arg(long)]
        no_folders: bool,

        /// Name entries by their final path segment only
        #[arg(long)]
        flatten: bool,

        /// Deflate level
        #[arg(long, value_parser = clap::value_parser!(i64).range(0..=9))]
        level: Option<i64>,

        /// Follow symlinks (pack link targets instead of skipping links)
        #[arg(long)]
        follow_symlinks: bool,
    },

    /// List the entries of a ZIP archive
    List {
        /// Archive file to inspect
        archive: PathBuf,

        /// Output format as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(clap::Args)]
struct ExtractArgs {
    /// Write entries even when their names resolve outside the destination
    #[arg(long)]
    allow_path_escape: bool,

    /// Create directories for directory entries (keeps empty directories)
    #[arg(long)]
    keep_dirs: bool,

    /// Copy buffer size (e.g. 64KiB)
    #[arg(long, value_parser = parse_buffer_size)]
    buffer_size: Option<u64>,
}

impl ExtractArgs {
    fn apply(&self, options: &mut ExtractOptions) {
        options.allow_path_escape |= self.allow_path_escape;
        options.create_directory_entries |= self.keep_dirs;
        if let Some(size) = self.buffer_size {
            options.buffer_size = size as usize;
        }
    }
}

fn parse_buffer_size(value: &str) -> std::result::Result<u64, String> {
    match parse_size(value) {
        Ok(0) => Err("buffer size must be greater than zero".to_string()),
        Ok(size) => Ok(size),
        Err(e) => Err(e.to_string()),
    }
}

fn setup_logging(verbose: bool, quiet: bool) {
    if quiet {
        return;
    }

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let result = run();

    match result {
        Ok(_) => process::exit(0),
        Err(e) => {
            error!("Error: {}", e);
            let exit_code = map_error_to_exit_code(&e);
            process::exit(exit_code);
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    match &cli.command {
        Commands::Unzip {
            archive,
            destination,
            extract,
        } => {
            let mut options = ExtractOptions::from(&config.extract);
            extract.apply(&mut options);

            let label = archive.display().to_string();
            let result = with_progress(&cli, &label, |sink| {
                ziparc_core::extract_archive(archive, destination, &options, sink)
            })?;
            println!("{}", result.display());
        }

        Commands::UnzipAsset {
            asset,
            destination,
            assets,
            extract,
        } => {
            let mut options = ExtractOptions::from(&config.extract);
            extract.apply(&mut options);

            let source = DirAssets::new(assets);
            let result = with_progress(&cli, asset, |sink| {
                ziparc_core::extract_asset(&source, asset, destination, &options, sink)
            })?;
            println!("{}", result.display());
        }

        Commands::Zip {
            source,
            destination,
            no_folders,
            flatten,
            level,
            follow_symlinks,
        } => {
            let mut options = PackOptions::from(&config.pack);
            if *no_folders {
                options.include_folders = false;
            }
            if *flatten {
                options.naming = EntryNaming::BaseName;
            }
            if level.is_some() {
                options.compression_level = *level;
            }
            options.follow_symlinks |= *follow_symlinks;

            let label = destination.display().to_string();
            let result = with_progress(&cli, &label, |sink| {
                ziparc_core::create_archive(source, destination, &options, sink)
            })?;
            println!("{}", result.display());
        }

        Commands::List { archive, json } => {
            let entries = list_archive(archive)?;

            if *json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                println!(
                    "{:<50} {:>12} {:>12} {:>10} {:>10}",
                    "Name", "Size", "Compressed", "Method", "CRC-32"
                );
                println!("{}", "-".repeat(98));
                for entry in &entries {
                    let method = match entry.method {
                        ziparc_core::archive::CompressionMethod::Stored => "stored".to_string(),
                        ziparc_core::archive::CompressionMethod::Deflated => {
                            "deflated".to_string()
                        }
                        ziparc_core::archive::CompressionMethod::Other(code) => {
                            format!("#{}", code)
                        }
                    };
                    println!(
                        "{:<50} {:>12} {:>12} {:>10} {:>10}",
                        entry.name,
                        entry.size.unwrap_or_default(),
                        entry.compressed_size.unwrap_or_default(),
                        method,
                        entry
                            .crc32
                            .map(|crc| format!("{:08x}", crc))
                            .unwrap_or_else(|| "-".to_string())
                    );
                }
            }
            info!("{} entries", entries.len());
        }
    }

    Ok(())
}

/// Run `operation` with the progress sink selected on the command line
fn with_progress<T>(
    cli: &Cli,
    label: &str,
    operation: impl FnOnce(&dyn ProgressSink) -> ziparc_core::Result<T>,
) -> ziparc_core::Result<T> {
    if cli.progress && !cli.quiet {
        let bar = BarProgress::new(label);
        let result = operation(&bar);
        bar.finish();
        result
    } else if cli.json_progress {
        operation(&JsonProgress)
    } else {
        operation(&LogProgress)
    }
}

fn list_archive(archive: &Path) -> ziparc_core::Result<Vec<ziparc_core::ArchiveEntry>> {
    let label = archive.display().to_string();
    let file = File::open(archive).map_err(|source| {
        ziparc_core::Error::extraction(
            label.clone(),
            ziparc_core::Error::Open {
                target: label.clone(),
                source,
            },
        )
    })?;
    ziparc_core::list_entries(file).map_err(|e| ziparc_core::Error::extraction(label, e))
}

/// Map errors to exit codes:
/// - 0: Success
/// - 1: General error
/// - 2: IO error (including missing or unreadable inputs)
/// - 3: Rejected input (unsafe entry names, unsupported features)
/// - 4: Malformed archive
/// - 130: Cancelled
fn map_error_to_exit_code(err: &anyhow::Error) -> i32 {
    if let Some(ziparc_err) = err.downcast_ref::<ziparc_core::Error>() {
        match ziparc_err.kind() {
            ErrorKind::NotFound | ErrorKind::Open | ErrorKind::Io => 2,
            ErrorKind::PathTraversal | ErrorKind::Unsupported => 3,
            ErrorKind::MalformedArchive => 4,
            ErrorKind::Config => 1,
            ErrorKind::Cancelled => 130,
        }
    } else if err.is::<std::io::Error>() {
        2
    } else {
        1
    }
}
