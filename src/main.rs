//! Media Catalog CLI
//!
//! Registers music directories and keeps their catalog in sync with disk.

use clap::{Parser, Subcommand};
use env_logger::Env;
use log::{error, info};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;

use media_catalog::{CatalogConfig, CatalogError, DirectoryContent, Library, ScanStats};

const ABOUT: &str = r#"
Media Catalog - keeps a SQLite catalog of audio and image files in sync with disk

Examples:
  media_catalog add /srv/music                  track a new root directory
  media_catalog scan 1                          reconcile root 1 with disk
  media_catalog scan-all --progress             reconcile every root
  media_catalog ls 1 --json                     show a directory's content as JSON
  media_catalog -d library.db roots             use a specific database file
"#;

#[derive(Parser)]
#[command(name = "media_catalog")]
#[command(author, version, about = ABOUT, long_about = None)]
struct Cli {
    /// SQLite database file
    #[arg(short = 'd', long, global = true, default_value = "media_catalog.db")]
    db: PathBuf,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Emit JSON progress lines on stderr while scanning
    #[arg(long, global = true)]
    progress: bool,

    /// Threads used to classify and hash files (0 = auto)
    #[arg(short = 't', long, global = true, default_value = "0")]
    threads: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Track a directory as a new root
    Add { path: PathBuf },
    /// Stop tracking a root directory
    Untrack { id: i64 },
    /// Reconcile a directory subtree with disk
    Scan { id: i64 },
    /// Reconcile every tracked root
    ScanAll,
    /// List tracked roots
    Roots,
    /// Show a directory's subdirectories, tracks and covers
    Ls { id: i64 },
    /// List all tracks
    Tracks,
    /// Show one track
    Track { id: i64 },
    /// Show one cover
    Cover { id: i64 },
    /// Link a track to a cover, or clear the link when COVER is omitted
    Link { track: i64, cover: Option<i64> },
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CatalogError> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}

fn print_stats(stats: &ScanStats) {
    println!("Scan completed:");
    println!("  Directories scanned: {}", stats.dirs_scanned);
    println!("  Directories created: {}", stats.dirs_created);
    println!("  Directories deleted: {}", stats.dirs_deleted);
    println!(
        "  Tracks: {} new, {} updated, {} unchanged, {} deleted",
        stats.tracks_inserted, stats.tracks_updated, stats.tracks_unchanged, stats.tracks_deleted
    );
    println!(
        "  Covers: {} new, {} updated, {} unchanged, {} deleted",
        stats.covers_inserted, stats.covers_updated, stats.covers_unchanged, stats.covers_deleted
    );
    println!("  Skipped files: {}", stats.skipped_files);
    println!("  Duration: {}ms", stats.duration_ms);
}

fn print_content(content: &DirectoryContent) {
    println!("[{}] {}", content.directory.id, content.directory.name);
    for dir in &content.sub_dirs {
        println!("  dir   [{}] {}/", dir.id, dir.name);
    }
    for track in &content.tracks {
        println!(
            "  track [{}] {} ({}ms, {}kbps, {}Hz, {}ch)",
            track.id,
            track.filename,
            track.duration_ms,
            track.bitrate_kbps,
            track.sample_rate_hz,
            track.channels_n
        );
    }
    for cover in &content.covers {
        println!(
            "  cover [{}] {} ({}x{})",
            cover.id, cover.filename, cover.width_px, cover.height_px
        );
    }
}

fn run(cli: Cli) -> Result<(), CatalogError> {
    let config = CatalogConfig::builder()
        .db_path(cli.db)
        .num_threads(cli.threads)
        .show_progress(cli.progress)
        .build();
    let mut library = Library::open(config)?;

    match cli.command {
        Commands::Add { path } => {
            let dir = library.add_root(&path)?;
            if cli.json {
                print_json(&dir)?;
            } else {
                println!("Tracking [{}] {}", dir.id, dir.name);
            }
        }
        Commands::Untrack { id } => {
            library.untrack_root(id)?;
            println!("Untracked [{}]", id);
        }
        Commands::Scan { id } => {
            let stats = library.scan(id)?;
            if cli.json {
                print_json(&stats)?;
            } else {
                print_stats(&stats);
            }
        }
        Commands::ScanAll => {
            let stats = library.scan_all()?;
            if cli.json {
                print_json(&stats)?;
            } else {
                print_stats(&stats);
            }
        }
        Commands::Roots => {
            let roots = library.list_roots()?;
            if cli.json {
                print_json(&roots)?;
            } else {
                for root in roots {
                    let scanned = root
                        .last_scanned
                        .map(|t| t.to_rfc3339())
                        .unwrap_or_else(|| "never".to_string());
                    println!("[{}] {} (last scanned: {})", root.id, root.name, scanned);
                }
            }
        }
        Commands::Ls { id } => {
            let content = library.read_content(id)?;
            if cli.json {
                print_json(&content)?;
            } else {
                print_content(&content);
            }
        }
        Commands::Tracks => {
            let tracks = library.list_tracks()?;
            if cli.json {
                print_json(&tracks)?;
            } else {
                for track in tracks {
                    println!("[{}] dir={} {} {}", track.id, track.dir_id, track.filename, track.sha256);
                }
            }
        }
        Commands::Track { id } => print_json(&library.get_track(id)?)?,
        Commands::Cover { id } => print_json(&library.get_cover(id)?)?,
        Commands::Link { track, cover } => {
            library.assign_cover(track, cover)?;
            match cover {
                Some(cover) => println!("Track [{}] now uses cover [{}]", track, cover),
                None => println!("Track [{}] has no cover", track),
            }
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    info!("Using catalog {}", cli.db.display());

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) if err.is_not_found() => {
            error!("Not found: {}", err.message);
            ExitCode::from(2)
        }
        Err(err) => {
            error!("{}", err);
            ExitCode::FAILURE
        }
    }
}
