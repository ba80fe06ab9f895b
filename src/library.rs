//! Library service: catalog operations, each in its own transaction
//!
//! This is the surface external layers (the CLI, or any future transport)
//! call into. Every method opens exactly one transaction scope; a scan and
//! its whole subtree share that single scope.

use log::{debug, info, warn};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::CatalogConfig;
use crate::db::{CatalogDatabase, CoverRepo, DirectoryRepo, TrackRepo};
use crate::error::{CatalogError, Result};
use crate::metadata::{FileProbe, MetadataProbe};
use crate::models::{Cover, Directory, DirectoryContent, ScanStats, Track};
use crate::progress::ProgressReporter;
use crate::scanner::Scanner;

/// Media catalog backed by SQLite
pub struct Library<P: MetadataProbe = FileProbe> {
    db: CatalogDatabase,
    probe: P,
    config: CatalogConfig,
    pool: ThreadPool,
    reporter: ProgressReporter,
}

impl Library<FileProbe> {
    /// Open the catalog at `config.db_path` with the default probe
    pub fn open(config: CatalogConfig) -> Result<Self> {
        let db = CatalogDatabase::open(&config.db_path)?;
        Self::with_probe(db, FileProbe::new(), config)
    }
}

impl<P: MetadataProbe> Library<P> {
    /// Build a library over an already opened database
    pub fn with_probe(db: CatalogDatabase, probe: P, config: CatalogConfig) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.effective_threads())
            .build()?;
        let reporter = ProgressReporter::new(config.show_progress, config.progress_interval_ms);
        Ok(Self {
            db,
            probe,
            config,
            pool,
            reporter,
        })
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    pub fn database(&self) -> &CatalogDatabase {
        &self.db
    }

    /// Register an absolute directory path as a new tracked root
    ///
    /// The root is only registered; call [`Library::scan`] to index it.
    pub fn add_root(&mut self, path: &Path) -> Result<Directory> {
        if !path.is_absolute() {
            return Err(CatalogError::bad_request(format!(
                "{} is not an absolute path",
                path.display()
            )));
        }
        match fs::metadata(path) {
            Ok(metadata) if metadata.is_dir() => {}
            Ok(_) => {
                return Err(CatalogError::bad_request(format!(
                    "{} is not a directory",
                    path.display()
                )))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(CatalogError::bad_request(format!(
                    "{} does not exist",
                    path.display()
                )))
            }
            Err(e) => return Err(CatalogError::io_error(path, e)),
        }
        let canonical = fs::canonicalize(path).map_err(|e| CatalogError::io_error(path, e))?;
        let name = canonical
            .to_str()
            .ok_or_else(|| {
                CatalogError::bad_request(format!("{} is not valid UTF-8", canonical.display()))
            })?
            .to_string();

        let dir = self.db.with_transaction(|tx| {
            if DirectoryRepo.exists_by_parent_and_name(tx, None, &name)? {
                return Err(CatalogError::bad_request(format!(
                    "{} is already tracked",
                    name
                )));
            }
            let id = DirectoryRepo.create(tx, None, &name)?;
            DirectoryRepo
                .read(tx, id)?
                .ok_or_else(|| CatalogError::storage_error(format!("directory id={} vanished", id)))
        })?;

        info!("Tracking root {} as id={}", dir.name, dir.id);
        Ok(dir)
    }

    /// Stop tracking a root; its whole subtree leaves the catalog
    pub fn untrack_root(&mut self, dir_id: i64) -> Result<()> {
        self.db.with_transaction(|tx| {
            let dir = DirectoryRepo.read(tx, dir_id)?.ok_or_else(|| {
                warn!("Directory id={} not found in catalog", dir_id);
                CatalogError::not_found(format!("directory with id={}", dir_id))
            })?;
            if !dir.is_root() {
                return Err(CatalogError::bad_request(format!(
                    "directory with id={} is not root",
                    dir_id
                )));
            }
            DirectoryRepo.delete(tx, dir_id)
        })?;
        info!("Directory id={} removed from tracked", dir_id);
        Ok(())
    }

    /// Reconcile the subtree rooted at `dir_id` with disk
    pub fn scan(&mut self, dir_id: i64) -> Result<ScanStats> {
        info!("Scanning directory id={}", dir_id);
        let stats = self.db.with_transaction(|tx| {
            Scanner::new(&self.probe, &self.pool)
                .header_len(self.config.effective_header_len())
                .reporter(&self.reporter)
                .scan(tx, dir_id)
        })?;
        info!(
            "Directory id={} scanned in {}ms ({} catalog changes)",
            dir_id,
            stats.duration_ms,
            stats.mutations()
        );
        Ok(stats)
    }

    /// Reconcile every tracked root in a single transaction
    pub fn scan_all(&mut self) -> Result<ScanStats> {
        let stats = self.db.with_transaction(|tx| {
            let mut scanner = Scanner::new(&self.probe, &self.pool)
                .header_len(self.config.effective_header_len())
                .reporter(&self.reporter);
            let mut total = ScanStats::new();
            for root in DirectoryRepo.read_roots(tx)? {
                debug!("Scanning root {} id={}", root.name, root.id);
                total.merge(&scanner.scan(tx, root.id)?);
            }
            Ok(total)
        })?;
        info!(
            "All roots scanned in {}ms ({} catalog changes)",
            stats.duration_ms,
            stats.mutations()
        );
        Ok(stats)
    }

    pub fn list_roots(&mut self) -> Result<Vec<Directory>> {
        self.db.with_transaction(|tx| DirectoryRepo.read_roots(tx))
    }

    /// A directory with its child directories, tracks and covers
    pub fn read_content(&mut self, dir_id: i64) -> Result<DirectoryContent> {
        self.db.with_transaction(|tx| {
            let directory = DirectoryRepo
                .read(tx, dir_id)?
                .ok_or_else(|| CatalogError::not_found(format!("directory with id={}", dir_id)))?;
            Ok(DirectoryContent {
                sub_dirs: DirectoryRepo.read_sub_dirs(tx, dir_id)?,
                tracks: TrackRepo.read_all_by_dir(tx, dir_id)?,
                covers: CoverRepo.read_all_by_dir(tx, dir_id)?,
                directory,
            })
        })
    }

    pub fn absolute_path(&mut self, dir_id: i64) -> Result<PathBuf> {
        self.db.with_transaction(|tx| {
            DirectoryRepo
                .absolute_path(tx, dir_id)?
                .ok_or_else(|| CatalogError::not_found(format!("directory with id={}", dir_id)))
        })
    }

    pub fn list_tracks(&mut self) -> Result<Vec<Track>> {
        self.db.with_transaction(|tx| TrackRepo.read_all(tx))
    }

    pub fn get_track(&mut self, track_id: i64) -> Result<Track> {
        self.db.with_transaction(|tx| {
            TrackRepo
                .read(tx, track_id)?
                .ok_or_else(|| CatalogError::not_found(format!("track with id={}", track_id)))
        })
    }

    pub fn get_cover(&mut self, cover_id: i64) -> Result<Cover> {
        self.db.with_transaction(|tx| {
            CoverRepo
                .read(tx, cover_id)?
                .ok_or_else(|| CatalogError::not_found(format!("cover with id={}", cover_id)))
        })
    }

    /// The cover linked to a track
    pub fn cover_for_track(&mut self, track_id: i64) -> Result<Cover> {
        self.db.with_transaction(|tx| {
            let track = TrackRepo
                .read(tx, track_id)?
                .ok_or_else(|| CatalogError::not_found(format!("track with id={}", track_id)))?;
            let cover_id = track.cover_id.ok_or_else(|| {
                CatalogError::not_found(format!("cover for track with id={}", track_id))
            })?;
            CoverRepo
                .read(tx, cover_id)?
                .ok_or_else(|| CatalogError::not_found(format!("cover with id={}", cover_id)))
        })
    }

    /// Link a track to a cover, or clear the link with `None`
    pub fn assign_cover(&mut self, track_id: i64, cover_id: Option<i64>) -> Result<()> {
        self.db.with_transaction(|tx| {
            if !TrackRepo.exists(tx, track_id)? {
                return Err(CatalogError::not_found(format!("track with id={}", track_id)));
            }
            if let Some(cover_id) = cover_id {
                if !CoverRepo.exists(tx, cover_id)? {
                    return Err(CatalogError::not_found(format!("cover with id={}", cover_id)));
                }
            }
            TrackRepo.set_cover(tx, track_id, cover_id)
        })
    }
}
