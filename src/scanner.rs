//! Scanner module - reconciles a catalog subtree with the directory tree on disk
//!
//! A scan runs depth first over an explicit worklist. Each directory is
//! visited twice: on `Enter` its child directories are brought in line with
//! disk, on `Exit` (after every child has exited) its own tracks and covers
//! are reconciled and `last_scanned` is touched. Directories are addressed by
//! id only, so a row deleted mid-scan never leaves a dangling reference.

use chrono::Utc;
use log::{debug, warn};
use rayon::prelude::*;
use rayon::ThreadPool;
use rusqlite::Transaction;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;
use walkdir::WalkDir;

use crate::classify::classify_file;
use crate::config::MIN_HEADER_LEN;
use crate::db::{CoverRepo, DirectoryRepo, TrackRepo};
use crate::error::{CatalogError, Result};
use crate::fingerprint::fingerprint_file;
use crate::metadata::MetadataProbe;
use crate::models::{Cover, Directory, MediaType, NewCover, NewTrack, ScanProgress, ScanStats, Track};
use crate::progress::{ProgressReporter, ScanPhase};

/// One entry of a directory listing
#[derive(Debug, Clone)]
pub struct DiskEntry {
    pub name: String,
    pub path: PathBuf,
    pub is_dir: bool,
    pub is_file: bool,
}

/// List the immediate children of `dir`, sorted by name
///
/// Symlinks are reported as neither directories nor files. Names that are not
/// valid UTF-8 cannot be stored and are skipped.
pub fn list_entries(dir: &Path) -> Result<Vec<DiskEntry>> {
    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
        .sort_by_file_name();

    let mut entries = Vec::new();
    for entry in walker {
        let entry = entry?;
        let Some(name) = entry.file_name().to_str() else {
            warn!("Skipping entry with non UTF-8 name: {:?}", entry.path());
            continue;
        };
        let file_type = entry.file_type();
        entries.push(DiskEntry {
            name: name.to_string(),
            path: entry.path().to_path_buf(),
            is_dir: file_type.is_dir(),
            is_file: file_type.is_file(),
        });
    }
    Ok(entries)
}

/// Lowercase extension without the dot, empty if there is none
pub fn extension_of(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default()
}

/// Whether `path` still exists as a directory; other stat failures are errors
fn directory_exists(path: &Path) -> Result<bool> {
    match fs::metadata(path) {
        Ok(metadata) => Ok(metadata.is_dir()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(CatalogError::io_error(path, e)),
    }
}

/// A classified audio or image file with its fingerprint
struct Candidate<'e> {
    entry: &'e DiskEntry,
    media_type: MediaType,
    size_byte: u64,
    sha256: String,
}

fn inspect_file(entry: &DiskEntry, header_len: usize) -> Result<Option<Candidate<'_>>> {
    let media_type = classify_file(&entry.path, header_len)?;
    if media_type == MediaType::Unknown {
        return Ok(None);
    }
    let size_byte = fs::metadata(&entry.path)
        .map_err(|e| CatalogError::io_error(&entry.path, e))?
        .len();
    let sha256 = fingerprint_file(&entry.path)?;
    Ok(Some(Candidate {
        entry,
        media_type,
        size_byte,
        sha256,
    }))
}

enum Visit {
    Enter { id: i64, path: PathBuf },
    Exit { id: i64, path: PathBuf, entries: Vec<DiskEntry> },
}

/// Reconciles one catalog subtree inside a caller-owned transaction
pub struct Scanner<'a, P: MetadataProbe> {
    probe: &'a P,
    pool: &'a ThreadPool,
    reporter: Option<&'a ProgressReporter>,
    header_len: usize,
    dirs: DirectoryRepo,
    tracks: TrackRepo,
    covers: CoverRepo,
    stats: ScanStats,
    progress: ScanProgress,
    started: Instant,
}

impl<'a, P: MetadataProbe> Scanner<'a, P> {
    pub fn new(probe: &'a P, pool: &'a ThreadPool) -> Self {
        Self {
            probe,
            pool,
            reporter: None,
            header_len: MIN_HEADER_LEN,
            dirs: DirectoryRepo,
            tracks: TrackRepo,
            covers: CoverRepo,
            stats: ScanStats::new(),
            progress: ScanProgress::default(),
            started: Instant::now(),
        }
    }

    /// Set the number of header bytes used for classification
    pub fn header_len(mut self, len: usize) -> Self {
        self.header_len = len.max(MIN_HEADER_LEN);
        self
    }

    /// Attach a progress reporter
    pub fn reporter(mut self, reporter: &'a ProgressReporter) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Reconcile the subtree rooted at `dir_id` with disk.
    ///
    /// Fails with `NotFound` if `dir_id` is not in the catalog. A directory
    /// that no longer exists on disk is deleted (with its subtree) and the
    /// scan succeeds. Any other failure aborts the scan; the caller is
    /// expected to roll back `tx`.
    pub fn scan(&mut self, tx: &Transaction<'_>, dir_id: i64) -> Result<ScanStats> {
        self.stats = ScanStats::new();
        self.progress = ScanProgress::default();
        self.started = Instant::now();
        debug!("Scanning directory id={}", dir_id);

        let path = match self.dirs.absolute_path(tx, dir_id)? {
            Some(path) => path,
            None => {
                return Err(CatalogError::not_found(format!(
                    "directory with id={}",
                    dir_id
                )))
            }
        };

        if let Some(reporter) = self.reporter {
            reporter.report_start(dir_id, &path);
        }

        match self.run(tx, dir_id, path) {
            Ok(()) => {
                self.stats.duration_ms = self.started.elapsed().as_millis() as u64;
                if let Some(reporter) = self.reporter {
                    reporter.report_done(&self.stats);
                }
                debug!("Directory id={} scanned: {:?}", dir_id, self.stats);
                Ok(self.stats.clone())
            }
            Err(err) => {
                if let Some(reporter) = self.reporter {
                    reporter.report_error(&err);
                }
                Err(err)
            }
        }
    }

    fn run(&mut self, tx: &Transaction<'_>, dir_id: i64, path: PathBuf) -> Result<()> {
        let mut worklist = vec![Visit::Enter { id: dir_id, path }];

        while let Some(visit) = worklist.pop() {
            match visit {
                Visit::Enter { id, path } => {
                    if !directory_exists(&path)? {
                        debug!("{} is gone from disk, removing id={}", path.display(), id);
                        self.dirs.delete(tx, id)?;
                        self.stats.dirs_deleted += 1;
                        continue;
                    }

                    let entries = list_entries(&path)?;
                    let children = self.actualize_sub_dirs(tx, id, &entries)?;
                    self.report(ScanPhase::Structure, &path);

                    let child_visits: Vec<Visit> = children
                        .into_iter()
                        .map(|child| Visit::Enter {
                            path: path.join(&child.name),
                            id: child.id,
                        })
                        .collect();
                    worklist.push(Visit::Exit { id, path, entries });
                    // Reversed so children are entered in name order
                    worklist.extend(child_visits.into_iter().rev());
                }
                Visit::Exit { id, path, entries } => {
                    self.scan_content(tx, id, &entries)?;
                    self.dirs.touch_last_scanned(tx, id, Utc::now())?;
                    self.stats.dirs_scanned += 1;
                    self.progress.scanned_dirs += 1;
                    self.report(ScanPhase::Content, &path);
                }
            }
        }
        Ok(())
    }

    /// Create rows for new on-disk subdirectories, delete rows for vanished
    /// ones, and return the resulting child list.
    fn actualize_sub_dirs(
        &mut self,
        tx: &Transaction<'_>,
        dir_id: i64,
        entries: &[DiskEntry],
    ) -> Result<Vec<Directory>> {
        let on_disk: HashSet<&str> = entries
            .iter()
            .filter(|e| e.is_dir)
            .map(|e| e.name.as_str())
            .collect();
        let existing = self.dirs.read_sub_dirs(tx, dir_id)?;
        let known: HashSet<&str> = existing.iter().map(|d| d.name.as_str()).collect();

        for entry in entries.iter().filter(|e| e.is_dir) {
            if !known.contains(entry.name.as_str()) {
                let child_id = self.dirs.create(tx, Some(dir_id), &entry.name)?;
                debug!("New directory {} id={}", entry.path.display(), child_id);
                self.stats.dirs_created += 1;
            }
        }

        for dir in &existing {
            if !on_disk.contains(dir.name.as_str()) {
                debug!("Directory {} id={} vanished", dir.name, dir.id);
                self.dirs.delete(tx, dir.id)?;
                self.stats.dirs_deleted += 1;
            }
        }

        self.dirs.read_sub_dirs(tx, dir_id)
    }

    fn scan_content(
        &mut self,
        tx: &Transaction<'_>,
        dir_id: i64,
        entries: &[DiskEntry],
    ) -> Result<()> {
        let files: Vec<&DiskEntry> = entries.iter().filter(|e| e.is_file).collect();

        // Classification and hashing are read-only, so they fan out; every
        // catalog write below stays on this thread.
        let header_len = self.header_len;
        let inspected: Vec<Option<Candidate<'_>>> = self.pool.install(|| {
            files
                .par_iter()
                .map(|entry| inspect_file(*entry, header_len))
                .collect::<Result<Vec<_>>>()
        })?;

        let candidates: Vec<Candidate<'_>> = inspected.into_iter().flatten().collect();
        self.stats.skipped_files += (files.len() - candidates.len()) as u64;

        let (audio, images): (Vec<Candidate<'_>>, Vec<Candidate<'_>>) = candidates
            .into_iter()
            .partition(|c| c.media_type.is_audio());
        self.progress.track_count += audio.len() as u64;
        self.progress.cover_count += images.len() as u64;

        self.sync_tracks(tx, dir_id, &audio)?;
        self.sync_covers(tx, dir_id, &images)?;
        Ok(())
    }

    fn sync_tracks(
        &mut self,
        tx: &Transaction<'_>,
        dir_id: i64,
        audio: &[Candidate<'_>],
    ) -> Result<()> {
        let mut catalog: HashMap<String, Track> = self
            .tracks
            .read_all_by_dir(tx, dir_id)?
            .into_iter()
            .map(|t| (t.filename.clone(), t))
            .collect();

        for candidate in audio {
            match catalog.remove(&candidate.entry.name) {
                Some(track) if track.sha256 == candidate.sha256 => {
                    self.stats.tracks_unchanged += 1;
                }
                Some(track) => {
                    let new_track = self.describe_track(candidate)?;
                    self.tracks.update(tx, track.id, dir_id, &new_track)?;
                    debug!("Track {} id={} changed", candidate.entry.path.display(), track.id);
                    self.stats.tracks_updated += 1;
                }
                None => {
                    let new_track = self.describe_track(candidate)?;
                    let id = self.tracks.create(tx, dir_id, &new_track)?;
                    debug!("New track {} id={}", candidate.entry.path.display(), id);
                    self.stats.tracks_inserted += 1;
                }
            }
        }

        // Whatever is left has no audio file on disk any more
        for track in catalog.into_values() {
            debug!("Track {} id={} vanished", track.filename, track.id);
            self.tracks.delete(tx, track.id)?;
            self.stats.tracks_deleted += 1;
        }
        Ok(())
    }

    fn sync_covers(
        &mut self,
        tx: &Transaction<'_>,
        dir_id: i64,
        images: &[Candidate<'_>],
    ) -> Result<()> {
        let mut catalog: HashMap<String, Cover> = self
            .covers
            .read_all_by_dir(tx, dir_id)?
            .into_iter()
            .map(|c| (c.filename.clone(), c))
            .collect();

        for candidate in images {
            match catalog.remove(&candidate.entry.name) {
                Some(cover) if cover.sha256 == candidate.sha256 => {
                    self.stats.covers_unchanged += 1;
                }
                Some(cover) => {
                    let new_cover = self.describe_cover(candidate)?;
                    self.covers.update(tx, cover.id, dir_id, &new_cover)?;
                    self.stats.covers_updated += 1;
                }
                None => {
                    let new_cover = self.describe_cover(candidate)?;
                    let id = self.covers.create(tx, dir_id, &new_cover)?;
                    debug!("New cover {} id={}", candidate.entry.path.display(), id);
                    self.stats.covers_inserted += 1;
                }
            }
        }

        for cover in catalog.into_values() {
            self.covers.delete(tx, cover.id)?;
            self.stats.covers_deleted += 1;
        }
        Ok(())
    }

    fn describe_track(&self, candidate: &Candidate<'_>) -> Result<NewTrack> {
        let props = self.probe.audio_properties(&candidate.entry.path)?;
        Ok(NewTrack {
            filename: candidate.entry.name.clone(),
            extension: extension_of(&candidate.entry.name),
            size_byte: candidate.size_byte,
            duration_ms: props.duration_ms,
            bitrate_kbps: props.bitrate_kbps,
            sample_rate_hz: props.sample_rate_hz,
            channels_n: props.channels_n,
            sha256: candidate.sha256.clone(),
        })
    }

    fn describe_cover(&self, candidate: &Candidate<'_>) -> Result<NewCover> {
        let (width_px, height_px) = self.probe.image_dimensions(&candidate.entry.path)?;
        Ok(NewCover {
            filename: candidate.entry.name.clone(),
            extension: extension_of(&candidate.entry.name),
            size_byte: candidate.size_byte,
            width_px,
            height_px,
            sha256: candidate.sha256.clone(),
        })
    }

    fn report(&mut self, phase: ScanPhase, path: &Path) {
        if let Some(reporter) = self.reporter {
            if reporter.should_report() {
                self.progress.current_dir = path.to_string_lossy().to_string();
                self.progress.elapsed_ms = self.started.elapsed().as_millis() as u64;
                reporter.report_progress(phase, &self.progress);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::CatalogDatabase;
    use crate::error::CatalogErrorKind;
    use crate::metadata::AudioProperties;
    use tempfile::TempDir;

    struct FixedProbe;

    impl MetadataProbe for FixedProbe {
        fn audio_properties(&self, _path: &Path) -> Result<AudioProperties> {
            Ok(AudioProperties {
                duration_ms: 1_000,
                bitrate_kbps: 128,
                sample_rate_hz: 48_000,
                channels_n: 1,
            })
        }

        fn image_dimensions(&self, _path: &Path) -> Result<(u32, u32)> {
            Ok((10, 20))
        }
    }

    fn pool() -> ThreadPool {
        rayon::ThreadPoolBuilder::new().num_threads(2).build().unwrap()
    }

    fn write_mp3(path: &Path, payload: &[u8]) {
        let mut bytes = b"ID3\x04\x00\x00\x00\x00\x00\x00".to_vec();
        bytes.extend_from_slice(payload);
        fs::write(path, bytes).unwrap();
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("Song.MP3"), "mp3");
        assert_eq!(extension_of("archive.tar.gz"), "gz");
        assert_eq!(extension_of("README"), "");
    }

    #[test]
    fn test_list_entries_is_shallow_and_sorted() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("b_dir")).unwrap();
        fs::create_dir_all(dir.path().join("a_dir/nested")).unwrap();
        fs::write(dir.path().join("c.txt"), b"x").unwrap();

        let entries = list_entries(dir.path()).unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a_dir", "b_dir", "c.txt"]);
        assert!(entries[0].is_dir && !entries[0].is_file);
        assert!(entries[2].is_file);
    }

    #[test]
    fn test_list_missing_directory_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = list_entries(&dir.path().join("missing")).unwrap_err();
        assert_eq!(err.kind, CatalogErrorKind::Io);
    }

    #[test]
    fn test_scan_unknown_directory_is_not_found() {
        let pool = pool();
        let mut db = CatalogDatabase::open_memory().unwrap();
        let err = db
            .with_transaction(|tx| Scanner::new(&FixedProbe, &pool).scan(tx, 42))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_nested_scan_builds_tree_and_content() {
        let disk = TempDir::new().unwrap();
        fs::create_dir_all(disk.path().join("Artist/Album")).unwrap();
        write_mp3(&disk.path().join("Artist/Album/01.mp3"), b"one");
        write_mp3(&disk.path().join("Artist/Album/02.mp3"), b"two");
        fs::write(disk.path().join("Artist/notes.txt"), b"liner notes").unwrap();
        fs::write(
            disk.path().join("Artist/Album/front.png"),
            b"\x89PNG\r\n\x1a\n-not-a-real-png",
        )
        .unwrap();

        let pool = pool();
        let mut db = CatalogDatabase::open_memory().unwrap();
        let root_name = disk.path().to_str().unwrap().to_string();
        let stats = db
            .with_transaction(|tx| {
                let root = DirectoryRepo.create(tx, None, &root_name)?;
                Scanner::new(&FixedProbe, &pool).scan(tx, root)
            })
            .unwrap();

        assert_eq!(stats.dirs_created, 2);
        assert_eq!(stats.dirs_scanned, 3);
        assert_eq!(stats.tracks_inserted, 2);
        assert_eq!(stats.covers_inserted, 1);
        assert_eq!(stats.skipped_files, 1);

        db.with_transaction(|tx| {
            let tracks = TrackRepo.read_all(tx)?;
            assert_eq!(tracks.len(), 2);
            let album = tracks[0].dir_id;
            assert_eq!(
                DirectoryRepo.absolute_path(tx, album)?,
                Some(disk.path().join("Artist/Album"))
            );
            assert_eq!(tracks[0].sample_rate_hz, 48_000);
            assert_eq!(tracks[0].extension, "mp3");
            let cover = &CoverRepo.read_all(tx)?[0];
            assert_eq!((cover.width_px, cover.height_px), (10, 20));
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_every_directory_gets_last_scanned() {
        let disk = TempDir::new().unwrap();
        fs::create_dir_all(disk.path().join("x/y")).unwrap();

        let pool = pool();
        let mut db = CatalogDatabase::open_memory().unwrap();
        let root_name = disk.path().to_str().unwrap().to_string();
        db.with_transaction(|tx| {
            let root = DirectoryRepo.create(tx, None, &root_name)?;
            Scanner::new(&FixedProbe, &pool).scan(tx, root)?;

            let x = &DirectoryRepo.read_sub_dirs(tx, root)?[0];
            let y = &DirectoryRepo.read_sub_dirs(tx, x.id)?[0];
            let root_dir = DirectoryRepo.read(tx, root)?.unwrap();
            assert!(root_dir.last_scanned.is_some());
            assert!(x.last_scanned.is_some());
            assert!(y.last_scanned.is_some());
            // Children finish before their parent
            assert!(y.last_scanned <= x.last_scanned);
            assert!(x.last_scanned <= root_dir.last_scanned);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_unreadable_file_aborts_scan_and_rolls_back() {
        let disk = TempDir::new().unwrap();
        write_mp3(&disk.path().join("a.mp3"), b"kept");
        write_mp3(&disk.path().join("b.mp3"), b"vanishes");

        let pool = pool();
        let mut db = CatalogDatabase::open_memory().unwrap();
        let root_name = disk.path().to_str().unwrap().to_string();
        let root = db
            .with_transaction(|tx| DirectoryRepo.create(tx, None, &root_name))
            .unwrap();

        let err = db
            .with_transaction(|tx| {
                DirectoryRepo.create(tx, Some(root), "written_before_failure")?;
                let entries = list_entries(disk.path())?;
                // Gone between listing and content sync
                fs::remove_file(disk.path().join("b.mp3")).unwrap();
                Scanner::new(&FixedProbe, &pool).scan_content(tx, root, &entries)
            })
            .unwrap_err();
        assert_eq!(err.kind, CatalogErrorKind::Io);
        assert_eq!(err.path, Some(disk.path().join("b.mp3")));

        db.with_transaction(|tx| {
            let dir = DirectoryRepo.read(tx, root)?.unwrap();
            assert!(dir.last_scanned.is_none());
            assert!(DirectoryRepo.read_sub_dirs(tx, root)?.is_empty());
            assert!(TrackRepo.read_all(tx)?.is_empty());
            Ok(())
        })
        .unwrap();
    }
}
