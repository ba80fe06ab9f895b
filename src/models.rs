//! Core data models for the media catalog

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Audio container recognised by its header bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Mp3,
    Wav,
    Flac,
    Aac,
    Ogg,
    Wma,
    RealAudio,
    Amr,
    /// MP4 audio, including ALAC
    Mp4,
    Midi,
}

/// Image format recognised by its header bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Jpeg,
    Png,
    Gif,
}

/// Media type classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    /// Audio files, becoming tracks
    Audio(AudioFormat),
    /// Image files, becoming covers
    Image(ImageFormat),
    /// Neither audio nor image; ignored by the scanner
    Unknown,
}

impl MediaType {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Audio(_) => "audio",
            MediaType::Image(_) => "image",
            MediaType::Unknown => "unknown",
        }
    }

    pub fn is_audio(&self) -> bool {
        matches!(self, MediaType::Audio(_))
    }

    pub fn is_image(&self) -> bool {
        matches!(self, MediaType::Image(_))
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A node in the mirrored directory tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Directory {
    pub id: i64,
    /// Absolute path for a root, a single path segment otherwise
    pub name: String,
    /// `None` marks a root
    pub parent_id: Option<i64>,
    pub date_added: DateTime<Utc>,
    /// `None` until the first successful scan
    pub last_scanned: Option<DateTime<Utc>>,
}

impl Directory {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Audio file record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: i64,
    pub dir_id: i64,
    pub filename: String,
    /// Lowercase, without the dot
    pub extension: String,
    pub size_byte: u64,
    pub duration_ms: u64,
    pub bitrate_kbps: u32,
    pub sample_rate_hz: u32,
    pub channels_n: u8,
    /// Lowercase hex SHA-256 of the file contents
    pub sha256: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_id: Option<i64>,
    pub last_content_update: DateTime<Utc>,
}

/// Image file record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cover {
    pub id: i64,
    pub dir_id: i64,
    pub filename: String,
    /// Lowercase, without the dot
    pub extension: String,
    pub size_byte: u64,
    pub width_px: u32,
    pub height_px: u32,
    /// Lowercase hex SHA-256 of the file contents
    pub sha256: String,
    pub last_content_update: DateTime<Utc>,
}

/// Track fields extracted from disk, written on insert and update
#[derive(Debug, Clone, PartialEq)]
pub struct NewTrack {
    pub filename: String,
    pub extension: String,
    pub size_byte: u64,
    pub duration_ms: u64,
    pub bitrate_kbps: u32,
    pub sample_rate_hz: u32,
    pub channels_n: u8,
    pub sha256: String,
}

/// Cover fields extracted from disk, written on insert and update
#[derive(Debug, Clone, PartialEq)]
pub struct NewCover {
    pub filename: String,
    pub extension: String,
    pub size_byte: u64,
    pub width_px: u32,
    pub height_px: u32,
    pub sha256: String,
}

/// A directory with its immediate children and content
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryContent {
    pub directory: Directory,
    pub sub_dirs: Vec<Directory>,
    pub tracks: Vec<Track>,
    pub covers: Vec<Cover>,
}

/// Counters collected over one scan invocation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStats {
    /// Directories whose content was reconciled
    pub dirs_scanned: u64,
    pub dirs_created: u64,
    /// Directory rows removed; descendants removed by cascade are not counted
    pub dirs_deleted: u64,
    pub tracks_inserted: u64,
    pub tracks_updated: u64,
    pub tracks_unchanged: u64,
    pub tracks_deleted: u64,
    pub covers_inserted: u64,
    pub covers_updated: u64,
    pub covers_unchanged: u64,
    pub covers_deleted: u64,
    /// Regular files classified as neither audio nor image
    pub skipped_files: u64,
    /// Total scan duration in milliseconds
    pub duration_ms: u64,
}

impl ScanStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of catalog writes, excluding `last_scanned` touches
    pub fn mutations(&self) -> u64 {
        self.dirs_created
            + self.dirs_deleted
            + self.tracks_inserted
            + self.tracks_updated
            + self.tracks_deleted
            + self.covers_inserted
            + self.covers_updated
            + self.covers_deleted
    }

    /// Fold the counters of another scan into this one
    pub fn merge(&mut self, other: &ScanStats) {
        self.dirs_scanned += other.dirs_scanned;
        self.dirs_created += other.dirs_created;
        self.dirs_deleted += other.dirs_deleted;
        self.tracks_inserted += other.tracks_inserted;
        self.tracks_updated += other.tracks_updated;
        self.tracks_unchanged += other.tracks_unchanged;
        self.tracks_deleted += other.tracks_deleted;
        self.covers_inserted += other.covers_inserted;
        self.covers_updated += other.covers_updated;
        self.covers_unchanged += other.covers_unchanged;
        self.covers_deleted += other.covers_deleted;
        self.skipped_files += other.skipped_files;
        self.duration_ms += other.duration_ms;
    }
}

/// Progress information during a scan
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanProgress {
    /// Number of directories finished so far
    pub scanned_dirs: u64,
    /// Number of audio files seen so far
    pub track_count: u64,
    /// Number of image files seen so far
    pub cover_count: u64,
    /// Directory that was just finished
    pub current_dir: String,
    /// Elapsed time in milliseconds
    pub elapsed_ms: u64,
}
