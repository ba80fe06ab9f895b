//! Media catalog with on-demand filesystem reconciliation
//!
//! This library mirrors trees of audio and image files into a SQLite
//! catalog and keeps it in sync with disk across repeated scans, using
//! header-based classification and SHA-256 fingerprints to decide what to
//! insert, update or delete.

pub mod classify;
pub mod config;
pub mod db;
pub mod error;
pub mod fingerprint;
pub mod library;
pub mod metadata;
pub mod models;
pub mod progress;
pub mod scanner;

pub use classify::classify_file;
pub use config::CatalogConfig;
pub use db::{CatalogDatabase, CoverRepo, DirectoryRepo, TrackRepo};
pub use error::{CatalogError, CatalogErrorKind, Result};
pub use fingerprint::fingerprint_file;
pub use library::Library;
pub use metadata::{AudioProperties, FileProbe, MetadataProbe};
pub use models::{
    AudioFormat, Cover, Directory, DirectoryContent, ImageFormat, MediaType, NewCover, NewTrack,
    ScanProgress, ScanStats, Track,
};
pub use progress::{ProgressEvent, ProgressReporter, ScanPhase};
pub use scanner::Scanner;
