//! Error types for the media catalog

use std::path::PathBuf;
use thiserror::Error;

/// Error kinds that can occur while reading or reconciling the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogErrorKind {
    /// Referenced catalog entity does not exist
    NotFound,
    /// Operation invariant violated (e.g. untracking a non-root directory)
    BadRequest,
    /// Disk listing, open or read failed
    Io,
    /// Persistence layer failed
    Storage,
    /// Audio properties or image dimensions could not be extracted
    Metadata,
    /// Failure inside the process itself, unrelated to disk or catalog
    Internal,
}

/// Represents an error raised by the catalog or the scan engine
#[derive(Debug, Error)]
#[error("{kind:?}: {message} (path: {path:?})")]
pub struct CatalogError {
    /// The kind of error
    pub kind: CatalogErrorKind,
    /// The path where the error occurred
    pub path: Option<PathBuf>,
    /// Human-readable error message
    pub message: String,
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, CatalogError>;

impl CatalogError {
    /// Create a new catalog error
    pub fn new(kind: CatalogErrorKind, path: Option<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            kind,
            path,
            message: message.into(),
        }
    }

    /// Create a not found error for a catalog entity
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new(CatalogErrorKind::NotFound, None, resource)
    }

    /// Create a bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(CatalogErrorKind::BadRequest, None, message)
    }

    /// Create an I/O error attached to a path
    pub fn io_error(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        Self::new(CatalogErrorKind::Io, Some(path.into()), err.to_string())
    }

    /// Create a storage error
    pub fn storage_error(message: impl Into<String>) -> Self {
        Self::new(CatalogErrorKind::Storage, None, message)
    }

    /// Create a metadata extraction error
    pub fn metadata_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::new(CatalogErrorKind::Metadata, Some(path.into()), message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(CatalogErrorKind::Internal, None, message)
    }

    /// Whether this error refers to a missing catalog entity
    pub fn is_not_found(&self) -> bool {
        self.kind == CatalogErrorKind::NotFound
    }
}

// An OS-level "not found" stays an I/O error; NotFound is reserved for catalog rows.
impl From<std::io::Error> for CatalogError {
    fn from(err: std::io::Error) -> Self {
        Self::new(CatalogErrorKind::Io, None, err.to_string())
    }
}

impl From<rusqlite::Error> for CatalogError {
    fn from(err: rusqlite::Error) -> Self {
        Self::storage_error(err.to_string())
    }
}

impl From<serde_json::Error> for CatalogError {
    fn from(err: serde_json::Error) -> Self {
        Self::internal(format!("JSON encoding failed: {}", err))
    }
}

impl From<rayon::ThreadPoolBuildError> for CatalogError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        Self::internal(format!("Failed to build thread pool: {}", err))
    }
}

impl From<walkdir::Error> for CatalogError {
    fn from(err: walkdir::Error) -> Self {
        let path = err.path().map(|p| p.to_path_buf());
        Self::new(CatalogErrorKind::Io, path, err.to_string())
    }
}
