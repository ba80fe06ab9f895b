//! Configuration for the media catalog

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Minimum number of header bytes inspected by the classifier
pub const MIN_HEADER_LEN: usize = 261;

/// Default database file name
pub const DEFAULT_DB_PATH: &str = "media_catalog.db";

/// Default interval between progress messages
pub const DEFAULT_PROGRESS_INTERVAL_MS: u64 = 500;

/// Configuration for the catalog and its scanner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// SQLite database path
    pub db_path: PathBuf,

    /// Number of header bytes read for classification
    /// Values below 261 are raised to 261
    pub header_len: usize,

    /// Number of threads for classifying and hashing files
    /// 0 means auto-detect (CPU cores)
    pub num_threads: usize,

    /// Whether to emit JSON progress lines on stderr
    pub show_progress: bool,

    /// Minimum interval between progress lines
    pub progress_interval_ms: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            header_len: MIN_HEADER_LEN,
            num_threads: 0,
            show_progress: false,
            progress_interval_ms: DEFAULT_PROGRESS_INTERVAL_MS,
        }
    }
}

impl CatalogConfig {
    pub fn builder() -> CatalogConfigBuilder {
        CatalogConfigBuilder::new()
    }

    /// Header length actually read by the classifier
    pub fn effective_header_len(&self) -> usize {
        self.header_len.max(MIN_HEADER_LEN)
    }

    /// Size of the rayon pool; `num_threads == 0` means one per core
    pub fn effective_threads(&self) -> usize {
        if self.num_threads == 0 {
            std::thread::available_parallelism()
                .map(|p| p.get())
                .unwrap_or(4)
        } else {
            self.num_threads
        }
    }
}

/// Builder for [`CatalogConfig`], starting from the defaults
#[derive(Debug, Default)]
pub struct CatalogConfigBuilder {
    config: CatalogConfig,
}

impl CatalogConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn db_path(mut self, path: PathBuf) -> Self {
        self.config.db_path = path;
        self
    }

    pub fn header_len(mut self, len: usize) -> Self {
        self.config.header_len = len;
        self
    }

    pub fn num_threads(mut self, threads: usize) -> Self {
        self.config.num_threads = threads;
        self
    }

    pub fn show_progress(mut self, enabled: bool) -> Self {
        self.config.show_progress = enabled;
        self
    }

    pub fn progress_interval_ms(mut self, interval: u64) -> Self {
        self.config.progress_interval_ms = interval;
        self
    }

    pub fn build(self) -> CatalogConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CatalogConfig::default();
        assert_eq!(config.db_path, PathBuf::from(DEFAULT_DB_PATH));
        assert_eq!(config.header_len, MIN_HEADER_LEN);
        assert!(!config.show_progress);
    }

    #[test]
    fn test_header_len_floor() {
        let config = CatalogConfig::builder().header_len(16).build();
        assert_eq!(config.effective_header_len(), MIN_HEADER_LEN);

        let config = CatalogConfig::builder().header_len(4096).build();
        assert_eq!(config.effective_header_len(), 4096);
    }

    #[test]
    fn test_config_builder() {
        let config = CatalogConfig::builder()
            .db_path(PathBuf::from("/tmp/catalog.db"))
            .num_threads(4)
            .show_progress(true)
            .progress_interval_ms(50)
            .build();

        assert_eq!(config.db_path, PathBuf::from("/tmp/catalog.db"));
        assert_eq!(config.num_threads, 4);
        assert!(config.show_progress);
        assert_eq!(config.progress_interval_ms, 50);
    }

    #[test]
    fn test_effective_threads() {
        let config = CatalogConfig::builder().num_threads(8).build();
        assert_eq!(config.effective_threads(), 8);

        let auto_config = CatalogConfig::default();
        assert!(auto_config.effective_threads() > 0);
    }
}
