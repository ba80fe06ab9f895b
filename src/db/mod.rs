//! Database module: catalog schema, transaction scope and repositories

use log::{debug, warn};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::path::Path;

use crate::error::Result;

mod covers;
mod directories;
mod tracks;

pub use covers::CoverRepo;
pub use directories::DirectoryRepo;
pub use tracks::TrackRepo;

/// Catalog database handle
pub struct CatalogDatabase {
    conn: Connection,
}

impl CatalogDatabase {
    /// Open or create database
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.configure_pragmas()?;
        db.init_schema()?;
        debug!("Catalog database opened at {}", path.display());
        Ok(db)
    }

    /// Open in-memory database (for testing)
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.configure_pragmas()?;
        db.init_schema()?;
        Ok(db)
    }

    fn configure_pragmas(&self) -> Result<()> {
        // Per connection; foreign_keys is a no-op inside a transaction
        self.conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;
        Ok(())
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS directories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                parent_id INTEGER REFERENCES directories(id) ON DELETE CASCADE,
                date_added TEXT NOT NULL,
                last_scanned TEXT,
                UNIQUE (parent_id, name)
            );
            CREATE INDEX IF NOT EXISTS idx_directories_parent ON directories(parent_id);

            CREATE TABLE IF NOT EXISTS covers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                dir_id INTEGER NOT NULL REFERENCES directories(id) ON DELETE CASCADE,
                filename TEXT NOT NULL,
                extension TEXT NOT NULL,
                size_byte INTEGER NOT NULL,
                width_px INTEGER NOT NULL,
                height_px INTEGER NOT NULL,
                sha256 TEXT NOT NULL,
                last_content_update TEXT NOT NULL,
                UNIQUE (dir_id, filename)
            );
            CREATE INDEX IF NOT EXISTS idx_covers_sha256 ON covers(sha256);

            CREATE TABLE IF NOT EXISTS tracks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                dir_id INTEGER NOT NULL REFERENCES directories(id) ON DELETE CASCADE,
                filename TEXT NOT NULL,
                extension TEXT NOT NULL,
                size_byte INTEGER NOT NULL,
                duration_ms INTEGER NOT NULL,
                bitrate_kbps INTEGER NOT NULL,
                sample_rate_hz INTEGER NOT NULL,
                channels_n INTEGER NOT NULL,
                sha256 TEXT NOT NULL,
                cover_id INTEGER REFERENCES covers(id) ON DELETE SET NULL,
                last_content_update TEXT NOT NULL,
                UNIQUE (dir_id, filename)
            );
            CREATE INDEX IF NOT EXISTS idx_tracks_sha256 ON tracks(sha256);
            CREATE INDEX IF NOT EXISTS idx_tracks_cover ON tracks(cover_id);
            ",
        )?;
        Ok(())
    }

    /// Run `f` inside one atomic unit of work.
    ///
    /// Commits when `f` returns `Ok`, rolls back when it returns `Err`. A panic
    /// inside `f` drops the transaction, which rolls it back as well.
    pub fn with_transaction<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        match f(&tx) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback() {
                    warn!("Rollback failed after {}: {}", err, rollback_err);
                }
                Err(err)
            }
        }
    }

    /// Get the underlying connection (read-only inspection, tests)
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

/// Current time as stored in timestamp columns
pub(crate) fn now() -> chrono::DateTime<chrono::Utc> {
    chrono::Utc::now()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CatalogError, CatalogErrorKind};

    fn count_dirs(db: &CatalogDatabase) -> i64 {
        db.connection()
            .query_row("SELECT COUNT(*) FROM directories", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_commit_on_success() {
        let mut db = CatalogDatabase::open_memory().unwrap();
        let id = db
            .with_transaction(|tx| DirectoryRepo.create(tx, None, "/music"))
            .unwrap();
        assert!(id > 0);
        assert_eq!(count_dirs(&db), 1);
    }

    #[test]
    fn test_rollback_on_error() {
        let mut db = CatalogDatabase::open_memory().unwrap();
        let result: Result<()> = db.with_transaction(|tx| {
            DirectoryRepo.create(tx, None, "/music")?;
            Err(CatalogError::bad_request("abort"))
        });
        assert_eq!(result.unwrap_err().kind, CatalogErrorKind::BadRequest);
        assert_eq!(count_dirs(&db), 0);
    }

    #[test]
    fn test_rollback_on_panic() {
        let mut db = CatalogDatabase::open_memory().unwrap();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _: Result<()> = db.with_transaction(|tx| {
                DirectoryRepo.create(tx, None, "/music")?;
                panic!("scan blew up");
            });
        }));
        assert!(outcome.is_err());
        assert_eq!(count_dirs(&db), 0);

        // The connection is usable again afterwards
        db.with_transaction(|tx| DirectoryRepo.create(tx, None, "/other"))
            .unwrap();
        assert_eq!(count_dirs(&db), 1);
    }

    #[test]
    fn test_open_file_database_persists() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("catalog.db");
        {
            let mut db = CatalogDatabase::open(&path).unwrap();
            db.with_transaction(|tx| DirectoryRepo.create(tx, None, "/music"))
                .unwrap();
        }
        let db = CatalogDatabase::open(&path).unwrap();
        assert_eq!(count_dirs(&db), 1);
    }
}
