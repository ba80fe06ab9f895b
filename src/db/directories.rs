use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row, Transaction};
use std::collections::HashSet;
use std::path::PathBuf;

use crate::error::{CatalogError, Result};
use crate::models::Directory;

const COLUMNS: &str = "id, name, parent_id, date_added, last_scanned";

/// Repository over the `directories` table
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectoryRepo;

fn map_row(row: &Row<'_>) -> rusqlite::Result<Directory> {
    Ok(Directory {
        id: row.get(0)?,
        name: row.get(1)?,
        parent_id: row.get(2)?,
        date_added: row.get(3)?,
        last_scanned: row.get(4)?,
    })
}

impl DirectoryRepo {
    pub fn exists(&self, tx: &Transaction<'_>, id: i64) -> Result<bool> {
        let found: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM directories WHERE id = ?1)",
            [id],
            |row| row.get(0),
        )?;
        Ok(found)
    }

    /// `parent` of `None` checks among roots
    pub fn exists_by_parent_and_name(
        &self,
        tx: &Transaction<'_>,
        parent: Option<i64>,
        name: &str,
    ) -> Result<bool> {
        let found: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM directories WHERE parent_id IS ?1 AND name = ?2)",
            params![parent, name],
            |row| row.get(0),
        )?;
        Ok(found)
    }

    pub fn read(&self, tx: &Transaction<'_>, id: i64) -> Result<Option<Directory>> {
        let dir = tx
            .query_row(
                &format!("SELECT {} FROM directories WHERE id = ?1", COLUMNS),
                [id],
                map_row,
            )
            .optional()?;
        Ok(dir)
    }

    pub fn read_sub_dirs(&self, tx: &Transaction<'_>, parent: i64) -> Result<Vec<Directory>> {
        let mut stmt = tx.prepare_cached(&format!(
            "SELECT {} FROM directories WHERE parent_id = ?1 ORDER BY name",
            COLUMNS
        ))?;
        let rows = stmt.query_map([parent], map_row)?;
        let mut dirs = Vec::new();
        for row in rows {
            dirs.push(row?);
        }
        Ok(dirs)
    }

    pub fn read_roots(&self, tx: &Transaction<'_>) -> Result<Vec<Directory>> {
        let mut stmt = tx.prepare_cached(&format!(
            "SELECT {} FROM directories WHERE parent_id IS NULL ORDER BY id",
            COLUMNS
        ))?;
        let rows = stmt.query_map([], map_row)?;
        let mut dirs = Vec::new();
        for row in rows {
            dirs.push(row?);
        }
        Ok(dirs)
    }

    /// Insert a directory and return its id
    pub fn create(&self, tx: &Transaction<'_>, parent: Option<i64>, name: &str) -> Result<i64> {
        tx.execute(
            "INSERT INTO directories (name, parent_id, date_added) VALUES (?1, ?2, ?3)",
            params![name, parent, super::now()],
        )?;
        Ok(tx.last_insert_rowid())
    }

    /// Delete a directory; descendants, tracks and covers go with it
    pub fn delete(&self, tx: &Transaction<'_>, id: i64) -> Result<()> {
        tx.execute("DELETE FROM directories WHERE id = ?1", [id])?;
        Ok(())
    }

    pub fn touch_last_scanned(
        &self,
        tx: &Transaction<'_>,
        id: i64,
        at: DateTime<Utc>,
    ) -> Result<()> {
        tx.execute(
            "UPDATE directories SET last_scanned = ?1 WHERE id = ?2",
            params![at, id],
        )?;
        Ok(())
    }

    /// Resolve the on-disk path by walking parent links up to the root
    pub fn absolute_path(&self, tx: &Transaction<'_>, id: i64) -> Result<Option<PathBuf>> {
        let mut segments = Vec::new();
        let mut visited = HashSet::new();
        let mut current = Some(id);

        while let Some(dir_id) = current {
            if !visited.insert(dir_id) {
                return Err(CatalogError::storage_error(format!(
                    "directory parent chain of id={} contains a cycle",
                    id
                )));
            }
            let Some(dir) = self.read(tx, dir_id)? else {
                return Ok(None);
            };
            current = dir.parent_id;
            segments.push(dir.name);
        }

        let mut path = PathBuf::new();
        for segment in segments.iter().rev() {
            path.push(segment);
        }
        Ok(Some(path))
    }
}
