use rusqlite::{params, OptionalExtension, Row, Transaction};

use crate::error::Result;
use crate::models::{Cover, NewCover};

const COLUMNS: &str =
    "id, dir_id, filename, extension, size_byte, width_px, height_px, sha256, last_content_update";

/// Repository over the `covers` table
#[derive(Debug, Clone, Copy, Default)]
pub struct CoverRepo;

fn map_row(row: &Row<'_>) -> rusqlite::Result<Cover> {
    Ok(Cover {
        id: row.get(0)?,
        dir_id: row.get(1)?,
        filename: row.get(2)?,
        extension: row.get(3)?,
        size_byte: row.get::<_, i64>(4)? as u64,
        width_px: row.get(5)?,
        height_px: row.get(6)?,
        sha256: row.get(7)?,
        last_content_update: row.get(8)?,
    })
}

impl CoverRepo {
    pub fn exists(&self, tx: &Transaction<'_>, id: i64) -> Result<bool> {
        let found: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM covers WHERE id = ?1)",
            [id],
            |row| row.get(0),
        )?;
        Ok(found)
    }

    pub fn exists_by_dir_and_name(
        &self,
        tx: &Transaction<'_>,
        dir_id: i64,
        filename: &str,
    ) -> Result<bool> {
        let found: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM covers WHERE dir_id = ?1 AND filename = ?2)",
            params![dir_id, filename],
            |row| row.get(0),
        )?;
        Ok(found)
    }

    pub fn read(&self, tx: &Transaction<'_>, id: i64) -> Result<Option<Cover>> {
        let cover = tx
            .query_row(
                &format!("SELECT {} FROM covers WHERE id = ?1", COLUMNS),
                [id],
                map_row,
            )
            .optional()?;
        Ok(cover)
    }

    pub fn read_by_dir_and_name(
        &self,
        tx: &Transaction<'_>,
        dir_id: i64,
        filename: &str,
    ) -> Result<Option<Cover>> {
        let cover = tx
            .query_row(
                &format!(
                    "SELECT {} FROM covers WHERE dir_id = ?1 AND filename = ?2",
                    COLUMNS
                ),
                params![dir_id, filename],
                map_row,
            )
            .optional()?;
        Ok(cover)
    }

    pub fn read_all_by_dir(&self, tx: &Transaction<'_>, dir_id: i64) -> Result<Vec<Cover>> {
        let mut stmt = tx.prepare_cached(&format!(
            "SELECT {} FROM covers WHERE dir_id = ?1 ORDER BY filename",
            COLUMNS
        ))?;
        let rows = stmt.query_map([dir_id], map_row)?;
        let mut covers = Vec::new();
        for row in rows {
            covers.push(row?);
        }
        Ok(covers)
    }

    pub fn read_all(&self, tx: &Transaction<'_>) -> Result<Vec<Cover>> {
        let mut stmt =
            tx.prepare_cached(&format!("SELECT {} FROM covers ORDER BY id", COLUMNS))?;
        let rows = stmt.query_map([], map_row)?;
        let mut covers = Vec::new();
        for row in rows {
            covers.push(row?);
        }
        Ok(covers)
    }

    /// Insert a cover and return its id
    pub fn create(&self, tx: &Transaction<'_>, dir_id: i64, cover: &NewCover) -> Result<i64> {
        tx.execute(
            "INSERT INTO covers
             (dir_id, filename, extension, size_byte, width_px, height_px, sha256, last_content_update)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                dir_id,
                cover.filename,
                cover.extension,
                cover.size_byte as i64,
                cover.width_px,
                cover.height_px,
                cover.sha256,
                super::now(),
            ],
        )?;
        Ok(tx.last_insert_rowid())
    }

    pub fn update(&self, tx: &Transaction<'_>, id: i64, dir_id: i64, cover: &NewCover) -> Result<()> {
        tx.execute(
            "UPDATE covers SET
                dir_id = ?1, filename = ?2, extension = ?3, size_byte = ?4, width_px = ?5,
                height_px = ?6, sha256 = ?7, last_content_update = ?8
             WHERE id = ?9",
            params![
                dir_id,
                cover.filename,
                cover.extension,
                cover.size_byte as i64,
                cover.width_px,
                cover.height_px,
                cover.sha256,
                super::now(),
                id,
            ],
        )?;
        Ok(())
    }

    pub fn delete(&self, tx: &Transaction<'_>, id: i64) -> Result<()> {
        tx.execute("DELETE FROM covers WHERE id = ?1", [id])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{CatalogDatabase, DirectoryRepo};

    fn sample(filename: &str, sha256: &str) -> NewCover {
        NewCover {
            filename: filename.to_string(),
            extension: "jpg".to_string(),
            size_byte: 2_048,
            width_px: 600,
            height_px: 400,
            sha256: sha256.to_string(),
        }
    }

    #[test]
    fn test_cover_lifecycle() {
        let mut db = CatalogDatabase::open_memory().unwrap();
        db.with_transaction(|tx| {
            let dir = DirectoryRepo.create(tx, None, "/music")?;
            let id = CoverRepo.create(tx, dir, &sample("front.jpg", "aa"))?;

            assert!(CoverRepo.exists(tx, id)?);
            assert!(CoverRepo.exists_by_dir_and_name(tx, dir, "front.jpg")?);
            let cover = CoverRepo.read_by_dir_and_name(tx, dir, "front.jpg")?.unwrap();
            assert_eq!((cover.width_px, cover.height_px), (600, 400));

            let mut resized = sample("front.jpg", "bb");
            resized.width_px = 1200;
            CoverRepo.update(tx, id, dir, &resized)?;
            let cover = CoverRepo.read(tx, id)?.unwrap();
            assert_eq!(cover.width_px, 1200);
            assert_eq!(cover.sha256, "bb");

            CoverRepo.delete(tx, id)?;
            assert!(!CoverRepo.exists(tx, id)?);
            assert!(CoverRepo.read_all(tx)?.is_empty());
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_read_all_by_dir_is_scoped() {
        let mut db = CatalogDatabase::open_memory().unwrap();
        db.with_transaction(|tx| {
            let a = DirectoryRepo.create(tx, None, "/a")?;
            let b = DirectoryRepo.create(tx, None, "/b")?;
            CoverRepo.create(tx, a, &sample("x.jpg", "aa"))?;
            CoverRepo.create(tx, a, &sample("y.jpg", "bb"))?;
            CoverRepo.create(tx, b, &sample("x.jpg", "aa"))?;

            assert_eq!(CoverRepo.read_all_by_dir(tx, a)?.len(), 2);
            assert_eq!(CoverRepo.read_all_by_dir(tx, b)?.len(), 1);
            Ok(())
        })
        .unwrap();
    }
}
