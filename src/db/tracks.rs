use rusqlite::{params, OptionalExtension, Row, Transaction};

use crate::error::Result;
use crate::models::{NewTrack, Track};

const COLUMNS: &str = "id, dir_id, filename, extension, size_byte, duration_ms, bitrate_kbps, \
                       sample_rate_hz, channels_n, sha256, cover_id, last_content_update";

/// Repository over the `tracks` table
#[derive(Debug, Clone, Copy, Default)]
pub struct TrackRepo;

fn map_row(row: &Row<'_>) -> rusqlite::Result<Track> {
    Ok(Track {
        id: row.get(0)?,
        dir_id: row.get(1)?,
        filename: row.get(2)?,
        extension: row.get(3)?,
        size_byte: row.get::<_, i64>(4)? as u64,
        duration_ms: row.get::<_, i64>(5)? as u64,
        bitrate_kbps: row.get(6)?,
        sample_rate_hz: row.get(7)?,
        channels_n: row.get(8)?,
        sha256: row.get(9)?,
        cover_id: row.get(10)?,
        last_content_update: row.get(11)?,
    })
}

impl TrackRepo {
    pub fn exists(&self, tx: &Transaction<'_>, id: i64) -> Result<bool> {
        let found: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM tracks WHERE id = ?1)",
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
            "SELECT EXISTS(SELECT 1 FROM tracks WHERE dir_id = ?1 AND filename = ?2)",
            params![dir_id, filename],
            |row| row.get(0),
        )?;
        Ok(found)
    }

    pub fn read(&self, tx: &Transaction<'_>, id: i64) -> Result<Option<Track>> {
        let track = tx
            .query_row(
                &format!("SELECT {} FROM tracks WHERE id = ?1", COLUMNS),
                [id],
                map_row,
            )
            .optional()?;
        Ok(track)
    }

    pub fn read_by_dir_and_name(
        &self,
        tx: &Transaction<'_>,
        dir_id: i64,
        filename: &str,
    ) -> Result<Option<Track>> {
        let track = tx
            .query_row(
                &format!(
                    "SELECT {} FROM tracks WHERE dir_id = ?1 AND filename = ?2",
                    COLUMNS
                ),
                params![dir_id, filename],
                map_row,
            )
            .optional()?;
        Ok(track)
    }

    pub fn read_all_by_dir(&self, tx: &Transaction<'_>, dir_id: i64) -> Result<Vec<Track>> {
        let mut stmt = tx.prepare_cached(&format!(
            "SELECT {} FROM tracks WHERE dir_id = ?1 ORDER BY filename",
            COLUMNS
        ))?;
        let rows = stmt.query_map([dir_id], map_row)?;
        let mut tracks = Vec::new();
        for row in rows {
            tracks.push(row?);
        }
        Ok(tracks)
    }

    pub fn read_all(&self, tx: &Transaction<'_>) -> Result<Vec<Track>> {
        let mut stmt =
            tx.prepare_cached(&format!("SELECT {} FROM tracks ORDER BY id", COLUMNS))?;
        let rows = stmt.query_map([], map_row)?;
        let mut tracks = Vec::new();
        for row in rows {
            tracks.push(row?);
        }
        Ok(tracks)
    }

    /// Insert a track and return its id
    pub fn create(&self, tx: &Transaction<'_>, dir_id: i64, track: &NewTrack) -> Result<i64> {
        tx.execute(
            "INSERT INTO tracks
             (dir_id, filename, extension, size_byte, duration_ms, bitrate_kbps,
              sample_rate_hz, channels_n, sha256, last_content_update)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                dir_id,
                track.filename,
                track.extension,
                track.size_byte as i64,
                track.duration_ms as i64,
                track.bitrate_kbps,
                track.sample_rate_hz,
                track.channels_n,
                track.sha256,
                super::now(),
            ],
        )?;
        Ok(tx.last_insert_rowid())
    }

    /// Overwrite metadata and fingerprint in place; id and cover link are kept
    pub fn update(&self, tx: &Transaction<'_>, id: i64, dir_id: i64, track: &NewTrack) -> Result<()> {
        tx.execute(
            "UPDATE tracks SET
                dir_id = ?1, filename = ?2, extension = ?3, size_byte = ?4, duration_ms = ?5,
                bitrate_kbps = ?6, sample_rate_hz = ?7, channels_n = ?8, sha256 = ?9,
                last_content_update = ?10
             WHERE id = ?11",
            params![
                dir_id,
                track.filename,
                track.extension,
                track.size_byte as i64,
                track.duration_ms as i64,
                track.bitrate_kbps,
                track.sample_rate_hz,
                track.channels_n,
                track.sha256,
                super::now(),
                id,
            ],
        )?;
        Ok(())
    }

    pub fn set_cover(&self, tx: &Transaction<'_>, id: i64, cover_id: Option<i64>) -> Result<()> {
        tx.execute(
            "UPDATE tracks SET cover_id = ?1 WHERE id = ?2",
            params![cover_id, id],
        )?;
        Ok(())
    }

    pub fn delete(&self, tx: &Transaction<'_>, id: i64) -> Result<()> {
        tx.execute("DELETE FROM tracks WHERE id = ?1", [id])?;
        Ok(())
    }
}
