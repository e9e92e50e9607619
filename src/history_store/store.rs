//! SQLite-backed listening-history store.

use super::models::*;
use super::schema::HISTORY_VERSIONED_SCHEMAS;
use super::trait_def::HistoryStore;
use crate::sqlite_persistence::open_versioned;
use anyhow::{anyhow, bail, Context, Result};
use chrono::DateTime;
use rusqlite::types::Value;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Display format of the `date` column, as Last.fm renders scrobble times.
const DATE_FORMAT: &str = "%d %b %Y, %H:%M";

/// Derive the human-readable `date` column from a Unix timestamp.
pub fn format_play_date(timestamp: i64) -> Option<String> {
    DateTime::from_timestamp(timestamp, 0).map(|dt| dt.format(DATE_FORMAT).to_string())
}

/// SQLite store for albums, tracks and play events.
#[derive(Clone)]
pub struct SqliteHistoryStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteHistoryStore {
    /// Open (or create) the history database at `db_path`.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref();
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open history database {:?}", db_path))?;
        let store = Self::from_connection(conn)?;

        let counts = store.counts()?;
        info!(
            "Opened history db: {} albums, {} tracks, {} play events",
            counts.albums, counts.tracks, counts.play_events
        );
        Ok(store)
    }

    /// In-memory store, used by tests and dry tooling.
    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(mut conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        open_versioned(&mut conn, HISTORY_VERSIONED_SCHEMAS)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("History db connection lock poisoned"))
    }

    // =========================================================================
    // Inserts (importer tooling and fixtures)
    // =========================================================================

    pub fn insert_album(&self, id: AlbumId, title: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO albums (id, title) VALUES (?1, ?2)",
            params![id, title],
        )?;
        Ok(())
    }

    pub fn insert_track(&self, id: TrackId, album_id: AlbumId, title: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO tracks (id, album_id, title) VALUES (?1, ?2, ?3)",
            params![id, album_id, title],
        )?;
        Ok(())
    }

    /// Insert a play event. `date` is derived from `timestamp`.
    pub fn insert_play_event(
        &self,
        id: PlayEventId,
        track_id: TrackId,
        timestamp: i64,
        source: PlaySource,
        loved: bool,
    ) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO play_events (id, track_id, timestamp, source, loved, date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                id,
                track_id,
                timestamp,
                source.as_db_str(),
                loved,
                format_play_date(timestamp)
            ],
        )?;
        Ok(())
    }

    /// Look up a single play event.
    pub fn get_play_event(&self, id: PlayEventId) -> Result<Option<PlayEvent>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(
            "SELECT id, track_id, timestamp, source, loved, date FROM play_events WHERE id = ?1",
        )?;
        Ok(stmt.query_row(params![id], parse_play_event_row).optional()?)
    }

    // =========================================================================
    // Internal helpers
    // =========================================================================

    fn repoint(conn: &Connection, kind: EntityKind, old_id: i64, new_id: i64) -> Result<usize> {
        let sql = match kind {
            EntityKind::Album => "UPDATE tracks SET album_id = ?1 WHERE album_id = ?2",
            EntityKind::Track => "UPDATE play_events SET track_id = ?1 WHERE track_id = ?2",
        };
        let moved = conn
            .prepare_cached(sql)?
            .execute(params![new_id, old_id])
            .with_context(|| format!("Failed to re-point {} {} to {}", kind, old_id, new_id))?;
        Ok(moved)
    }

    fn delete_entity(conn: &Connection, kind: EntityKind, id: i64) -> Result<()> {
        let sql = match kind {
            EntityKind::Album => "DELETE FROM albums WHERE id = ?1",
            EntityKind::Track => "DELETE FROM tracks WHERE id = ?1",
        };
        let deleted = conn
            .prepare_cached(sql)?
            .execute(params![id])
            .with_context(|| format!("Failed to delete {} {}", kind, id))?;
        if deleted == 0 {
            bail!("{} {} not found", kind, id);
        }
        Ok(())
    }

    fn count(conn: &Connection, table: &str) -> Result<usize> {
        let count: i64 =
            conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))?;
        Ok(count as usize)
    }
}

/// Read an integer that an importer may have stored as text.
fn integer_value(value: Value) -> Option<i64> {
    match value {
        Value::Integer(i) => Some(i),
        Value::Text(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Read a text column whatever type the importer stored it as.
fn text_value(value: Value) -> Option<String> {
    match value {
        Value::Text(s) => Some(s),
        Value::Integer(i) => Some(i.to_string()),
        Value::Real(f) => Some(f.to_string()),
        Value::Null | Value::Blob(_) => None,
    }
}

/// Anything that is not a recognizable truthy value reads as `false`.
fn flag_value(value: Value) -> bool {
    match value {
        Value::Integer(i) => i != 0,
        Value::Text(s) => {
            let s = s.trim();
            s.eq_ignore_ascii_case("true")
                || s.eq_ignore_ascii_case("yes")
                || s.parse::<i64>().is_ok_and(|i| i != 0)
        }
        _ => false,
    }
}

fn parse_play_event_row(row: &rusqlite::Row) -> rusqlite::Result<PlayEvent> {
    let source = text_value(row.get(3)?).unwrap_or_default();
    Ok(PlayEvent {
        id: row.get(0)?,
        track_id: integer_value(row.get(1)?),
        timestamp: integer_value(row.get(2)?),
        source: PlaySource::from_db_str(&source),
        loved: flag_value(row.get(4)?),
        date: text_value(row.get(5)?),
    })
}

impl HistoryStore for SqliteHistoryStore {
    fn fetch_all_play_events(&self) -> Result<Vec<PlayEvent>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, track_id, timestamp, source, loved, date FROM play_events ORDER BY id",
        )?;
        let events = stmt
            .query_map([], parse_play_event_row)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read play events")?;
        Ok(events)
    }

    fn fetch_all_tracks(&self) -> Result<Vec<Track>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT id, album_id, title FROM tracks ORDER BY id")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, TrackId>(0)?,
                    integer_value(row.get(1)?),
                    text_value(row.get(2)?).unwrap_or_default(),
                ))
            })?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read tracks")?;

        let mut tracks = Vec::with_capacity(rows.len());
        for (id, album_id, title) in rows {
            match album_id {
                Some(album_id) => tracks.push(Track {
                    id,
                    album_id,
                    title,
                }),
                None => warn!("Ignoring track {} with a non-numeric album_id", id),
            }
        }
        Ok(tracks)
    }

    fn fetch_all_albums(&self) -> Result<Vec<Album>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT id, title FROM albums ORDER BY id")?;
        let albums = stmt
            .query_map([], |row| {
                Ok(Album {
                    id: row.get(0)?,
                    title: text_value(row.get(1)?).unwrap_or_default(),
                })
            })?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read albums")?;
        Ok(albums)
    }

    fn repoint_tracks_album(
        &self,
        old_album_id: AlbumId,
        new_album_id: AlbumId,
    ) -> Result<usize> {
        let conn = self.lock()?;
        Self::repoint(&conn, EntityKind::Album, old_album_id, new_album_id)
    }

    fn repoint_events_track(
        &self,
        old_track_id: TrackId,
        new_track_id: TrackId,
    ) -> Result<usize> {
        let conn = self.lock()?;
        Self::repoint(&conn, EntityKind::Track, old_track_id, new_track_id)
    }

    fn delete_album(&self, id: AlbumId) -> Result<()> {
        let conn = self.lock()?;
        Self::delete_entity(&conn, EntityKind::Album, id)
    }

    fn delete_track(&self, id: TrackId) -> Result<()> {
        let conn = self.lock()?;
        Self::delete_entity(&conn, EntityKind::Track, id)
    }

    fn delete_play_events(&self, ids: &HashSet<PlayEventId>) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut deleted = 0;
        {
            let mut stmt = tx.prepare_cached("DELETE FROM play_events WHERE id = ?1")?;
            for id in ids {
                deleted += stmt.execute(params![id])?;
            }
        }
        tx.commit().context("Failed to commit play event deletion")?;
        debug!("Deleted {} play events", deleted);
        Ok(deleted)
    }

    fn apply_merge(&self, merge: &EntityMerge) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut repointed = 0;
        for duplicate_id in &merge.duplicate_ids {
            repointed += Self::repoint(&tx, merge.kind, *duplicate_id, merge.survivor_id)?;
            Self::delete_entity(&tx, merge.kind, *duplicate_id)?;
        }
        tx.commit()
            .with_context(|| format!("Failed to commit {} merge", merge.kind))?;
        Ok(repointed)
    }

    fn counts(&self) -> Result<HistoryCounts> {
        let conn = self.lock()?;
        Ok(HistoryCounts {
            albums: Self::count(&conn, "albums")?,
            tracks: Self::count(&conn, "tracks")?,
            play_events: Self::count(&conn, "play_events")?,
        })
    }
}
