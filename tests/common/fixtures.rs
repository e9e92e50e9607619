//! Test fixture creation for history databases

use super::constants::*;
use anyhow::Result;
use listening_consolidator::history_store::{PlaySource, SqliteHistoryStore};
use rusqlite::Connection;
use std::path::PathBuf;
use tempfile::TempDir;

/// A history database file that lives as long as this value.
pub struct TestDb {
    _dir: TempDir,
    pub path: PathBuf,
}

impl TestDb {
    /// Create an empty database with the current schema.
    pub fn new() -> Result<Self> {
        let dir = TempDir::new()?;
        let path = dir.path().join("history.db");
        SqliteHistoryStore::new(&path)?;
        Ok(Self { _dir: dir, path })
    }

    pub fn open_store(&self) -> SqliteHistoryStore {
        SqliteHistoryStore::new(&self.path).unwrap()
    }
}

/// Raw connection, for rows and triggers the store API cannot produce.
pub fn open_raw(db: &TestDb) -> Connection {
    Connection::open(&db.path).unwrap()
}

/// One album, a duplicated track and three plays, two of which are the same
/// playback recorded by Last.fm and Roon.
pub fn create_scenario_db() -> Result<TestDb> {
    let db = TestDb::new()?;
    let store = db.open_store();

    store.insert_album(DEBUT_ALBUM_ID, "Debut")?;
    store.insert_track(INTRO_TRACK_ID, DEBUT_ALBUM_ID, "Intro")?;
    store.insert_track(INTRO_DUPLICATE_TRACK_ID, DEBUT_ALBUM_ID, "INTRO")?;
    store.insert_play_event(
        LASTFM_PLAY_ID,
        INTRO_TRACK_ID,
        LASTFM_PLAY_TS,
        PlaySource::Lastfm,
        false,
    )?;
    store.insert_play_event(
        ROON_PLAY_ID,
        INTRO_DUPLICATE_TRACK_ID,
        ROON_PLAY_TS,
        PlaySource::Roon,
        false,
    )?;
    store.insert_play_event(
        LATER_PLAY_ID,
        INTRO_TRACK_ID,
        LATER_PLAY_TS,
        PlaySource::Lastfm,
        false,
    )?;

    Ok(db)
}
