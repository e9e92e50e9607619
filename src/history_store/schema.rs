//! SQLite schema definitions for the listening-history database.

use crate::sqlite_column;
use crate::sqlite_persistence::{ForeignKey, ForeignKeyOnChange, SqlType, Table, VersionedSchema};

const ALBUMS_TABLE: Table = Table {
    name: "albums",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("title", &SqlType::Text),
    ],
    indices: &[],
};

const ALBUM_FOREIGN_KEY: ForeignKey = ForeignKey {
    foreign_table: "albums",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Restrict,
};

const TRACKS_TABLE: Table = Table {
    name: "tracks",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!(
            "album_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&ALBUM_FOREIGN_KEY)
        ),
        sqlite_column!("title", &SqlType::Text),
    ],
    indices: &[("idx_tracks_album", "album_id")],
};

const TRACK_FOREIGN_KEY: ForeignKey = ForeignKey {
    foreign_table: "tracks",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Restrict,
};

// track_id and timestamp stay nullable: importers write whatever they scraped.
const PLAY_EVENTS_TABLE: Table = Table {
    name: "play_events",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!(
            "track_id",
            &SqlType::Integer,
            foreign_key = Some(&TRACK_FOREIGN_KEY)
        ),
        sqlite_column!("timestamp", &SqlType::Integer),
        sqlite_column!(
            "source",
            &SqlType::Text,
            non_null = true,
            default_value = Some("'lastfm'")
        ),
        sqlite_column!(
            "loved",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!("date", &SqlType::Text),
    ],
    indices: &[("idx_play_events_track", "track_id, timestamp")],
};

pub const HISTORY_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 1,
    tables: &[ALBUMS_TABLE, TRACKS_TABLE, PLAY_EVENTS_TABLE],
}];
