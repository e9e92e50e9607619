//! Catalog and listening-history models.

use serde::{Deserialize, Serialize};

pub type AlbumId = i64;
pub type TrackId = i64;
pub type PlayEventId = i64;

/// Where a play was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaySource {
    Lastfm,
    Roon,
    Unknown,
}

impl PlaySource {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            PlaySource::Lastfm => "lastfm",
            PlaySource::Roon => "roon",
            PlaySource::Unknown => "unknown",
        }
    }

    pub fn from_db_str(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "lastfm" | "last.fm" => PlaySource::Lastfm,
            "roon" => PlaySource::Roon,
            _ => PlaySource::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Album {
    pub id: AlbumId,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub album_id: AlbumId,
    pub title: String,
}

/// A single observed playback.
///
/// `track_id` and `timestamp` are optional because the history table is filled
/// by external importers: a missing reference or a non-numeric timestamp is
/// carried through as `None` rather than failing the whole read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayEvent {
    pub id: PlayEventId,
    pub track_id: Option<TrackId>,
    /// Unix seconds.
    pub timestamp: Option<i64>,
    pub source: PlaySource,
    pub loved: bool,
    pub date: Option<String>,
}

/// Which catalog entity a merge applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Album,
    Track,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Album => write!(f, "album"),
            EntityKind::Track => write!(f, "track"),
        }
    }
}

/// One merge group: every duplicate is folded into the survivor.
///
/// For albums the dependent rows are tracks, for tracks they are play events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityMerge {
    pub kind: EntityKind,
    pub survivor_id: i64,
    pub duplicate_ids: Vec<i64>,
}

/// Row counts of the history database.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HistoryCounts {
    pub albums: usize,
    pub tracks: usize,
    pub play_events: usize,
}
