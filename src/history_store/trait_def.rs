//! HistoryStore trait definition.
//!
//! The consolidation core reads full snapshots through this trait and applies
//! row-level mutations through it; it never issues queries of its own.

use super::models::*;
use anyhow::Result;
use std::collections::HashSet;

/// Trait for listening-history storage backends.
pub trait HistoryStore: Send + Sync {
    // =========================================================================
    // Snapshots
    // =========================================================================

    fn fetch_all_play_events(&self) -> Result<Vec<PlayEvent>>;

    fn fetch_all_tracks(&self) -> Result<Vec<Track>>;

    fn fetch_all_albums(&self) -> Result<Vec<Album>>;

    // =========================================================================
    // Row-level mutations
    // =========================================================================

    /// Move every track of `old_album_id` to `new_album_id`. Returns tracks moved.
    fn repoint_tracks_album(&self, old_album_id: AlbumId, new_album_id: AlbumId)
        -> Result<usize>;

    /// Move every play event of `old_track_id` to `new_track_id`. Returns events moved.
    fn repoint_events_track(&self, old_track_id: TrackId, new_track_id: TrackId)
        -> Result<usize>;

    fn delete_album(&self, id: AlbumId) -> Result<()>;

    fn delete_track(&self, id: TrackId) -> Result<()>;

    /// Delete the given play events. Returns the number of rows removed.
    fn delete_play_events(&self, ids: &HashSet<PlayEventId>) -> Result<usize>;

    /// Apply one merge group as a single atomic unit.
    ///
    /// Every duplicate's dependent rows are re-pointed to the survivor and the
    /// duplicate is deleted. If any step fails nothing of the group is kept.
    /// Returns the number of dependent rows re-pointed.
    fn apply_merge(&self, merge: &EntityMerge) -> Result<usize>;

    // =========================================================================
    // Counts
    // =========================================================================

    fn counts(&self) -> Result<HistoryCounts>;
}
