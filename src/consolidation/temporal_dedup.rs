//! Temporal deduplication of play events (the "10-minute rule").
//!
//! Last.fm polling and Roon zone polling can both observe the same physical
//! playback. Plays of one track that fall within the window of the last kept
//! play are collapsed onto it.

use crate::history_store::{PlayEvent, PlayEventId, TrackId};
use std::collections::HashSet;

pub const DEFAULT_WINDOW_SECONDS: u32 = 600;

/// Outcome of a dedup scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DedupScan {
    /// Events to delete.
    pub duplicate_ids: HashSet<PlayEventId>,
    /// Events with no track or no numeric timestamp. Never deleted, never anchors.
    pub skipped_invalid: usize,
    /// Kept events that absorbed at least one duplicate.
    pub clusters: usize,
}

/// Scan `events` for duplicates within `window_seconds` (inclusive).
///
/// Input order does not matter: events are sorted by `(track_id, timestamp, id)`
/// before the single pass, so among identical timestamps the lowest id is kept.
/// Each event is compared against the last *kept* event of its track, so a
/// chain of plays all within the window of the first collapses onto the first.
pub fn scan(events: &[PlayEvent], window_seconds: u32) -> DedupScan {
    let window = i64::from(window_seconds);
    let mut result = DedupScan::default();

    let mut keyed: Vec<(TrackId, i64, PlayEventId)> = Vec::with_capacity(events.len());
    for event in events {
        match (event.track_id, event.timestamp) {
            (Some(track_id), Some(timestamp)) => keyed.push((track_id, timestamp, event.id)),
            _ => result.skipped_invalid += 1,
        }
    }
    keyed.sort_unstable();

    let mut last_kept: Option<(TrackId, i64)> = None;
    let mut absorbed = false;
    for (track_id, timestamp, id) in keyed {
        match last_kept {
            Some((kept_track, kept_at))
                if kept_track == track_id && timestamp.saturating_sub(kept_at) <= window =>
            {
                result.duplicate_ids.insert(id);
                if !absorbed {
                    result.clusters += 1;
                    absorbed = true;
                }
            }
            _ => {
                last_kept = Some((track_id, timestamp));
                absorbed = false;
            }
        }
    }

    result
}

/// Ids of the events that should be deleted.
pub fn find_duplicates(events: &[PlayEvent], window_seconds: u32) -> HashSet<PlayEventId> {
    scan(events, window_seconds).duplicate_ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history_store::PlaySource;

    fn event(id: i64, track_id: i64, timestamp: i64) -> PlayEvent {
        PlayEvent {
            id,
            track_id: Some(track_id),
            timestamp: Some(timestamp),
            source: PlaySource::Lastfm,
            loved: false,
            date: None,
        }
    }

    fn ids(values: &[i64]) -> HashSet<i64> {
        values.iter().copied().collect()
    }

    #[test]
    fn test_window_boundary_is_inclusive() {
        let events = vec![event(1, 1, 1_000), event(2, 1, 1_600)];
        assert_eq!(find_duplicates(&events, 600), ids(&[2]));

        let events = vec![event(1, 1, 1_000), event(2, 1, 1_601)];
        assert!(find_duplicates(&events, 600).is_empty());
    }

    #[test]
    fn test_identical_timestamps_keep_lowest_id() {
        let events = vec![event(9, 1, 500), event(4, 1, 500), event(6, 1, 500)];
        assert_eq!(find_duplicates(&events, 600), ids(&[6, 9]));
    }

    #[test]
    fn test_chain_collapses_onto_first_kept() {
        // 0, 5 and 10 minutes: all within 600s of the first.
        let events = vec![event(1, 1, 0), event(2, 1, 300), event(3, 1, 600)];
        assert_eq!(find_duplicates(&events, 600), ids(&[2, 3]));

        // 0, 8 and 16 minutes: the third is 960s from the kept event, so it stays.
        let events = vec![event(1, 1, 0), event(2, 1, 480), event(3, 1, 960)];
        assert_eq!(find_duplicates(&events, 600), ids(&[2]));
    }

    #[test]
    fn test_new_play_becomes_anchor() {
        let events = vec![
            event(1, 1, 0),
            event(2, 1, 700),
            event(3, 1, 1_200),
            event(4, 1, 1_301),
        ];
        // 2 is kept (700 > 600) and absorbs 3; 4 is 601s after 2.
        assert_eq!(find_duplicates(&events, 600), ids(&[3]));
    }

    #[test]
    fn test_tracks_never_interact() {
        let events = vec![event(1, 1, 1_000), event(2, 2, 1_000), event(3, 1, 5_000)];
        assert!(find_duplicates(&events, 600).is_empty());
    }

    #[test]
    fn test_unsorted_input_is_sorted_first() {
        let events = vec![event(3, 1, 1_200), event(1, 2, 50), event(2, 1, 1_000)];
        assert_eq!(find_duplicates(&events, 600), ids(&[3]));
    }

    #[test]
    fn test_invalid_events_are_skipped() {
        let mut missing_track = event(2, 1, 1_010);
        missing_track.track_id = None;
        let mut missing_timestamp = event(3, 1, 0);
        missing_timestamp.timestamp = None;

        let events = vec![event(1, 1, 1_000), missing_track, missing_timestamp];
        let result = scan(&events, 600);
        assert!(result.duplicate_ids.is_empty());
        assert_eq!(result.skipped_invalid, 2);
    }

    #[test]
    fn test_cluster_count() {
        let events = vec![
            event(1, 1, 0),
            event(2, 1, 10),
            event(3, 1, 20),
            event(4, 1, 5_000),
            event(5, 2, 0),
            event(6, 2, 100),
            event(7, 3, 0),
        ];
        let result = scan(&events, 600);
        assert_eq!(result.duplicate_ids, ids(&[2, 3, 6]));
        assert_eq!(result.clusters, 2);
    }

    #[test]
    fn test_extreme_timestamps_do_not_overflow() {
        let events = vec![event(1, 1, i64::MIN), event(2, 1, i64::MAX)];
        assert!(find_duplicates(&events, 600).is_empty());
    }

    #[test]
    fn test_large_input_is_linearithmic() {
        // 100k plays over 10 tracks: a play every 1000s per track, each echoed
        // 30s later by a second source.
        let mut events = Vec::with_capacity(100_000);
        for i in 0..50_000i64 {
            let track = i % 10;
            let base = (i / 10) * 1_000;
            events.push(event(2 * i, track, base));
            events.push(event(2 * i + 1, track, base + 30));
        }
        let result = scan(&events, 600);
        assert_eq!(result.duplicate_ids.len(), 50_000);
        assert!(result.duplicate_ids.iter().all(|id| id % 2 == 1));
    }
}
