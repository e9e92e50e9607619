//! Sequencing of a full consolidation run.
//!
//! Album pass, then track pass, then temporal dedup over the consolidated
//! play events. All per-run state lives in the snapshot and the report built
//! here; nothing is kept between invocations.

use super::entity_consolidator::{consolidate_albums, consolidate_tracks, HistorySnapshot};
use super::error::ConsolidationError;
use super::report::Report;
use super::temporal_dedup::{self, DEFAULT_WINDOW_SECONDS};
use crate::history_store::HistoryStore;
use std::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsolidationOptions {
    /// Dedup window in seconds, inclusive.
    pub window_seconds: u32,
    /// Plan and count everything without writing to the store.
    pub dry_run: bool,
}

impl Default for ConsolidationOptions {
    fn default() -> Self {
        Self {
            window_seconds: DEFAULT_WINDOW_SECONDS,
            dry_run: false,
        }
    }
}

/// Run a full consolidation with default options.
pub fn run_consolidation(store: &dyn HistoryStore) -> Result<Report, ConsolidationError> {
    run_consolidation_with_options(store, &ConsolidationOptions::default())
}

pub fn run_consolidation_with_options(
    store: &dyn HistoryStore,
    options: &ConsolidationOptions,
) -> Result<Report, ConsolidationError> {
    run_consolidation_with_cancel(store, options, || false)
}

/// Run a full consolidation, checking `is_cancelled` before each phase.
///
/// Each phase either runs to completion or does not start, so a cancelled run
/// leaves the store in a state that a later run picks up from.
pub fn run_consolidation_with_cancel(
    store: &dyn HistoryStore,
    options: &ConsolidationOptions,
    is_cancelled: impl Fn() -> bool,
) -> Result<Report, ConsolidationError> {
    let started = Instant::now();
    let check = |phase: &'static str| {
        if is_cancelled() {
            Err(ConsolidationError::Cancelled { phase })
        } else {
            Ok(())
        }
    };

    let mut snapshot =
        HistorySnapshot::fetch(store).map_err(|source| ConsolidationError::StoreUnavailable {
            operation: "fetch the history snapshot",
            source,
        })?;
    info!(
        "Consolidating {} albums, {} tracks, {} play events (window {}s{})",
        snapshot.albums.len(),
        snapshot.tracks.len(),
        snapshot.events.len(),
        options.window_seconds,
        if options.dry_run { ", dry run" } else { "" }
    );

    let mut report = Report {
        dry_run: options.dry_run,
        ..Default::default()
    };

    check("album pass")?;
    let albums = consolidate_albums(store, &mut snapshot, options.dry_run);
    report.albums_merged = albums.merged;
    report.tracks_repointed_by_album_pass = albums.repointed;
    report.failed_groups.extend(albums.failed_groups);
    info!(
        "Album pass: {} albums merged, {} tracks re-pointed",
        albums.merged, albums.repointed
    );

    check("track pass")?;
    let tracks = consolidate_tracks(store, &mut snapshot, options.dry_run);
    report.tracks_merged = tracks.merged;
    report.events_repointed_by_track_pass = tracks.repointed;
    report.failed_groups.extend(tracks.failed_groups);
    info!(
        "Track pass: {} tracks merged, {} play events re-pointed",
        tracks.merged, tracks.repointed
    );

    check("temporal dedup")?;
    let scan = temporal_dedup::scan(&snapshot.events, options.window_seconds);
    if scan.skipped_invalid > 0 {
        warn!(
            "Skipped {} play events with a missing track or timestamp",
            scan.skipped_invalid
        );
    }
    report.skipped_invalid_events = scan.skipped_invalid;
    report.duplicate_events_removed = if options.dry_run {
        scan.duplicate_ids.len()
    } else {
        store
            .delete_play_events(&scan.duplicate_ids)
            .map_err(|source| ConsolidationError::StoreUnavailable {
                operation: "delete duplicate play events",
                source,
            })?
    };
    info!(
        "Temporal dedup: {} duplicate play events removed across {} clusters",
        report.duplicate_events_removed, scan.clusters
    );

    if !report.failed_groups.is_empty() {
        warn!(
            "{} merge groups failed and were left untouched",
            report.failed_groups.len()
        );
    }
    info!("Consolidation finished in {:?}", started.elapsed());

    Ok(report)
}
