//! Listening-history consolidation.
//!
//! Merges duplicate albums and tracks that differ only superficially in title,
//! then removes play events that two tracking sources recorded for the same
//! physical playback.

mod entity_consolidator;
mod error;
mod normalize;
mod orchestrator;
mod report;
mod temporal_dedup;

pub use entity_consolidator::{
    consolidate_albums, consolidate_tracks, plan_album_merges, plan_track_merges,
    HistorySnapshot, PassOutcome, PlannedMerge,
};
pub use error::ConsolidationError;
pub use normalize::normalize;
pub use orchestrator::{
    run_consolidation, run_consolidation_with_cancel, run_consolidation_with_options,
    ConsolidationOptions,
};
pub use report::{FailedGroup, Report};
pub use temporal_dedup::{find_duplicates, scan, DedupScan, DEFAULT_WINDOW_SECONDS};
