use crate::history_store::EntityKind;
use serde::Serialize;
use std::fmt;

/// A merge group that could not be applied and was left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedGroup {
    pub entity: EntityKind,
    pub normalized_title: String,
    pub survivor_id: i64,
    pub duplicate_ids: Vec<i64>,
    pub reason: String,
}

impl fmt::Display for FailedGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} group '{}' (survivor {}, duplicates {:?}): {}",
            self.entity, self.normalized_title, self.survivor_id, self.duplicate_ids, self.reason
        )
    }
}

/// Summary of one consolidation run. Counts only, no row data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Report {
    pub dry_run: bool,
    pub albums_merged: usize,
    pub tracks_repointed_by_album_pass: usize,
    pub tracks_merged: usize,
    pub events_repointed_by_track_pass: usize,
    pub duplicate_events_removed: usize,
    pub skipped_invalid_events: usize,
    pub failed_groups: Vec<FailedGroup>,
}

impl Report {
    /// True when the run neither merged nor removed anything.
    pub fn is_noop(&self) -> bool {
        self.albums_merged == 0
            && self.tracks_repointed_by_album_pass == 0
            && self.tracks_merged == 0
            && self.events_repointed_by_track_pass == 0
            && self.duplicate_events_removed == 0
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.dry_run {
            writeln!(f, "Consolidation report (dry run, nothing written)")?;
        } else {
            writeln!(f, "Consolidation report")?;
        }
        writeln!(f, "  albums merged:                  {}", self.albums_merged)?;
        writeln!(
            f,
            "  tracks re-pointed (album pass): {}",
            self.tracks_repointed_by_album_pass
        )?;
        writeln!(f, "  tracks merged:                  {}", self.tracks_merged)?;
        writeln!(
            f,
            "  events re-pointed (track pass): {}",
            self.events_repointed_by_track_pass
        )?;
        writeln!(
            f,
            "  duplicate events removed:       {}",
            self.duplicate_events_removed
        )?;
        writeln!(
            f,
            "  invalid events skipped:         {}",
            self.skipped_invalid_events
        )?;
        write!(f, "  failed groups:                  {}", self.failed_groups.len())?;
        for group in &self.failed_groups {
            write!(f, "\n    - {}", group)?;
        }
        Ok(())
    }
}
