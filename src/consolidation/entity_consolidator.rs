//! Album and track consolidation.
//!
//! Planning is pure: it groups an in-memory snapshot by normalized title and
//! picks survivors. Applying hands each group to the store as one atomic
//! merge, then folds the merges that succeeded into the snapshot so later
//! passes see the final foreign keys.

use super::normalize::normalize;
use super::report::FailedGroup;
use crate::history_store::{
    Album, AlbumId, EntityKind, EntityMerge, HistoryStore, PlayEvent, Track,
};
use anyhow::Result;
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};

/// In-memory copy of the rows a consolidation run works on.
#[derive(Debug, Clone, Default)]
pub struct HistorySnapshot {
    pub albums: Vec<Album>,
    pub tracks: Vec<Track>,
    pub events: Vec<PlayEvent>,
}

impl HistorySnapshot {
    pub fn fetch(store: &dyn HistoryStore) -> Result<Self> {
        Ok(Self {
            albums: store.fetch_all_albums()?,
            tracks: store.fetch_all_tracks()?,
            events: store.fetch_all_play_events()?,
        })
    }

    /// Number of dependent rows per parent id: tracks per album, events per track.
    fn dependent_counts(&self, kind: EntityKind) -> HashMap<i64, usize> {
        let mut counts: HashMap<i64, usize> = HashMap::new();
        match kind {
            EntityKind::Album => {
                for track in &self.tracks {
                    *counts.entry(track.album_id).or_default() += 1;
                }
            }
            EntityKind::Track => {
                for track_id in self.events.iter().filter_map(|e| e.track_id) {
                    *counts.entry(track_id).or_default() += 1;
                }
            }
        }
        counts
    }

    /// Fold every applied merge of one pass into the snapshot in a single sweep.
    fn apply(&mut self, kind: EntityKind, merges: &[EntityMerge]) {
        let survivor_of: HashMap<i64, i64> = merges
            .iter()
            .flat_map(|m| m.duplicate_ids.iter().map(move |id| (*id, m.survivor_id)))
            .collect();
        if survivor_of.is_empty() {
            return;
        }
        match kind {
            EntityKind::Album => {
                for track in &mut self.tracks {
                    if let Some(survivor) = survivor_of.get(&track.album_id) {
                        track.album_id = *survivor;
                    }
                }
                self.albums.retain(|a| !survivor_of.contains_key(&a.id));
            }
            EntityKind::Track => {
                for event in &mut self.events {
                    if let Some(survivor) = event.track_id.and_then(|id| survivor_of.get(&id)) {
                        event.track_id = Some(*survivor);
                    }
                }
                self.tracks.retain(|t| !survivor_of.contains_key(&t.id));
            }
        }
    }
}

/// A merge group together with the key it was grouped under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedMerge {
    pub normalized_title: String,
    pub merge: EntityMerge,
}

/// Result of one consolidation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassOutcome {
    /// Entities deleted after being folded into a survivor.
    pub merged: usize,
    /// Dependent rows moved onto survivors.
    pub repointed: usize,
    pub failed_groups: Vec<FailedGroup>,
}

/// Group albums by normalized title.
///
/// The survivor is the album with the most tracks, lowest id on ties.
pub fn plan_album_merges(albums: &[Album], tracks: &[Track]) -> Vec<PlannedMerge> {
    let mut track_counts: HashMap<AlbumId, usize> = HashMap::new();
    for track in tracks {
        *track_counts.entry(track.album_id).or_default() += 1;
    }

    let mut groups: BTreeMap<String, Vec<&Album>> = BTreeMap::new();
    for album in albums {
        groups.entry(normalize(&album.title)).or_default().push(album);
    }

    groups
        .into_iter()
        .filter(|(_, members)| members.len() > 1)
        .filter_map(|(key, members)| {
            let survivor = members.iter().min_by_key(|album| {
                (
                    Reverse(track_counts.get(&album.id).copied().unwrap_or(0)),
                    album.id,
                )
            })?;
            Some(planned(EntityKind::Album, key, survivor.id, &members, |a| a.id))
        })
        .collect()
}

/// Group tracks by `(album_id, normalized title)`.
///
/// Never crosses album boundaries. The survivor is the lowest id.
pub fn plan_track_merges(tracks: &[Track]) -> Vec<PlannedMerge> {
    let mut groups: BTreeMap<(AlbumId, String), Vec<&Track>> = BTreeMap::new();
    for track in tracks {
        groups
            .entry((track.album_id, normalize(&track.title)))
            .or_default()
            .push(track);
    }

    groups
        .into_iter()
        .filter(|(_, members)| members.len() > 1)
        .filter_map(|((_, key), members)| {
            let survivor = members.iter().map(|t| t.id).min()?;
            Some(planned(EntityKind::Track, key, survivor, &members, |t| t.id))
        })
        .collect()
}

fn planned<T>(
    kind: EntityKind,
    normalized_title: String,
    survivor_id: i64,
    members: &[&T],
    id_of: impl Fn(&T) -> i64,
) -> PlannedMerge {
    let mut duplicate_ids: Vec<i64> = members
        .iter()
        .map(|m| id_of(m))
        .filter(|id| *id != survivor_id)
        .collect();
    duplicate_ids.sort_unstable();
    PlannedMerge {
        normalized_title,
        merge: EntityMerge {
            kind,
            survivor_id,
            duplicate_ids,
        },
    }
}

/// Merge duplicate albums, re-pointing their tracks to the survivor.
pub fn consolidate_albums(
    store: &dyn HistoryStore,
    snapshot: &mut HistorySnapshot,
    dry_run: bool,
) -> PassOutcome {
    let plan = plan_album_merges(&snapshot.albums, &snapshot.tracks);
    apply_plan(store, snapshot, EntityKind::Album, plan, dry_run)
}

/// Merge duplicate tracks within each album, re-pointing their play events.
///
/// Must run after [`consolidate_albums`]: album merges change the grouping scope.
pub fn consolidate_tracks(
    store: &dyn HistoryStore,
    snapshot: &mut HistorySnapshot,
    dry_run: bool,
) -> PassOutcome {
    let plan = plan_track_merges(&snapshot.tracks);
    apply_plan(store, snapshot, EntityKind::Track, plan, dry_run)
}

/// Groups of one pass are disjoint, so the snapshot is only rewritten once the
/// whole pass has been applied.
fn apply_plan(
    store: &dyn HistoryStore,
    snapshot: &mut HistorySnapshot,
    kind: EntityKind,
    plan: Vec<PlannedMerge>,
    dry_run: bool,
) -> PassOutcome {
    let mut outcome = PassOutcome::default();
    let dependents = if dry_run {
        snapshot.dependent_counts(kind)
    } else {
        HashMap::new()
    };
    let mut applied = Vec::with_capacity(plan.len());

    for PlannedMerge {
        normalized_title,
        merge,
    } in plan
    {
        debug!(
            "Planned {} merge '{}': survivor {}, duplicates {:?}",
            merge.kind, normalized_title, merge.survivor_id, merge.duplicate_ids
        );

        let result = if dry_run {
            Ok(merge
                .duplicate_ids
                .iter()
                .map(|id| dependents.get(id).copied().unwrap_or(0))
                .sum())
        } else {
            store.apply_merge(&merge)
        };

        match result {
            Ok(repointed) => {
                info!(
                    "Merged {} {} {:?} into {} ('{}'), {} rows re-pointed",
                    merge.duplicate_ids.len(),
                    merge.kind,
                    merge.duplicate_ids,
                    merge.survivor_id,
                    normalized_title,
                    repointed
                );
                outcome.merged += merge.duplicate_ids.len();
                outcome.repointed += repointed;
                applied.push(merge);
            }
            Err(e) => {
                warn!(
                    "Skipping {} group '{}' (survivor {}): {:#}",
                    merge.kind, normalized_title, merge.survivor_id, e
                );
                outcome.failed_groups.push(FailedGroup {
                    entity: merge.kind,
                    normalized_title,
                    survivor_id: merge.survivor_id,
                    duplicate_ids: merge.duplicate_ids,
                    reason: format!("{:#}", e),
                });
            }
        }
    }

    snapshot.apply(kind, &applied);
    outcome
}
