//! Background job that consolidates the listening history.
//!
//! Runs the album pass, the track pass and temporal dedup against the shared
//! history store. Triggered on its interval (if any), at startup and whenever
//! an importer signals that a batch of scrobbles landed.

use crate::background_jobs::{
    context::JobContext,
    job::{BackgroundJob, HookEvent, JobError, JobSchedule, ShutdownBehavior},
};
use crate::consolidation::{run_consolidation_with_cancel, ConsolidationError, ConsolidationOptions};
use std::time::Duration;
use tracing::{info, warn};

pub struct ListeningConsolidationJob {
    options: ConsolidationOptions,
    /// None disables interval runs; hooks still trigger the job.
    interval: Option<Duration>,
    run_on_startup: bool,
    listen_for_imports: bool,
}

impl ListeningConsolidationJob {
    pub fn new(options: ConsolidationOptions, interval: Option<Duration>, run_on_startup: bool) -> Self {
        Self {
            options,
            interval,
            run_on_startup,
            listen_for_imports: true,
        }
    }

    /// Stop reacting to `OnImportBatch`, for processes that run no importer.
    pub fn without_import_hook(mut self) -> Self {
        self.listen_for_imports = false;
        self
    }
}

impl BackgroundJob for ListeningConsolidationJob {
    fn id(&self) -> &'static str {
        "listening_consolidation"
    }

    fn name(&self) -> &'static str {
        "Listening History Consolidation"
    }

    fn description(&self) -> &'static str {
        "Merges duplicate albums and tracks and removes double-recorded play events"
    }

    fn schedule(&self) -> JobSchedule {
        let mut hooks = Vec::with_capacity(2);
        if self.run_on_startup {
            hooks.push(HookEvent::OnStartup);
        }
        if self.listen_for_imports {
            hooks.push(HookEvent::OnImportBatch);
        }
        JobSchedule::Combined {
            interval: self.interval,
            hooks,
        }
    }

    fn shutdown_behavior(&self) -> ShutdownBehavior {
        // Phases are committed group by group; let the current one finish.
        ShutdownBehavior::WaitForCompletion
    }

    fn execute(&self, ctx: &JobContext) -> Result<(), JobError> {
        let result = run_consolidation_with_cancel(ctx.history_store.as_ref(), &self.options, || {
            ctx.is_cancelled()
        });

        match result {
            Ok(report) => {
                info!("{}", report);
                for failed in &report.failed_groups {
                    warn!("Failed merge group: {}", failed);
                }
                Ok(())
            }
            Err(ConsolidationError::Cancelled { phase }) => {
                info!("Consolidation cancelled before {}", phase);
                Err(JobError::Cancelled)
            }
            Err(e) => Err(JobError::ExecutionFailed(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history_store::{HistoryStore, PlaySource, SqliteHistoryStore};
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    fn create_context() -> (JobContext, Arc<SqliteHistoryStore>) {
        let store = Arc::new(SqliteHistoryStore::in_memory().unwrap());
        store.insert_album(1, "Blue").unwrap();
        store.insert_album(2, "blue").unwrap();
        store.insert_track(10, 1, "Song").unwrap();
        store.insert_track(11, 2, "Song").unwrap();
        store
            .insert_play_event(100, 10, 5_000, PlaySource::Lastfm, false)
            .unwrap();
        store
            .insert_play_event(101, 11, 5_030, PlaySource::Roon, false)
            .unwrap();
        let ctx = JobContext::new(CancellationToken::new(), store.clone());
        (ctx, store)
    }

    #[test]
    fn test_job_metadata() {
        let job = ListeningConsolidationJob::new(ConsolidationOptions::default(), None, true);
        assert_eq!(job.id(), "listening_consolidation");
        assert_eq!(job.shutdown_behavior(), ShutdownBehavior::WaitForCompletion);
        assert_eq!(
            job.schedule(),
            JobSchedule::Combined {
                interval: None,
                hooks: vec![HookEvent::OnStartup, HookEvent::OnImportBatch],
            }
        );
    }

    #[test]
    fn test_schedule_without_startup_run() {
        let every_day = Duration::from_secs(24 * 60 * 60);
        let job =
            ListeningConsolidationJob::new(ConsolidationOptions::default(), Some(every_day), false);
        let schedule = job.schedule();
        assert_eq!(schedule.interval(), Some(every_day));
        assert!(!schedule.listens_to(HookEvent::OnStartup));
        assert!(schedule.listens_to(HookEvent::OnImportBatch));
    }

    #[test]
    fn test_schedule_without_import_hook() {
        let every_hour = Duration::from_secs(60 * 60);
        let job = ListeningConsolidationJob::new(ConsolidationOptions::default(), Some(every_hour), true)
            .without_import_hook();
        assert_eq!(
            job.schedule(),
            JobSchedule::Combined {
                interval: Some(every_hour),
                hooks: vec![HookEvent::OnStartup],
            }
        );
    }

    #[test]
    fn test_execute_consolidates_store() {
        let (ctx, store) = create_context();
        let job = ListeningConsolidationJob::new(ConsolidationOptions::default(), None, true);

        job.execute(&ctx).unwrap();

        let counts = store.counts().unwrap();
        assert_eq!(counts.albums, 1);
        assert_eq!(counts.tracks, 1);
        assert_eq!(counts.play_events, 1);
    }

    #[test]
    fn test_execute_dry_run_leaves_store_untouched() {
        let (ctx, store) = create_context();
        let options = ConsolidationOptions {
            dry_run: true,
            ..Default::default()
        };
        let job = ListeningConsolidationJob::new(options, None, true);

        job.execute(&ctx).unwrap();

        let counts = store.counts().unwrap();
        assert_eq!(counts.albums, 2);
        assert_eq!(counts.tracks, 2);
        assert_eq!(counts.play_events, 2);
    }

    #[test]
    fn test_execute_cancelled() {
        let (ctx, store) = create_context();
        ctx.cancellation_token.cancel();
        let job = ListeningConsolidationJob::new(ConsolidationOptions::default(), None, true);

        assert_eq!(job.execute(&ctx), Err(JobError::Cancelled));
        assert_eq!(store.counts().unwrap().albums, 2);
    }
}
