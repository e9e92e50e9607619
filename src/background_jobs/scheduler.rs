use super::context::JobContext;
use super::job::{BackgroundJob, HookEvent, JobError, ShutdownBehavior};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// How long the loop sleeps when no interval job is pending.
const IDLE_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// How long shutdown waits for a single running job.
const SHUTDOWN_JOB_TIMEOUT: Duration = Duration::from_secs(30);

struct RunningJob {
    handle: JoinHandle<()>,
    cancel_token: CancellationToken,
}

/// Runs registered jobs on their interval and in response to hook events.
///
/// A job never runs concurrently with itself: a trigger that arrives while it
/// is running is dropped.
pub struct JobScheduler {
    jobs: HashMap<&'static str, Arc<dyn BackgroundJob>>,

    /// Next due time of interval-driven jobs.
    next_runs: HashMap<&'static str, Instant>,

    running: HashMap<&'static str, RunningJob>,

    hook_receiver: mpsc::Receiver<HookEvent>,

    /// Spawned jobs report their id here when they finish.
    completed_sender: mpsc::UnboundedSender<&'static str>,
    completed_receiver: mpsc::UnboundedReceiver<&'static str>,

    shutdown_token: CancellationToken,

    /// Jobs get a child context of this one.
    job_context: JobContext,
}

impl JobScheduler {
    pub fn new(
        hook_receiver: mpsc::Receiver<HookEvent>,
        shutdown_token: CancellationToken,
        job_context: JobContext,
    ) -> Self {
        let (completed_sender, completed_receiver) = mpsc::unbounded_channel();
        Self {
            jobs: HashMap::new(),
            next_runs: HashMap::new(),
            running: HashMap::new(),
            hook_receiver,
            completed_sender,
            completed_receiver,
            shutdown_token,
            job_context,
        }
    }

    /// Register a job. Interval jobs first become due one interval from now.
    pub fn register_job(&mut self, job: Arc<dyn BackgroundJob>) {
        let job_id = job.id();
        info!("Registering job: {} - {}", job_id, job.description());
        if let Some(interval) = job.schedule().interval() {
            self.next_runs.insert(job_id, Instant::now() + interval);
        }
        self.jobs.insert(job_id, job);
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    /// Main scheduler loop. Returns after the shutdown token is cancelled and
    /// running jobs have been dealt with.
    pub async fn run(&mut self) {
        info!("Starting job scheduler with {} registered jobs", self.jobs.len());

        self.trigger_jobs_for_hook(HookEvent::OnStartup);

        loop {
            let sleep_duration = self.time_until_next_scheduled_job();
            debug!(
                "Scheduler sleeping for {:?} until next scheduled job",
                sleep_duration
            );

            tokio::select! {
                _ = tokio::time::sleep(sleep_duration) => {
                    self.run_due_jobs();
                }
                Some(event) = self.hook_receiver.recv() => {
                    debug!("Received hook event: {}", event);
                    self.trigger_jobs_for_hook(event);
                }
                Some(job_id) = self.completed_receiver.recv() => {
                    self.finish_job(job_id).await;
                }
                _ = self.shutdown_token.cancelled() => {
                    info!("Scheduler received shutdown signal");
                    self.shutdown().await;
                    break;
                }
            }
        }

        info!("Job scheduler stopped");
    }

    fn time_until_next_scheduled_job(&self) -> Duration {
        let now = Instant::now();
        self.next_runs
            .iter()
            .filter(|(job_id, _)| !self.running.contains_key(*job_id))
            .map(|(_, due)| due.saturating_duration_since(now))
            .min()
            .unwrap_or(IDLE_CHECK_INTERVAL)
            .min(IDLE_CHECK_INTERVAL)
    }

    fn run_due_jobs(&mut self) {
        let now = Instant::now();
        let due: Vec<&'static str> = self
            .next_runs
            .iter()
            .filter(|(job_id, at)| **at <= now && !self.running.contains_key(*job_id))
            .map(|(job_id, _)| *job_id)
            .collect();

        for job_id in due {
            if let Err(e) = self.trigger_job(job_id, "schedule") {
                debug!("Scheduled run of {} skipped: {}", job_id, e);
            }
        }
    }

    fn trigger_jobs_for_hook(&mut self, event: HookEvent) {
        let listening: Vec<&'static str> = self
            .jobs
            .values()
            .filter(|job| job.schedule().listens_to(event))
            .map(|job| job.id())
            .collect();

        let trigger = format!("hook:{}", event);
        for job_id in listening {
            if let Err(e) = self.trigger_job(job_id, &trigger) {
                debug!("Hook {} did not start {}: {}", event, job_id, e);
            }
        }
    }

    /// Start a job on a blocking thread.
    fn trigger_job(&mut self, job_id: &'static str, triggered_by: &str) -> Result<(), JobError> {
        let job = self.jobs.get(job_id).cloned().ok_or(JobError::NotFound)?;
        if self.running.contains_key(job_id) {
            return Err(JobError::AlreadyRunning);
        }

        info!("Starting job: {} (triggered_by: {})", job_id, triggered_by);

        let ctx = self.job_context.child();
        let cancel_token = ctx.cancellation_token.clone();
        let completed_sender = self.completed_sender.clone();
        let handle = tokio::spawn(async move {
            let started = Instant::now();
            let result = tokio::task::spawn_blocking(move || job.execute(&ctx)).await;
            let elapsed = started.elapsed();
            match result {
                Ok(Ok(())) => info!("Job {} completed successfully in {:?}", job_id, elapsed),
                Ok(Err(JobError::Cancelled)) => {
                    info!("Job {} was cancelled after {:?}", job_id, elapsed)
                }
                Ok(Err(e)) => error!("Job {} failed after {:?}: {}", job_id, elapsed, e),
                Err(e) => error!("Job {} panicked after {:?}: {}", job_id, elapsed, e),
            }
            let _ = completed_sender.send(job_id);
        });

        self.running.insert(
            job_id,
            RunningJob {
                handle,
                cancel_token,
            },
        );
        Ok(())
    }

    /// Forget a finished run and schedule the next interval run from now.
    async fn finish_job(&mut self, job_id: &'static str) {
        if let Some(running) = self.running.remove(job_id) {
            let _ = running.handle.await;
        }
        let interval = self.jobs.get(job_id).and_then(|job| job.schedule().interval());
        if let Some(interval) = interval {
            self.next_runs.insert(job_id, Instant::now() + interval);
        }
    }

    async fn shutdown(&mut self) {
        info!("Shutting down scheduler...");

        for (job_id, running) in self.running.drain() {
            let behavior = self
                .jobs
                .get(job_id)
                .map(|job| job.shutdown_behavior())
                .unwrap_or_default();

            match behavior {
                ShutdownBehavior::Cancellable => {
                    debug!("Cancelling job: {}", job_id);
                    running.cancel_token.cancel();
                }
                ShutdownBehavior::WaitForCompletion => {
                    info!("Waiting for job {} to complete...", job_id);
                }
            }

            if tokio::time::timeout(SHUTDOWN_JOB_TIMEOUT, running.handle)
                .await
                .is_err()
            {
                warn!("Job {} did not finish within {:?}", job_id, SHUTDOWN_JOB_TIMEOUT);
            }
        }

        info!("Scheduler shutdown complete");
    }
}

#[cfg(test)]
mod tests {
    use super::super::job::JobSchedule;
    use super::*;
    use crate::history_store::SqliteHistoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingJob {
        schedule: JobSchedule,
        executions: Arc<AtomicUsize>,
    }

    impl BackgroundJob for CountingJob {
        fn id(&self) -> &'static str {
            "counting"
        }

        fn name(&self) -> &'static str {
            "Counting Job"
        }

        fn description(&self) -> &'static str {
            "Counts its executions"
        }

        fn schedule(&self) -> JobSchedule {
            self.schedule.clone()
        }

        fn execute(&self, _ctx: &JobContext) -> Result<(), JobError> {
            self.executions.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn create_test_scheduler(
        schedule: JobSchedule,
    ) -> (
        JobScheduler,
        mpsc::Sender<HookEvent>,
        CancellationToken,
        Arc<AtomicUsize>,
    ) {
        let (hook_sender, hook_receiver) = mpsc::channel(8);
        let shutdown = CancellationToken::new();
        let ctx = JobContext::new(
            CancellationToken::new(),
            Arc::new(SqliteHistoryStore::in_memory().unwrap()),
        );
        let mut scheduler = JobScheduler::new(hook_receiver, shutdown.clone(), ctx);

        let executions = Arc::new(AtomicUsize::new(0));
        scheduler.register_job(Arc::new(CountingJob {
            schedule,
            executions: Arc::clone(&executions),
        }));
        (scheduler, hook_sender, shutdown, executions)
    }

    async fn wait_for(counter: &AtomicUsize, at_least: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while counter.load(Ordering::SeqCst) < at_least {
            assert!(Instant::now() < deadline, "job did not run in time");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn test_register_job() {
        let (scheduler, _hooks, _shutdown, _count) =
            create_test_scheduler(JobSchedule::Hook(HookEvent::OnImportBatch));
        assert_eq!(scheduler.job_count(), 1);
        assert!(scheduler.next_runs.is_empty());
    }

    #[tokio::test]
    async fn test_startup_hook_runs_job() {
        let (mut scheduler, _hooks, shutdown, count) =
            create_test_scheduler(JobSchedule::Hook(HookEvent::OnStartup));
        let task = tokio::spawn(async move { scheduler.run().await });

        wait_for(&count, 1).await;
        shutdown.cancel();
        task.await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_hook_event_triggers_job() {
        let (mut scheduler, hooks, shutdown, count) = create_test_scheduler(
            JobSchedule::Combined {
                interval: None,
                hooks: vec![HookEvent::OnImportBatch],
            },
        );
        let task = tokio::spawn(async move { scheduler.run().await });

        hooks.send(HookEvent::OnImportBatch).await.unwrap();
        wait_for(&count, 1).await;

        shutdown.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_interval_job_repeats() {
        let (mut scheduler, _hooks, shutdown, count) =
            create_test_scheduler(JobSchedule::Interval(Duration::from_millis(20)));
        let task = tokio::spawn(async move { scheduler.run().await });

        wait_for(&count, 2).await;
        shutdown.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_trigger_unknown_job() {
        let (mut scheduler, _hooks, _shutdown, _count) =
            create_test_scheduler(JobSchedule::Hook(HookEvent::OnStartup));
        assert_eq!(
            scheduler.trigger_job("missing", "manual"),
            Err(JobError::NotFound)
        );
    }

    #[tokio::test]
    async fn test_job_does_not_run_twice_concurrently() {
        let (mut scheduler, _hooks, _shutdown, _count) =
            create_test_scheduler(JobSchedule::Hook(HookEvent::OnStartup));
        scheduler.trigger_job("counting", "manual").unwrap();
        assert_eq!(
            scheduler.trigger_job("counting", "manual"),
            Err(JobError::AlreadyRunning)
        );
    }
}
