//! Background job scheduling and execution system.
//!
//! Runs consolidation periodically and in response to hook events such as a
//! finished scrobble import.

mod context;
mod job;
pub mod jobs;
mod scheduler;

pub use context::JobContext;
pub use job::{BackgroundJob, HookEvent, JobError, JobSchedule, ShutdownBehavior};
pub use scheduler::JobScheduler;
