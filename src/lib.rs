//! Listening History Consolidator Library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod background_jobs;
pub mod config;
pub mod consolidation;
pub mod history_store;
pub mod sqlite_persistence;

// Re-export commonly used types for convenience
pub use consolidation::{run_consolidation, ConsolidationError, ConsolidationOptions, Report};
pub use history_store::{HistoryStore, SqliteHistoryStore};
