use thiserror::Error;

/// Errors that abort a consolidation run.
///
/// Data-level anomalies (failed merge groups, invalid play events) are never
/// errors; they are recorded in the [`Report`](super::Report).
#[derive(Debug, Error)]
pub enum ConsolidationError {
    #[error("History store unavailable while trying to {operation}: {source}")]
    StoreUnavailable {
        operation: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("Consolidation cancelled before {phase}")]
    Cancelled { phase: &'static str },
}
