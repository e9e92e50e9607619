//! Specific background job implementations.

pub mod listening_consolidation;

pub use listening_consolidation::ListeningConsolidationJob;
