//! Common test infrastructure
//!
//! End-to-end tests work on a real history database file inside a temp
//! directory. Tests should only import from this module, not from internal
//! submodules.

mod constants;
mod fixtures;

pub use constants::*;
pub use fixtures::{create_scenario_db, open_raw, TestDb};
