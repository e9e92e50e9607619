//! Persistence for the music catalog and listening history.

mod models;
mod schema;
mod store;
mod trait_def;

pub use models::*;
pub use schema::HISTORY_VERSIONED_SCHEMAS;
pub use store::{format_play_date, SqliteHistoryStore};
pub use trait_def::HistoryStore;
