//! Shared constants for end-to-end tests

// ============================================================================
// Scenario catalog
// ============================================================================

/// "Debut", the album both tracking sources agree on
pub const DEBUT_ALBUM_ID: i64 = 10;

/// "Intro" as imported from Last.fm
pub const INTRO_TRACK_ID: i64 = 1;

/// "INTRO" as imported from Roon, a duplicate of [`INTRO_TRACK_ID`]
pub const INTRO_DUPLICATE_TRACK_ID: i64 = 2;

// ============================================================================
// Scenario play events
// ============================================================================

/// Last.fm play of "Intro"
pub const LASTFM_PLAY_ID: i64 = 1;
pub const LASTFM_PLAY_TS: i64 = 1_000;

/// Roon record of the same playback, 200 seconds later
pub const ROON_PLAY_ID: i64 = 2;
pub const ROON_PLAY_TS: i64 = 1_200;

/// A later, separate listen
pub const LATER_PLAY_ID: i64 = 3;
pub const LATER_PLAY_TS: i64 = 50_000;
