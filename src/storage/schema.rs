//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Profile-Sieve database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One resumable cursor per user, stored as human-editable JSON
CREATE TABLE IF NOT EXISTS crawl_progress (
    user TEXT PRIMARY KEY,
    status TEXT NOT NULL,
    progress TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Cooperative cancellation flags, kept apart from the cursor so that
-- saving progress never overwrites a stop request
CREATE TABLE IF NOT EXISTS search_flags (
    user TEXT PRIMARY KEY,
    searching INTEGER NOT NULL DEFAULT 0,
    updated_at TEXT NOT NULL
);

-- Matched profiles, delivered at least once and recorded once per user
CREATE TABLE IF NOT EXISTS found_profiles (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user TEXT NOT NULL,
    profile_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    profile_url TEXT NOT NULL,
    photo_url TEXT,
    bdate TEXT,
    city TEXT NOT NULL,
    place_id INTEGER NOT NULL,
    age INTEGER NOT NULL,
    strategy TEXT NOT NULL,
    matches TEXT NOT NULL,
    found_at TEXT NOT NULL,
    UNIQUE(user, profile_id)
);

CREATE INDEX IF NOT EXISTS idx_found_profiles_user ON found_profiles(user);
CREATE INDEX IF NOT EXISTS idx_found_profiles_city ON found_profiles(user, city);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
