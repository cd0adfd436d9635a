//! SQLite storage implementation
//!
//! One connection behind a mutex serves every crawl task in the process.
//! Statements are short, so the lock is never held across an await point.

use crate::matcher::MatchHit;
use crate::state::{CrawlProgress, GenderStrategy, RunStatus};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{
    ProgressStore, ResultSink, SearchControl, StorageError, StorageResult,
};
use crate::storage::FoundProfile;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// A found profile as stored, with its user and discovery time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundRecord {
    pub user: String,
    pub found_at: String,
    pub profile: FoundProfile,
}

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Opens or creates the database at `path`
    pub fn new(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Users with a stored cursor, sorted by name
    pub fn progress_users(&self) -> StorageResult<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT user FROM crawl_progress ORDER BY user")?;
        let users = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(users)
    }

    /// Stored run status for `user`, without decoding the cursor
    pub fn progress_status(&self, user: &str) -> StorageResult<Option<RunStatus>> {
        let status: Option<String> = self
            .conn()
            .query_row(
                "SELECT status FROM crawl_progress WHERE user = ?1",
                params![user],
                |row| row.get(0),
            )
            .optional()?;

        Ok(status.and_then(|s| RunStatus::from_db_string(&s)))
    }

    /// Number of profiles recorded for `user`
    pub fn count_found(&self, user: &str) -> StorageResult<u64> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM found_profiles WHERE user = ?1",
            params![user],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Found counts per city for `user`, busiest city first
    pub fn count_found_by_city(&self, user: &str) -> StorageResult<Vec<(String, u64)>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT city, COUNT(*) AS n FROM found_profiles WHERE user = ?1
             GROUP BY city ORDER BY n DESC, city ASC",
        )?;
        let rows = stmt
            .query_map(params![user], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Every profile recorded for `user`, in discovery order
    pub fn list_found(&self, user: &str) -> StorageResult<Vec<FoundRecord>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT user, profile_id, name, profile_url, photo_url, bdate, city, place_id,
                    age, strategy, matches, found_at
             FROM found_profiles WHERE user = ?1 ORDER BY id ASC",
        )?;

        let rows = stmt
            .query_map(params![user], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, String>(6)?,
                    row.get::<_, i64>(7)?,
                    row.get::<_, u8>(8)?,
                    row.get::<_, String>(9)?,
                    row.get::<_, String>(10)?,
                    row.get::<_, String>(11)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(
                |(
                    user,
                    profile_id,
                    name,
                    profile_url,
                    photo_url,
                    bdate,
                    city,
                    place_id,
                    age,
                    strategy,
                    matches,
                    found_at,
                )| {
                    let strategy = GenderStrategy::from_db_string(&strategy).ok_or_else(|| {
                        StorageError::Corrupt {
                            user: user.clone(),
                            message: format!("unknown strategy '{}'", strategy),
                        }
                    })?;
                    let hits: Vec<MatchHit> = serde_json::from_str(&matches)?;

                    Ok(FoundRecord {
                        user,
                        found_at,
                        profile: FoundProfile {
                            profile_id,
                            name,
                            profile_url,
                            photo_url,
                            bdate,
                            city,
                            place_id,
                            age,
                            strategy,
                            hits,
                        },
                    })
                },
            )
            .collect()
    }
}

impl ProgressStore for SqliteStorage {
    fn load_progress(&self, user: &str) -> StorageResult<Option<CrawlProgress>> {
        let json: Option<String> = self
            .conn()
            .query_row(
                "SELECT progress FROM crawl_progress WHERE user = ?1",
                params![user],
                |row| row.get(0),
            )
            .optional()?;

        match json {
            Some(json) => Ok(Some(CrawlProgress::from_json(&json)?)),
            None => Ok(None),
        }
    }

    fn save_progress(&self, user: &str, progress: &CrawlProgress) -> StorageResult<()> {
        let json = progress.to_json()?;
        self.conn().execute(
            "INSERT INTO crawl_progress (user, status, progress, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user) DO UPDATE SET
                status = excluded.status,
                progress = excluded.progress,
                updated_at = excluded.updated_at",
            params![
                user,
                progress.status.to_db_string(),
                json,
                progress.updated_at.to_rfc3339()
            ],
        )?;
        Ok(())
    }

    fn clear_progress(&self, user: &str) -> StorageResult<()> {
        self.conn()
            .execute("DELETE FROM crawl_progress WHERE user = ?1", params![user])?;
        Ok(())
    }
}

impl ResultSink for SqliteStorage {
    fn on_found(&self, user: &str, found: &FoundProfile) -> StorageResult<bool> {
        let matches = serde_json::to_string(&found.hits)?;
        let inserted = self.conn().execute(
            "INSERT OR IGNORE INTO found_profiles
                (user, profile_id, name, profile_url, photo_url, bdate, city, place_id,
                 age, strategy, matches, found_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                user,
                found.profile_id,
                found.name,
                found.profile_url,
                found.photo_url,
                found.bdate,
                found.city,
                found.place_id,
                found.age,
                found.strategy.as_str(),
                matches,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(inserted > 0)
    }
}

impl SearchControl for SqliteStorage {
    fn is_still_searching(&self, user: &str) -> StorageResult<bool> {
        let searching: Option<bool> = self
            .conn()
            .query_row(
                "SELECT searching FROM search_flags WHERE user = ?1",
                params![user],
                |row| row.get(0),
            )
            .optional()?;
        Ok(searching.unwrap_or(false))
    }

    fn set_searching(&self, user: &str, searching: bool) -> StorageResult<()> {
        self.conn().execute(
            "INSERT INTO search_flags (user, searching, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(user) DO UPDATE SET
                searching = excluded.searching,
                updated_at = excluded.updated_at",
            params![user, searching, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}
