//! Statistics generation from the crawl database
//!
//! This module extracts per-user crawl statistics from storage and prints
//! them for the `--stats` command.

use crate::output::OutputResult;
use crate::state::{CrawlProgress, RunStatus};
use crate::storage::{ProgressStore, SqliteStorage};

/// Crawl statistics for one user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserStatistics {
    pub user: String,

    /// Status of the stored run, if any
    pub status: Option<RunStatus>,

    /// Number of (city, strategy, age) cells in the run
    pub cells_total: usize,

    /// Cells completed or skipped
    pub cells_done: usize,

    /// Next unfinished cell, as "city / strategy / age"
    pub position: Option<String>,

    /// Profiles recorded for this user across all runs
    pub found_total: u64,

    /// Recorded profiles per city, busiest first
    pub found_by_city: Vec<(String, u64)>,
}

impl UserStatistics {
    pub fn completion_percent(&self) -> f64 {
        if self.cells_total == 0 {
            return 0.0;
        }
        (self.cells_done as f64 / self.cells_total as f64) * 100.0
    }
}

/// First non-terminal cell in walk order
fn current_position(progress: &CrawlProgress) -> Option<String> {
    for city in progress.request.cities() {
        let Some(city_progress) = progress.city(city) else {
            continue;
        };
        if city_progress.completed {
            continue;
        }
        for (strategy, strategy_progress) in &city_progress.strategies {
            if strategy_progress.completed {
                continue;
            }
            if let Some((age, _)) = strategy_progress
                .ages
                .iter()
                .find(|(_, cell)| !cell.state().is_terminal())
            {
                return Some(format!("{} / {} / {}", city, strategy, age));
            }
        }
    }
    None
}

/// Loads statistics for the given users, plus any user with stored progress
pub fn load_statistics(
    storage: &SqliteStorage,
    users: &[String],
) -> OutputResult<Vec<UserStatistics>> {
    let mut all_users: Vec<String> = users.to_vec();
    for user in storage.progress_users()? {
        if !all_users.contains(&user) {
            all_users.push(user);
        }
    }

    let mut stats = Vec::with_capacity(all_users.len());
    for user in all_users {
        let progress = storage.load_progress(&user)?;

        stats.push(UserStatistics {
            status: progress.as_ref().map(|p| p.status),
            cells_total: progress.as_ref().map_or(0, |p| p.total_cells()),
            cells_done: progress.as_ref().map_or(0, |p| p.terminal_cells()),
            position: progress.as_ref().and_then(current_position),
            found_total: storage.count_found(&user)?,
            found_by_city: storage.count_found_by_city(&user)?,
            user,
        });
    }

    Ok(stats)
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &[UserStatistics]) {
    println!("=== Profile-Sieve Statistics ===\n");

    if stats.is_empty() {
        println!("No users configured and no stored progress.");
        return;
    }

    for user in stats {
        println!("User: {}", user.user);
        match user.status {
            Some(status) => println!("  Status: {}", status.to_db_string()),
            None => println!("  Status: never run"),
        }
        println!(
            "  Cells: {} / {} ({:.1}%)",
            user.cells_done,
            user.cells_total,
            user.completion_percent()
        );
        if let Some(position) = &user.position {
            println!("  Next cell: {}", position);
        }
        println!("  Profiles found: {}", user.found_total);
        for (city, count) in &user.found_by_city {
            println!("    - {}: {}", city, count);
        }
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{GenderStrategy, SearchRequest};

    fn progress() -> CrawlProgress {
        let request = SearchRequest::new(
            &["Springfield".to_string(), "Shelbyville".to_string()],
            &["chess".to_string()],
            18,
            19,
            false,
        )
        .unwrap();
        CrawlProgress::new("alice", request)
    }

    #[test]
    fn test_completion_percent() {
        let stats = UserStatistics {
            user: "alice".to_string(),
            status: Some(RunStatus::Searching),
            cells_total: 8,
            cells_done: 2,
            position: None,
            found_total: 0,
            found_by_city: vec![],
        };
        assert_eq!(stats.completion_percent(), 25.0);
    }

    #[test]
    fn test_current_position_follows_walk_order() {
        let mut progress = progress();
        assert_eq!(
            current_position(&progress).as_deref(),
            Some("Springfield / primary / 18")
        );

        progress
            .cell_mut("Springfield", GenderStrategy::Primary, 18)
            .unwrap()
            .complete();
        assert_eq!(
            current_position(&progress).as_deref(),
            Some("Springfield / primary / 19")
        );

        progress.city_mut("Springfield").unwrap().mark_unresolved();
        assert_eq!(
            current_position(&progress).as_deref(),
            Some("Shelbyville / primary / 18")
        );
    }

    #[test]
    fn test_load_statistics_includes_stored_users() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        storage.save_progress("bob", &progress()).unwrap();

        let stats = load_statistics(&storage, &["alice".to_string()]).unwrap();
        assert_eq!(stats.len(), 2);

        assert_eq!(stats[0].user, "alice");
        assert_eq!(stats[0].status, None);
        assert_eq!(stats[0].cells_total, 0);

        assert_eq!(stats[1].user, "bob");
        assert_eq!(stats[1].status, Some(RunStatus::Searching));
        assert_eq!(stats[1].cells_total, 8);
        assert_eq!(stats[1].cells_done, 0);
    }
}
