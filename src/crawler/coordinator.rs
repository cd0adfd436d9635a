//! Crawler coordinator - run orchestration for every user
//!
//! This module contains the entry point that:
//! - Validates a user's search settings into a search request
//! - Refuses a second concurrent run for the same user
//! - Resumes a matching persisted cursor or starts a fresh one
//! - Hands the cursor to the state machine

use crate::api::Directory;
use crate::config::SearchSettings;
use crate::crawler::runner::{Collaborators, CrawlRun};
use crate::crawler::{CrawlSettings, RunSummary};
use crate::state::{CrawlProgress, RunStatus, SearchRequest};
use crate::storage::{ProgressStore, ResultSink, SearchControl};
use crate::{Result, SieveError};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

/// Main crawler structure, shared by every crawl task of the process
pub struct Crawler {
    directory: Arc<dyn Directory>,
    progress: Arc<dyn ProgressStore>,
    sink: Arc<dyn ResultSink>,
    control: Arc<dyn SearchControl>,
    settings: CrawlSettings,
    active: Arc<Mutex<HashSet<String>>>,
}

/// Marks a user's run as active until dropped
struct ActiveRun {
    user: String,
    active: Arc<Mutex<HashSet<String>>>,
}

impl Drop for ActiveRun {
    fn drop(&mut self) {
        lock_active(&self.active).remove(&self.user);
    }
}

fn lock_active(active: &Mutex<HashSet<String>>) -> MutexGuard<'_, HashSet<String>> {
    active.lock().unwrap_or_else(|e| e.into_inner())
}

impl Crawler {
    pub fn new(
        directory: Arc<dyn Directory>,
        progress: Arc<dyn ProgressStore>,
        sink: Arc<dyn ResultSink>,
        control: Arc<dyn SearchControl>,
        settings: CrawlSettings,
    ) -> Self {
        Self {
            directory,
            progress,
            sink,
            control,
            settings,
            active: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Whether a run for `user` is currently in flight
    pub fn is_running(&self, user: &str) -> bool {
        lock_active(&self.active).contains(user)
    }

    fn claim(&self, user: &str) -> Result<ActiveRun> {
        if !lock_active(&self.active).insert(user.to_string()) {
            return Err(SieveError::AlreadyRunning(user.to_string()));
        }
        Ok(ActiveRun {
            user: user.to_string(),
            active: self.active.clone(),
        })
    }

    /// Runs one user's crawl to completion or cancellation
    ///
    /// The caller marks the user as searching beforehand; clearing that flag
    /// stops the run at the next page or dimension boundary. A completed run
    /// clears the flag itself.
    pub async fn run_crawl(&self, user: &str, settings: &SearchSettings) -> Result<RunSummary> {
        let request = SearchRequest::from_settings(settings)?;
        let _active = self.claim(user)?;

        let (mut cursor, resumed) = self.prepare_cursor(user, request)?;

        cursor.status = RunStatus::Searching;
        cursor.touch();
        self.progress.save_progress(user, &cursor)?;

        tracing::info!(
            user,
            resumed,
            cities = cursor.request.cities().len(),
            cells = cursor.total_cells(),
            done = cursor.terminal_cells(),
            "Starting crawl"
        );

        let collaborators = Collaborators {
            directory: self.directory.as_ref(),
            progress: self.progress.as_ref(),
            sink: self.sink.as_ref(),
            control: self.control.as_ref(),
        };

        CrawlRun::new(cursor, collaborators, &self.settings, resumed)
            .run()
            .await
    }

    /// Loads the persisted cursor if it can be resumed, otherwise starts fresh
    fn prepare_cursor(
        &self,
        user: &str,
        request: SearchRequest,
    ) -> Result<(CrawlProgress, bool)> {
        match self.progress.load_progress(user)? {
            Some(existing) if existing.is_completed() => {
                tracing::info!(user, "Previous run completed, starting a new one");
            }
            Some(existing) if !existing.matches_request(&request) => {
                tracing::info!(user, "Search settings changed, discarding previous progress");
            }
            Some(existing) => {
                tracing::info!(
                    user,
                    done = existing.terminal_cells(),
                    total = existing.total_cells(),
                    "Resuming previous run"
                );
                return Ok((existing, true));
            }
            None => {}
        }

        self.progress.clear_progress(user)?;
        Ok((CrawlProgress::new(user, request), false))
    }
}
