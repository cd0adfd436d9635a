//! The per-user crawl state machine
//!
//! A [`CrawlRun`] owns one user's [`CrawlProgress`] for the lifetime of the
//! run and walks it city → strategy → age → page. The cursor is persisted
//! after every page and at every dimension boundary.

use crate::api::{Directory, PageQuery};
use crate::crawler::{CrawlSettings, RunOutcome, RunSummary};
use crate::matcher;
use crate::state::{CrawlProgress, GenderStrategy, RunStatus};
use crate::storage::{FoundProfile, ProgressStore, ResultSink, SearchControl};
use crate::Result;

/// Whether the walk should keep going
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Cancelled,
}

/// Borrowed collaborators of one run
pub(crate) struct Collaborators<'a> {
    pub directory: &'a dyn Directory,
    pub progress: &'a dyn ProgressStore,
    pub sink: &'a dyn ResultSink,
    pub control: &'a dyn SearchControl,
}

pub(crate) struct CrawlRun<'a> {
    user: String,
    cursor: CrawlProgress,
    keywords: Vec<String>,
    with: Collaborators<'a>,
    settings: &'a CrawlSettings,
    summary: RunSummary,
}

impl<'a> CrawlRun<'a> {
    pub fn new(
        cursor: CrawlProgress,
        with: Collaborators<'a>,
        settings: &'a CrawlSettings,
        resumed: bool,
    ) -> Self {
        let user = cursor.user.clone();
        let keywords = cursor.request.keywords_lowercased();
        Self {
            summary: RunSummary::new(&user, resumed),
            user,
            cursor,
            keywords,
            with,
            settings,
        }
    }

    /// Walks every remaining cell until done or cancelled
    pub async fn run(mut self) -> Result<RunSummary> {
        let cities = self.cursor.request.cities().to_vec();

        for (index, city) in cities.iter().enumerate() {
            if self.cursor.city(city).map_or(true, |c| c.completed) {
                tracing::debug!(user = %self.user, city = %city, "City already completed");
                continue;
            }

            if self.walk_city(city).await? == Flow::Cancelled {
                return self.stop();
            }

            if index + 1 < cities.len() {
                self.settings.delays.between_cities.wait().await;
            }
        }

        self.cursor.status = RunStatus::Completed;
        self.persist()?;
        self.with.control.set_searching(&self.user, false)?;

        self.summary.outcome = RunOutcome::Completed;
        tracing::info!(
            user = %self.user,
            pages = self.summary.pages_fetched,
            found = self.summary.profiles_found,
            "Crawl completed"
        );
        Ok(self.summary)
    }

    fn stop(mut self) -> Result<RunSummary> {
        self.cursor.status = RunStatus::Stopped;
        self.persist()?;

        self.summary.outcome = RunOutcome::Cancelled;
        tracing::info!(
            user = %self.user,
            done = self.cursor.terminal_cells(),
            total = self.cursor.total_cells(),
            "Crawl stopped, progress kept for resume"
        );
        Ok(self.summary)
    }

    fn persist(&mut self) -> Result<()> {
        self.cursor.touch();
        self.with.progress.save_progress(&self.user, &self.cursor)?;
        Ok(())
    }

    fn cancelled(&self) -> Result<bool> {
        Ok(!self.with.control.is_still_searching(&self.user)?)
    }

    async fn walk_city(&mut self, city: &str) -> Result<Flow> {
        if self.cancelled()? {
            return Ok(Flow::Cancelled);
        }

        let known_place = self.cursor.city(city).and_then(|c| c.place_id);

        let place_id = match known_place {
            Some(id) => id,
            None => match self.resolve(city).await? {
                Some(id) => id,
                None => return Ok(Flow::Continue),
            },
        };

        tracing::info!(user = %self.user, city, place_id, "Searching city");

        for (index, strategy) in GenderStrategy::ORDER.iter().copied().enumerate() {
            let already_done = self
                .cursor
                .strategy_mut(city, strategy)
                .map_or(true, |s| s.completed);
            if already_done {
                continue;
            }

            if self.walk_strategy(city, place_id, strategy).await? == Flow::Cancelled {
                return Ok(Flow::Cancelled);
            }

            if index + 1 < GenderStrategy::ORDER.len() {
                self.settings.delays.between_strategies.wait().await;
            }
        }

        if let Some(progress) = self.cursor.city_mut(city) {
            progress.refresh_completed();
        }
        self.persist()?;

        tracing::info!(
            user = %self.user,
            city,
            found = self.cursor.city(city).map_or(0, |c| c.total_found),
            "City finished"
        );
        Ok(Flow::Continue)
    }

    /// Resolves and records a place id; unknown places finish the city
    async fn resolve(&mut self, city: &str) -> Result<Option<i64>> {
        let resolved = match self.with.directory.resolve_place(city).await {
            Ok(resolved) => resolved,
            Err(e) => {
                tracing::error!(user = %self.user, city, "Place resolution failed: {}", e);
                None
            }
        };

        let Some(progress) = self.cursor.city_mut(city) else {
            return Ok(None);
        };

        match resolved {
            Some(id) => progress.place_id = Some(id),
            None => {
                tracing::warn!(user = %self.user, city, "Place not resolved, marking city completed");
                progress.mark_unresolved();
            }
        }
        self.persist()?;

        Ok(resolved)
    }

    async fn walk_strategy(
        &mut self,
        city: &str,
        place_id: i64,
        strategy: GenderStrategy,
    ) -> Result<Flow> {
        if self.cancelled()? {
            return Ok(Flow::Cancelled);
        }

        let age_from = self.cursor.request.age_from();
        let age_to = self.cursor.request.age_to();

        let start_age = match self.cursor.strategy_mut(city, strategy) {
            Some(progress) => progress.current_age.clamp(age_from, age_to),
            None => return Ok(Flow::Continue),
        };

        tracing::info!(user = %self.user, city, strategy = %strategy, start_age, "Walking strategy");

        for age in start_age..=age_to {
            if self.cancelled()? {
                return Ok(Flow::Cancelled);
            }

            if let Some(progress) = self.cursor.strategy_mut(city, strategy) {
                if progress.current_age != age {
                    progress.current_age = age;
                    self.persist()?;
                }
            }

            if self.walk_cell(city, place_id, strategy, age).await? == Flow::Cancelled {
                return Ok(Flow::Cancelled);
            }

            if age < age_to {
                self.settings.delays.between_ages.wait().await;
            }
        }

        if let Some(progress) = self.cursor.strategy_mut(city, strategy) {
            progress.completed = true;
        }
        if let Some(progress) = self.cursor.city_mut(city) {
            progress.refresh_completed();
        }
        self.persist()?;

        Ok(Flow::Continue)
    }

    async fn walk_cell(
        &mut self,
        city: &str,
        place_id: i64,
        strategy: GenderStrategy,
        age: u8,
    ) -> Result<Flow> {
        loop {
            let offset = match self.cursor.cell_mut(city, strategy, age) {
                None => return Ok(Flow::Continue),
                Some(cell) if cell.state().is_terminal() => return Ok(Flow::Continue),
                Some(cell) if cell.offset >= self.settings.max_offset => {
                    cell.complete();
                    self.persist()?;
                    return Ok(Flow::Continue);
                }
                Some(cell) => cell.offset,
            };

            if self.cancelled()? {
                return Ok(Flow::Cancelled);
            }

            self.settings.delays.request.wait().await;

            let query = PageQuery {
                place_id,
                age,
                strategy,
                offset,
                page_size: self.settings.page_size,
            };
            let result = self.with.directory.search_page(&query).await;
            self.summary.pages_fetched += 1;

            let page = match result {
                Ok(page) => page,
                Err(e) => {
                    tracing::error!(
                        user = %self.user,
                        city,
                        strategy = %strategy,
                        age,
                        offset,
                        "Page failed, abandoning cell: {}",
                        e
                    );
                    if let Some(cell) = self.cursor.cell_mut(city, strategy, age) {
                        cell.complete();
                    }
                    self.persist()?;
                    return Ok(Flow::Continue);
                }
            };

            if page.min_population_rejected {
                tracing::info!(
                    user = %self.user,
                    city,
                    strategy = %strategy,
                    age,
                    population = page.total_count,
                    "Population below minimum, skipping cell"
                );
                if let Some(cell) = self.cursor.cell_mut(city, strategy, age) {
                    if offset == 0 {
                        cell.skip();
                    } else {
                        cell.complete();
                    }
                }
                self.persist()?;
                return Ok(Flow::Continue);
            }

            let returned = page.items.len();
            let (checked, found) = self
                .process_candidates(&page.items, city, place_id, strategy, age)
                .await?;

            let max_offset = self.settings.max_offset;
            let done = match self.cursor.cell_mut(city, strategy, age) {
                Some(cell) => {
                    cell.record_page(u32::try_from(returned).unwrap_or(u32::MAX), checked, found);
                    if !page.has_more || returned == 0 || cell.offset >= max_offset {
                        cell.complete();
                    }
                    cell.completed
                }
                None => true,
            };
            if let Some(progress) = self.cursor.city_mut(city) {
                progress.total_found += found;
            }
            self.persist()?;

            tracing::info!(
                user = %self.user,
                city,
                strategy = %strategy,
                age,
                offset,
                returned,
                checked,
                found,
                total = page.total_count,
                "Page processed"
            );

            if done {
                return Ok(Flow::Continue);
            }
            self.settings.delays.between_pages.wait().await;
        }
    }

    /// Matches one page of candidates and delivers hits to the sink
    async fn process_candidates(
        &mut self,
        items: &[crate::api::CandidateProfile],
        city: &str,
        place_id: i64,
        strategy: GenderStrategy,
        age: u8,
    ) -> Result<(u64, u64)> {
        let mut checked = 0u64;
        let mut found = 0u64;

        for candidate in items {
            if !matcher::is_eligible(candidate) {
                continue;
            }
            checked += 1;

            let activity = if self.cursor.request.check_recent_activity() {
                self.settings.delays.recent_activity.wait().await;
                Some(self.with.directory.fetch_recent_activity(candidate.id).await)
            } else {
                None
            };

            let hits = matcher::evaluate(candidate, &self.keywords, activity.as_deref());
            if hits.is_empty() {
                continue;
            }
            found += 1;

            let profile = FoundProfile::from_candidate(
                candidate,
                hits,
                &self.settings.profile_url_prefix,
                city,
                place_id,
                age,
                strategy,
            );

            if self.with.sink.on_found(&self.user, &profile)? {
                self.summary.profiles_found += 1;
                tracing::info!(
                    user = %self.user,
                    profile = profile.profile_id,
                    hits = profile.hits.len(),
                    "Found {}",
                    profile.profile_url
                );
            } else {
                tracing::debug!(user = %self.user, profile = profile.profile_id, "Already recorded");
            }

            self.settings.delays.found_profile.wait().await;
        }

        self.summary.profiles_checked += checked;
        Ok((checked, found))
    }
}
