//! The resumable crawl cursor
//!
//! Serialized as flat JSON keyed city name → strategy → age so an operator can
//! read it, or hand-edit it to un-stick a stalled run.

use crate::state::cell_state::{CellState, GenderStrategy, RunStatus};
use crate::state::request::SearchRequest;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Progress of one (city, strategy, age) cell
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeCell {
    /// Next page offset; never decreases
    pub offset: u32,
    pub found: u64,
    pub checked: u64,
    /// Sticky: a completed cell is never requested again
    pub completed: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub skipped: bool,
}

impl AgeCell {
    pub fn state(&self) -> CellState {
        match (self.completed, self.skipped) {
            (true, true) => CellState::Skipped,
            (true, false) => CellState::Completed,
            _ if self.offset > 0 || self.checked > 0 => CellState::InProgress,
            _ => CellState::Pending,
        }
    }

    /// Records one processed page
    pub fn record_page(&mut self, returned: u32, checked: u64, found: u64) {
        self.offset = self.offset.saturating_add(returned);
        self.checked += checked;
        self.found += found;
    }

    pub fn complete(&mut self) {
        self.completed = true;
    }

    pub fn skip(&mut self) {
        self.completed = true;
        self.skipped = true;
    }
}

/// Progress of one strategy inside a city
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyProgress {
    /// Age the walk resumes from
    pub current_age: u8,
    pub completed: bool,
    pub ages: BTreeMap<u8, AgeCell>,
}

impl StrategyProgress {
    fn new(request: &SearchRequest) -> Self {
        Self {
            current_age: request.age_from(),
            completed: false,
            ages: request.ages().map(|age| (age, AgeCell::default())).collect(),
        }
    }

    /// True when every age cell reached a terminal state
    pub fn all_cells_terminal(&self) -> bool {
        self.ages.values().all(|cell| cell.state().is_terminal())
    }
}

/// Progress of one city
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityProgress {
    /// Resolved place id; `None` until resolved, and forever for unknown places
    pub place_id: Option<i64>,
    pub total_found: u64,
    pub completed: bool,
    pub strategies: BTreeMap<GenderStrategy, StrategyProgress>,
}

impl CityProgress {
    fn new(request: &SearchRequest) -> Self {
        Self {
            place_id: None,
            total_found: 0,
            completed: false,
            strategies: GenderStrategy::ORDER
                .iter()
                .map(|s| (*s, StrategyProgress::new(request)))
                .collect(),
        }
    }

    /// Marks the whole city finished without searching it
    pub fn mark_unresolved(&mut self) {
        for strategy in self.strategies.values_mut() {
            for cell in strategy.ages.values_mut() {
                cell.complete();
            }
            strategy.completed = true;
        }
        self.completed = true;
    }

    /// Recomputes `completed` from the strategies
    pub fn refresh_completed(&mut self) {
        self.completed = self.strategies.values().all(|s| s.completed);
    }
}

/// Cursor of a whole crawl, owned by one crawl task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlProgress {
    pub user: String,
    pub status: RunStatus,
    pub request: SearchRequest,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub cities: BTreeMap<String, CityProgress>,
}

impl CrawlProgress {
    /// Creates a fresh cursor with every cell pending
    pub fn new(user: &str, request: SearchRequest) -> Self {
        let now = Utc::now();
        let cities = request
            .cities()
            .iter()
            .map(|name| (name.clone(), CityProgress::new(&request)))
            .collect();

        Self {
            user: user.to_string(),
            status: RunStatus::Searching,
            request,
            started_at: now,
            updated_at: now,
            cities,
        }
    }

    /// Whether this cursor was produced by the same request
    ///
    /// Also checks that every city and cell the request implies is present,
    /// so a hand-edited cursor cannot silently drop part of the search.
    pub fn matches_request(&self, request: &SearchRequest) -> bool {
        if &self.request != request {
            return false;
        }
        request.cities().iter().all(|name| {
            self.cities.get(name).is_some_and(|city| {
                GenderStrategy::ORDER.iter().all(|s| {
                    city.strategies
                        .get(s)
                        .is_some_and(|sp| request.ages().all(|age| sp.ages.contains_key(&age)))
                })
            })
        })
    }

    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }

    pub fn city(&self, name: &str) -> Option<&CityProgress> {
        self.cities.get(name)
    }

    pub fn city_mut(&mut self, name: &str) -> Option<&mut CityProgress> {
        self.cities.get_mut(name)
    }

    pub fn strategy_mut(
        &mut self,
        city: &str,
        strategy: GenderStrategy,
    ) -> Option<&mut StrategyProgress> {
        self.cities.get_mut(city)?.strategies.get_mut(&strategy)
    }

    pub fn cell(&self, city: &str, strategy: GenderStrategy, age: u8) -> Option<&AgeCell> {
        self.cities.get(city)?.strategies.get(&strategy)?.ages.get(&age)
    }

    pub fn cell_mut(
        &mut self,
        city: &str,
        strategy: GenderStrategy,
        age: u8,
    ) -> Option<&mut AgeCell> {
        self.strategy_mut(city, strategy)?.ages.get_mut(&age)
    }

    /// Total number of age cells
    pub fn total_cells(&self) -> usize {
        self.cities
            .values()
            .flat_map(|c| c.strategies.values())
            .map(|s| s.ages.len())
            .sum()
    }

    /// Number of age cells in a terminal state
    pub fn terminal_cells(&self) -> usize {
        self.cities
            .values()
            .flat_map(|c| c.strategies.values())
            .flat_map(|s| s.ages.values())
            .filter(|cell| cell.state().is_terminal())
            .count()
    }

    pub fn total_found(&self) -> u64 {
        self.cities.values().map(|c| c.total_found).sum()
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
