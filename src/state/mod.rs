//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `SearchRequest`: the validated, immutable input of one crawl
//! - `CrawlProgress`: the resumable cursor (city → strategy → age cells)
//! - `CellState`: the lifecycle of one age cell
//! - `GenderStrategy`: the ordered strategy dimension

mod cell_state;
mod progress;
mod request;

// Re-export main types
pub use cell_state::{CellState, GenderStrategy, RunStatus};
pub use progress::{AgeCell, CityProgress, CrawlProgress, StrategyProgress};
pub use request::{SearchRequest, MAX_AGE, MIN_AGE};
