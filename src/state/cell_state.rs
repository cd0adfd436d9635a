/// Cell and strategy state definitions for tracking crawl progress
///
/// A cell is one (city, strategy, age) slice of the search space.
use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents the current state of an age cell in the crawl process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellState {
    // ===== Active States =====
    /// No page has been requested yet
    Pending,

    /// At least one page was processed and more remain
    InProgress,

    // ===== Terminal States =====
    /// Every reachable page was processed, or the cell was abandoned after a failure
    Completed,

    /// The place population was below the configured minimum; nothing was paginated
    Skipped,
}

impl CellState {
    /// Returns true if this is a terminal state (no further processing needed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Skipped)
    }

    /// Returns true if this is an active state (cell may still be processed)
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Skipped => "skipped",
        }
    }
}

impl fmt::Display for CellState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Search dimension selecting which subpopulation is queried
///
/// Strategies are always walked in [`GenderStrategy::ORDER`]: primary first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenderStrategy {
    Primary,
    Secondary,
}

impl GenderStrategy {
    /// Fixed walk order
    pub const ORDER: [GenderStrategy; 2] = [GenderStrategy::Primary, GenderStrategy::Secondary];

    /// Value sent as the directory's `sex` search parameter
    pub fn sex_code(&self) -> u8 {
        match self {
            Self::Primary => 1,
            Self::Secondary => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "primary" => Some(Self::Primary),
            "secondary" => Some(Self::Secondary),
            _ => None,
        }
    }
}

impl fmt::Display for GenderStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle of a whole persisted run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Searching,
    Stopped,
    Completed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Searching => "searching",
            Self::Stopped => "stopped",
            Self::Completed => "completed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "searching" => Some(Self::Searching),
            "stopped" => Some(Self::Stopped),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}
