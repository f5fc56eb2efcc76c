use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{Task, TaskStatus, ValidationError};

/// Which slice of the collection is on screen: everything, or one status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "status")]
pub enum StatusFilter {
    #[default]
    All,
    Only(TaskStatus),
}

impl StatusFilter {
    pub fn status(&self) -> Option<TaskStatus> {
        match self {
            StatusFilter::All => None,
            StatusFilter::Only(status) => Some(*status),
        }
    }

    pub fn matches(&self, task: &Task) -> bool {
        self.status().map_or(true, |status| task.status == status)
    }

    /// Cycle order used by the filter bar: All, then each status in board order.
    pub fn next(&self) -> StatusFilter {
        match self {
            StatusFilter::All => StatusFilter::Only(TaskStatus::NotStarted),
            StatusFilter::Only(TaskStatus::NotStarted) => StatusFilter::Only(TaskStatus::InProgress),
            StatusFilter::Only(TaskStatus::InProgress) => StatusFilter::Only(TaskStatus::Completed),
            StatusFilter::Only(TaskStatus::Completed) => StatusFilter::All,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StatusFilter::All => "All Tasks",
            StatusFilter::Only(status) => status.label(),
        }
    }
}

impl From<TaskStatus> for StatusFilter {
    fn from(status: TaskStatus) -> Self {
        StatusFilter::Only(status)
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for StatusFilter {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(StatusFilter::All);
        }
        s.parse::<TaskStatus>()
            .map(StatusFilter::Only)
            .map_err(|_| ValidationError::InvalidFilter(s.to_string()))
    }
}
