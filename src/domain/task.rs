use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{ValidationError, ValidationResult};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub String);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        TaskId(s)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        TaskId(s.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl TaskStatus {
    /// Board order, left to right.
    pub const ALL: [TaskStatus; 3] = [
        TaskStatus::NotStarted,
        TaskStatus::InProgress,
        TaskStatus::Completed,
    ];

    /// Value used on the wire and in query strings
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::NotStarted => "not_started",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TaskStatus::NotStarted => "Not Started",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::Completed => "Completed",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            TaskStatus::NotStarted => "○",
            TaskStatus::InProgress => "◐",
            TaskStatus::Completed => "●",
        }
    }

    /// Status a task moves to when advanced one step on the board.
    pub fn next(&self) -> TaskStatus {
        match self {
            TaskStatus::NotStarted => TaskStatus::InProgress,
            TaskStatus::InProgress => TaskStatus::Completed,
            TaskStatus::Completed => TaskStatus::NotStarted,
        }
    }

    pub fn column_index(&self) -> usize {
        match self {
            TaskStatus::NotStarted => 0,
            TaskStatus::InProgress => 1,
            TaskStatus::Completed => 2,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TaskStatus {
    type Err = ValidationError;

    /// Accepts wire values ("in_progress") and labels ("In Progress"), ignoring case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "not_started" | "todo" => Ok(TaskStatus::NotStarted),
            "in_progress" | "doing" => Ok(TaskStatus::InProgress),
            "completed" | "done" => Ok(TaskStatus::Completed),
            _ => Err(ValidationError::InvalidStatus(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    /// Format the time since the last update for display
    pub fn time_since_updated(&self) -> String {
        let Some(updated) = self.updated_at.or(self.created_at) else {
            return "-".to_string();
        };

        let duration = Utc::now().signed_duration_since(updated);

        if duration.num_days() > 0 {
            format!("{} days ago", duration.num_days())
        } else if duration.num_hours() > 0 {
            format!("{} hours ago", duration.num_hours())
        } else if duration.num_minutes() > 0 {
            format!("{} minutes ago", duration.num_minutes())
        } else {
            "Just now".to_string()
        }
    }
}

/// Validated input for creating a task. New tasks always start as not started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDraft {
    title: String,
    description: String,
}

impl TaskDraft {
    pub fn new(title: &str, description: &str) -> ValidationResult<Self> {
        let title = title.trim();
        if title.is_empty() {
            return Err(ValidationError::EmptyTitle);
        }

        Ok(Self {
            title: title.to_string(),
            description: description.trim().to_string(),
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn status(&self) -> TaskStatus {
        TaskStatus::NotStarted
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
}

impl TaskUpdate {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    pub fn description(description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            ..Default::default()
        }
    }

    /// A title, when present, must survive trimming; at least one field must be set.
    pub fn validate(&self) -> ValidationResult<()> {
        if self.title.is_none() && self.description.is_none() {
            return Err(ValidationError::EmptyUpdate);
        }
        if let Some(title) = &self.title {
            if title.trim().is_empty() {
                return Err(ValidationError::EmptyTitle);
            }
        }
        Ok(())
    }
}
