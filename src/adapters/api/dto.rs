use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::domain::*;

// Response DTOs
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDto {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub status: TaskStatus,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskListDto {
    pub todos: Vec<TaskDto>,
    pub total: u32,
    pub current_page: u32,
    pub total_pages: u32,
    #[serde(default)]
    pub stats: Option<StatsDto>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsDto {
    pub total: u32,
    pub completed: u32,
    pub in_progress: u32,
    pub not_started: u32,
    // Not read: TaskStats recomputes progress from the counts
    #[serde(default)]
    pub progress: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct StatusChangeDto {
    pub todo: TaskDto,
    pub stats: StatsDto,
}

#[derive(Debug, Deserialize)]
pub struct MessageDto {
    #[serde(default)]
    pub message: String,
}

/// Error bodies are not guaranteed; when JSON, either field may carry the reason.
#[derive(Debug, Deserialize)]
pub struct ErrorBodyDto {
    pub message: Option<String>,
    pub error: Option<String>,
}

impl ErrorBodyDto {
    pub fn into_message(self) -> Option<String> {
        self.message
            .or(self.error)
            .filter(|m| !m.trim().is_empty())
    }
}

// Request DTOs
#[derive(Debug, Serialize)]
pub struct TaskCreateDto {
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
}

#[derive(Debug, Serialize)]
pub struct TaskUpdateDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatusUpdateDto {
    pub status: TaskStatus,
}

fn parse_timestamp(value: Option<String>) -> Option<DateTime<Utc>> {
    value
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

// Conversion implementations
impl From<TaskDto> for Task {
    fn from(dto: TaskDto) -> Self {
        let created_at = parse_timestamp(dto.created_at);
        let updated_at = match (created_at, parse_timestamp(dto.updated_at)) {
            // Never let the last update precede creation
            (Some(created), Some(updated)) => Some(updated.max(created)),
            (_, updated) => updated,
        };

        Self {
            id: TaskId(dto.id),
            title: dto.title,
            description: dto.description.unwrap_or_default(),
            status: dto.status,
            created_at,
            updated_at,
        }
    }
}

impl From<StatsDto> for TaskStats {
    fn from(dto: StatsDto) -> Self {
        TaskStats::new(dto.total, dto.completed, dto.in_progress, dto.not_started)
    }
}

impl From<&TaskDraft> for TaskCreateDto {
    fn from(draft: &TaskDraft) -> Self {
        Self {
            title: draft.title().to_string(),
            description: draft.description().to_string(),
            status: draft.status(),
        }
    }
}

impl From<TaskUpdate> for TaskUpdateDto {
    fn from(update: TaskUpdate) -> Self {
        Self {
            title: update.title.map(|t| t.trim().to_string()),
            description: update.description,
        }
    }
}
