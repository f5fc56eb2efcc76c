use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{Task, TaskDraft, TaskId, TaskStats, TaskStatus, TaskUpdate};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The backend answered with a non-2xx status.
    #[error("{message}")]
    Request { status: u16, message: String },

    /// No response at all: DNS, connection refused, timeout.
    #[error("Network error occurred: {0}")]
    Network(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ApiError {
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ApiError::Request { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Query for one page of the collection. `None` fields are left to the backend's defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub status: Option<TaskStatus>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// One page of tasks as reported by the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskPage {
    pub tasks: Vec<Task>,
    pub total: u32,
    pub current_page: u32,
    pub total_pages: u32,
    pub stats: Option<TaskStats>,
}

/// Result of a status change: the updated task plus the backend's fresh aggregate.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusChange {
    pub task: Task,
    pub stats: TaskStats,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TaskApi: Send + Sync {
    async fn list_tasks(&self, query: &ListQuery) -> ApiResult<TaskPage>;
    async fn create_task(&self, draft: &TaskDraft) -> ApiResult<Task>;
    async fn update_task(&self, id: &TaskId, update: &TaskUpdate) -> ApiResult<Task>;
    async fn update_status(&self, id: &TaskId, status: TaskStatus) -> ApiResult<StatusChange>;
    /// Returns the backend's confirmation message.
    async fn delete_task(&self, id: &TaskId) -> ApiResult<String>;
}
