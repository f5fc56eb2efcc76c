use std::sync::Arc;
use tokio::sync::RwLock;

use super::AppResult;
use crate::domain::*;
use crate::ports::{ListQuery, TaskApi, TaskPage};

/// Parameters for a fetch. Omitted fields keep their last-used value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListParams {
    pub status: Option<StatusFilter>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl ListParams {
    pub fn page(page: u32) -> Self {
        Self {
            page: Some(page),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ActiveParams {
    filter: StatusFilter,
    page: u32,
    limit: u32,
}

impl ActiveParams {
    fn merge(&self, params: &ListParams) -> Self {
        Self {
            filter: params.status.unwrap_or(self.filter),
            page: params.page.unwrap_or(self.page).max(1),
            limit: params.limit.unwrap_or(self.limit).max(1),
        }
    }

    fn to_query(self) -> ListQuery {
        ListQuery {
            status: self.filter.status(),
            page: Some(self.page),
            limit: Some(self.limit),
        }
    }
}

/// What a view renders from. Cloned out of the store, never mutated by views.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreSnapshot {
    pub tasks: Vec<Task>,
    pub filter: StatusFilter,
    pub pagination: PaginationState,
    pub stats: TaskStats,
    pub loading: bool,
    pub error: Option<String>,
}

impl StoreSnapshot {
    pub fn board(&self) -> KanbanBoard {
        KanbanBoard::from_tasks(&self.tasks)
    }

    pub fn task(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| &t.id == id)
    }
}

struct StoreState {
    tasks: Vec<Task>,
    params: ActiveParams,
    pagination: PaginationState,
    stats: TaskStats,
    loading: bool,
    error: Option<String>,
}

impl StoreState {
    fn apply_page(&mut self, page: TaskPage, limit: u32) {
        self.pagination =
            PaginationState::from_server(page.current_page, page.total_pages, page.total, limit);
        self.params.page = self.pagination.page;
        self.stats = page
            .stats
            .unwrap_or_else(|| TaskStats::from_tasks(&page.tasks));
        self.tasks = page.tasks;
    }
}

/// Owns one page of tasks plus the filter, pagination and status flags around it.
///
/// Every mutation goes through the backend. Creates, edits and deletes re-fetch the
/// current page afterwards; status changes patch the affected task in place and take
/// the backend's aggregate stats. A status change can therefore leave a task visible
/// under a filter it no longer matches until the next fetch.
///
/// Calls are not serialized: two overlapping mutations of the same task apply in
/// response order. Callers keep one request per task in flight.
pub struct TaskListStore {
    api: Arc<dyn TaskApi>,
    state: RwLock<StoreState>,
}

impl TaskListStore {
    pub fn new(api: Arc<dyn TaskApi>, page_size: u32) -> Self {
        let limit = page_size.max(1);
        Self {
            api,
            state: RwLock::new(StoreState {
                tasks: Vec::new(),
                params: ActiveParams {
                    filter: StatusFilter::All,
                    page: 1,
                    limit,
                },
                pagination: PaginationState {
                    limit,
                    ..Default::default()
                },
                stats: TaskStats::default(),
                loading: false,
                error: None,
            }),
        }
    }

    pub async fn snapshot(&self) -> StoreSnapshot {
        let state = self.state.read().await;
        StoreSnapshot {
            tasks: state.tasks.clone(),
            filter: state.params.filter,
            pagination: state.pagination,
            stats: state.stats,
            loading: state.loading,
            error: state.error.clone(),
        }
    }

    /// Load a page from the backend. Failures land in the snapshot's `error`
    /// and leave the current tasks on screen.
    pub async fn fetch(&self, params: ListParams) {
        let active = {
            let mut state = self.state.write().await;
            state.params = state.params.merge(&params);
            state.loading = true;
            state.error = None;
            state.params
        };

        tracing::debug!(
            "Fetching tasks: filter={} page={} limit={}",
            active.filter,
            active.page,
            active.limit
        );

        let mut requested = active;
        let mut result = self.api.list_tasks(&requested.to_query()).await;

        // A page past the end (e.g. after deleting the last task on the last page)
        // is replaced by the backend's last page.
        if let Ok(page) = &result {
            if PaginationState::overshoots(page.current_page, page.total_pages) {
                requested.page = page.total_pages.max(1);
                tracing::debug!(
                    "Page {} is past the end, loading page {}",
                    page.current_page,
                    requested.page
                );
                result = self.api.list_tasks(&requested.to_query()).await;
            }
        }

        let mut state = self.state.write().await;
        match result {
            Ok(page) => state.apply_page(page, requested.limit),
            Err(e) => {
                tracing::warn!("Failed to fetch tasks: {}", e);
                state.error = Some(e.to_string());
            }
        }
        state.loading = false;
    }

    pub async fn refresh(&self) {
        self.fetch(ListParams::default()).await;
    }

    pub async fn change_page(&self, page: u32) {
        self.fetch(ListParams::page(page)).await;
    }

    /// Switch the status filter. Always starts again from the first page.
    pub async fn set_filter(&self, filter: StatusFilter) {
        self.fetch(ListParams {
            status: Some(filter),
            page: Some(1),
            limit: None,
        })
        .await;
    }

    pub async fn set_limit(&self, limit: u32) {
        self.fetch(ListParams {
            status: None,
            page: Some(1),
            limit: Some(limit),
        })
        .await;
    }

    /// Create a task and reload the current page so it appears where the backend puts it.
    ///
    /// An empty title is rejected before any request is made.
    pub async fn add_task(&self, title: &str, description: &str) -> AppResult<()> {
        let draft = TaskDraft::new(title, description)?;

        self.state.write().await.error = None;

        match self.api.create_task(&draft).await {
            Ok(task) => {
                tracing::info!("Created task {} ({})", task.id, task.title);
                self.refresh().await;
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Failed to create task: {}", e);
                self.state.write().await.error = Some(e.to_string());
                Err(e.into())
            }
        }
    }

    /// Change a task's title and/or description, then reload the current page.
    pub async fn update_task(&self, id: &TaskId, update: TaskUpdate) -> AppResult<()> {
        update.validate()?;

        let task = self.api.update_task(id, &update).await?;
        tracing::info!("Updated task {}", task.id);

        self.refresh().await;
        Ok(())
    }

    /// Move a task to another status. Only the matching task and the stats change locally.
    pub async fn update_status(&self, id: &TaskId, status: TaskStatus) -> AppResult<Task> {
        self.state.write().await.error = None;

        match self.api.update_status(id, status).await {
            Ok(change) => {
                tracing::info!("Task {} is now {}", id, change.task.status);

                let mut state = self.state.write().await;
                if let Some(slot) = state.tasks.iter_mut().find(|t| &t.id == id) {
                    *slot = change.task.clone();
                }
                state.stats = change.stats;
                Ok(change.task)
            }
            Err(e) => {
                tracing::warn!("Failed to update status of task {}: {}", id, e);
                self.state.write().await.error = Some(format!("Failed to update task status: {e}"));
                Err(e.into())
            }
        }
    }

    /// Delete a task and reload the current page. The page number is left to the backend.
    pub async fn delete_task(&self, id: &TaskId) -> AppResult<()> {
        let message = self.api.delete_task(id).await?;
        tracing::info!("Deleted task {}: {}", id, message);

        self.refresh().await;
        Ok(())
    }

    pub async fn clear_error(&self) {
        self.state.write().await.error = None;
    }
}
