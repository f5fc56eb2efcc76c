use async_trait::async_trait;

use super::{
    ApiClient, MessageDto, StatusChangeDto, StatusUpdateDto, TaskCreateDto, TaskDto, TaskListDto,
    TaskUpdateDto,
};
use crate::{
    domain::{Task, TaskDraft, TaskId, TaskStatus, TaskUpdate},
    ports::{ApiResult, ListQuery, StatusChange, TaskApi, TaskPage},
};

/// `TaskApi` over the REST backend.
#[derive(Clone)]
pub struct HttpTaskApi {
    client: ApiClient,
}

impl HttpTaskApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    fn build_list_query_params(&self, query: &ListQuery) -> Vec<(String, String)> {
        let mut params = Vec::new();

        if let Some(status) = query.status {
            params.push(("status".to_string(), status.as_str().to_string()));
        }

        if let Some(page) = query.page {
            params.push(("page".to_string(), page.to_string()));
        }

        if let Some(limit) = query.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }

        params
    }

    fn build_query_string(&self, params: &[(String, String)]) -> String {
        if params.is_empty() {
            return String::new();
        }

        format!(
            "?{}",
            params
                .iter()
                .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
                .collect::<Vec<_>>()
                .join("&")
        )
    }

    fn task_path(id: &TaskId) -> String {
        format!("/tasks/{}", urlencoding::encode(&id.0))
    }
}

#[async_trait]
impl TaskApi for HttpTaskApi {
    async fn list_tasks(&self, query: &ListQuery) -> ApiResult<TaskPage> {
        let params = self.build_list_query_params(query);
        let query_string = self.build_query_string(&params);
        let path = format!("/tasks{query_string}");

        let list: TaskListDto = self.client.get(&path).await?;
        Ok(TaskPage {
            tasks: list.todos.into_iter().map(|dto| dto.into()).collect(),
            total: list.total,
            current_page: list.current_page,
            total_pages: list.total_pages,
            stats: list.stats.map(|dto| dto.into()),
        })
    }

    async fn create_task(&self, draft: &TaskDraft) -> ApiResult<Task> {
        let create_dto = TaskCreateDto::from(draft);

        let task_dto: TaskDto = self.client.post("/tasks", &create_dto).await?;
        Ok(task_dto.into())
    }

    async fn update_task(&self, id: &TaskId, update: &TaskUpdate) -> ApiResult<Task> {
        let path = Self::task_path(id);
        let update_dto: TaskUpdateDto = update.clone().into();

        let task_dto: TaskDto = self.client.put(&path, &update_dto).await?;
        Ok(task_dto.into())
    }

    async fn update_status(&self, id: &TaskId, status: TaskStatus) -> ApiResult<StatusChange> {
        let path = format!("{}/status", Self::task_path(id));

        let change: StatusChangeDto = self.client.patch(&path, &StatusUpdateDto { status }).await?;
        Ok(StatusChange {
            task: change.todo.into(),
            stats: change.stats.into(),
        })
    }

    async fn delete_task(&self, id: &TaskId) -> ApiResult<String> {
        let path = Self::task_path(id);

        let response: MessageDto = self.client.delete(&path).await?;
        Ok(response.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn api() -> HttpTaskApi {
        HttpTaskApi::new(ApiClient::new("http://localhost:5000/api/", Duration::from_secs(1)).unwrap())
    }

    #[test]
    fn test_query_string_omits_missing_params() {
        let api = api();
        let params = api.build_list_query_params(&ListQuery::default());
        assert_eq!(api.build_query_string(&params), "");
    }

    #[test]
    fn test_query_string_with_all_params() {
        let api = api();
        let params = api.build_list_query_params(&ListQuery {
            status: Some(TaskStatus::InProgress),
            page: Some(2),
            limit: Some(10),
        });
        assert_eq!(
            api.build_query_string(&params),
            "?status=in_progress&page=2&limit=10"
        );
    }

    #[test]
    fn test_task_path_encodes_id() {
        assert_eq!(HttpTaskApi::task_path(&TaskId::from("a b/c")), "/tasks/a%20b%2Fc");
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = ApiClient::new("http://localhost:5000/api/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url(), "http://localhost:5000/api");
    }
}
