use serde_json::json;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use taskboard::adapters::api::{ApiClient, HttpTaskApi};
use taskboard::domain::{TaskDraft, TaskId, TaskStatus, TaskUpdate};
use taskboard::ports::{ApiError, ListQuery, TaskApi};

fn api_for(server: &MockServer) -> HttpTaskApi {
    let client = ApiClient::new(&format!("{}/api", server.uri()), Duration::from_secs(5)).unwrap();
    HttpTaskApi::new(client)
}

fn task_json(id: &str, title: &str, status: &str) -> serde_json::Value {
    json!({
        "_id": id,
        "title": title,
        "description": "",
        "status": status,
        "createdAt": "2024-03-01T10:00:00.000Z",
        "updatedAt": "2024-03-02T10:00:00.000Z"
    })
}

#[tokio::test]
async fn test_list_sends_query_and_parses_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tasks"))
        .and(query_param("status", "in_progress"))
        .and(query_param("page", "2"))
        .and(query_param("limit", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "todos": [task_json("a1", "Write report", "in_progress")],
            "total": 25,
            "currentPage": 2,
            "totalPages": 3,
            "stats": {
                "total": 25,
                "completed": 10,
                "inProgress": 11,
                "notStarted": 4,
                "progress": 40
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let page = assert_ok!(
        api_for(&server)
            .list_tasks(&ListQuery {
                status: Some(TaskStatus::InProgress),
                page: Some(2),
                limit: Some(10),
            })
            .await
    );

    assert_eq!(page.tasks.len(), 1);
    assert_eq!(page.tasks[0].id, TaskId::from("a1"));
    assert_eq!(page.tasks[0].status, TaskStatus::InProgress);
    assert!(page.tasks[0].updated_at.is_some());
    assert_eq!(page.total, 25);
    assert_eq!(page.current_page, 2);
    assert_eq!(page.total_pages, 3);

    let stats = page.stats.unwrap();
    assert_eq!(stats.in_progress, 11);
    assert_eq!(stats.progress, 40);
}

#[tokio::test]
async fn test_list_without_stats() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tasks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "todos": [],
            "total": 0,
            "currentPage": 1,
            "totalPages": 0
        })))
        .mount(&server)
        .await;

    let page = assert_ok!(api_for(&server).list_tasks(&ListQuery::default()).await);
    assert!(page.tasks.is_empty());
    assert_eq!(page.stats, None);
}

#[tokio::test]
async fn test_create_posts_not_started_task() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/tasks"))
        .and(body_json(json!({
            "title": "Buy milk",
            "description": "2 litres",
            "status": "not_started"
        })))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(task_json("n1", "Buy milk", "not_started")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let draft = TaskDraft::new("  Buy milk ", "2 litres").unwrap();
    let task = assert_ok!(api_for(&server).create_task(&draft).await);

    assert_eq!(task.id, TaskId::from("n1"));
    assert_eq!(task.status, TaskStatus::NotStarted);
}

#[tokio::test]
async fn test_update_puts_only_given_fields() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/tasks/a1"))
        .and(body_json(json!({ "title": "Renamed" })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(task_json("a1", "Renamed", "not_started")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let task = assert_ok!(
        api_for(&server)
            .update_task(&TaskId::from("a1"), &TaskUpdate::title("Renamed"))
            .await
    );
    assert_eq!(task.title, "Renamed");
}

#[tokio::test]
async fn test_status_change_returns_task_and_stats() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/api/tasks/a1/status"))
        .and(body_json(json!({ "status": "completed" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "todo": task_json("a1", "Write report", "completed"),
            "stats": {
                "total": 3,
                "completed": 2,
                "inProgress": 0,
                "notStarted": 1,
                "progress": 66.67
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let change = assert_ok!(
        api_for(&server)
            .update_status(&TaskId::from("a1"), TaskStatus::Completed)
            .await
    );

    assert_eq!(change.task.status, TaskStatus::Completed);
    assert_eq!(change.stats.completed, 2);
    assert_eq!(change.stats.progress, 67);
}

#[tokio::test]
async fn test_delete_returns_message() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/tasks/a1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "message": "Task deleted successfully" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let message = assert_ok!(api_for(&server).delete_task(&TaskId::from("a1")).await);
    assert_eq!(message, "Task deleted successfully");
}

#[tokio::test]
async fn test_error_body_message_is_used() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/tasks"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({ "message": "Title is required" })),
        )
        .mount(&server)
        .await;

    let draft = TaskDraft::new("x", "").unwrap();
    let error = assert_err!(api_for(&server).create_task(&draft).await);

    assert_eq!(
        error,
        ApiError::Request {
            status: 400,
            message: "Title is required".to_string(),
        }
    );
    assert_eq!(error.to_string(), "Title is required");
}

#[tokio::test]
async fn test_error_without_body_uses_status() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/tasks/missing"))
        .respond_with(ResponseTemplate::new(500).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let error = assert_err!(api_for(&server).delete_task(&TaskId::from("missing")).await);

    assert_eq!(error.status_code(), Some(500));
    assert_eq!(error.to_string(), "HTTP error, status 500");
}

#[tokio::test]
async fn test_malformed_success_body_is_serialization_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tasks"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let error = assert_err!(api_for(&server).list_tasks(&ListQuery::default()).await);
    assert!(matches!(error, ApiError::Serialization(_)));
}

#[tokio::test]
async fn test_unreachable_backend_is_network_error() {
    // Port 1 is reserved and refuses connections
    let client = ApiClient::new("http://127.0.0.1:1/api", Duration::from_secs(2)).unwrap();
    let api = HttpTaskApi::new(client);

    let error = assert_err!(api.list_tasks(&ListQuery::default()).await);
    assert!(matches!(error, ApiError::Network(_)));
    assert!(error.to_string().starts_with("Network error occurred"));
}
