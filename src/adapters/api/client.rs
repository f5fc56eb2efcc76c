use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use crate::ports::{ApiError, ApiResult};
use super::dto::ErrorBodyDto;

/// JSON-over-HTTP transport for the task backend.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> ApiResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .user_agent(concat!("taskboard/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::Network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        self.send(self.client.get(self.url(path))).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> ApiResult<T> {
        self.send(self.client.post(self.url(path)).json(body)).await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> ApiResult<T> {
        self.send(self.client.put(self.url(path)).json(body)).await
    }

    pub async fn patch<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> ApiResult<T> {
        self.send(self.client.patch(self.url(path)).json(body)).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        self.send(self.client.delete(self.url(path))).await
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> ApiResult<T> {
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        self.handle_response(response).await
    }

    async fn handle_response<T: DeserializeOwned>(&self, response: Response) -> ApiResult<T> {
        let status = response.status();
        let url = response.url().to_string();

        let response_text = response
            .text()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        tracing::debug!("API Response {} {}: {}", status.as_u16(), url, response_text);

        if status.is_success() {
            return serde_json::from_str(&response_text).map_err(|e| {
                ApiError::Serialization(format!(
                    "Failed to parse response: {}. Response was: {}",
                    e, response_text
                ))
            });
        }

        let message = serde_json::from_str::<ErrorBodyDto>(&response_text)
            .ok()
            .and_then(ErrorBodyDto::into_message)
            .unwrap_or_else(|| format!("HTTP error, status {}", status.as_u16()));

        Err(ApiError::Request {
            status: status.as_u16(),
            message,
        })
    }
}
