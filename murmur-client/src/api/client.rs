use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use super::{ApiError, ApiResult, FeedBackend};
use crate::logging::LogConfig;
use murmur_types::*;

/// API client for communicating with the Murmur server
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    session_token: Option<String>,
    log_config: LogConfig,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session_token: None,
            log_config: LogConfig::disabled(),
        }
    }

    pub fn with_log_config(mut self, log_config: LogConfig) -> Self {
        self.log_config = log_config;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Set the session token for authenticated requests
    pub fn set_session_token(&mut self, token: Option<String>) {
        self.session_token = token;
    }

    /// Helper to add session token to request if available
    fn add_auth_header(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(token) = &self.session_token {
            req.header("X-Session-Token", token)
        } else {
            req
        }
    }

    /// Map a non-success response to the matching `ApiError`
    async fn error_from_response(response: reqwest::Response) -> ApiError {
        let status = response.status();
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        // Clean up HTML error messages (e.g., from nginx 404 pages)
        let clean_error = if error_text.contains("<html>") || error_text.contains("<!DOCTYPE") {
            format!(
                "Server returned {} error. Please check the server URL.",
                status.as_u16()
            )
        } else if let Ok(body) = serde_json::from_str::<ErrorResponse>(&error_text) {
            match body.details {
                Some(details) => format!("{}: {}", body.error, details),
                None => body.error,
            }
        } else {
            error_text
        };

        match status.as_u16() {
            404 => ApiError::NotFound(clean_error),
            401 => ApiError::Unauthorized(clean_error),
            400 => ApiError::BadRequest(clean_error),
            _ => ApiError::Api(clean_error),
        }
    }

    /// Helper to handle API responses
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> ApiResult<T> {
        if response.status().is_success() {
            let body = response.bytes().await?;
            decode_body(&body)
        } else {
            Err(Self::error_from_response(response).await)
        }
    }

    /// Helper for endpoints whose success body is ignored
    async fn handle_empty_response(&self, response: reqwest::Response) -> ApiResult<()> {
        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::error_from_response(response).await)
        }
    }

    async fn get<T: DeserializeOwned>(&self, url: String) -> ApiResult<T> {
        log_api_call!(self.log_config, "GET {}", url);
        let req = self.add_auth_header(self.client.get(&url));
        let response = req.send().await?;
        self.handle_response(response).await
    }

    async fn send_json<B, T>(&self, method: reqwest::Method, url: String, body: &B) -> ApiResult<T>
    where
        B: serde::Serialize + ?Sized,
        T: DeserializeOwned,
    {
        log_api_call!(self.log_config, "{} {}", method, url);
        let req = self.add_auth_header(self.client.request(method, &url).json(body));
        let response = req.send().await?;
        self.handle_response(response).await
    }

    async fn send_json_empty<B>(&self, method: reqwest::Method, url: String, body: &B) -> ApiResult<()>
    where
        B: serde::Serialize + ?Sized,
    {
        log_api_call!(self.log_config, "{} {}", method, url);
        let req = self.add_auth_header(self.client.request(method, &url).json(body));
        let response = req.send().await?;
        self.handle_empty_response(response).await
    }

    async fn send_empty(&self, method: reqwest::Method, url: String) -> ApiResult<()> {
        log_api_call!(self.log_config, "{} {}", method, url);
        let req = self.add_auth_header(self.client.request(method, &url));
        let response = req.send().await?;
        self.handle_empty_response(response).await
    }
}

/// Decode a success body. A body that does not match `T` is a serialization error.
fn decode_body<T: DeserializeOwned>(body: &[u8]) -> ApiResult<T> {
    Ok(serde_json::from_slice(body)?)
}

#[async_trait]
impl FeedBackend for ApiClient {
    async fn fetch_post(&self, post_id: Uuid) -> ApiResult<Post> {
        self.get(format!("{}/posts/{}", self.base_url, post_id)).await
    }

    async fn fetch_comments(&self, post_id: Uuid, page: u32, page_size: u32) -> ApiResult<Vec<Comment>> {
        self.get(format!(
            "{}/posts/{}/comments?page={}&limit={}",
            self.base_url, post_id, page, page_size
        ))
        .await
    }

    async fn fetch_replies(&self, comment_id: Uuid, page: u32, page_size: u32) -> ApiResult<Vec<Reply>> {
        self.get(format!(
            "{}/comments/{}/replies?page={}&limit={}",
            self.base_url, comment_id, page, page_size
        ))
        .await
    }

    async fn create_comment(&self, post_id: Uuid, request: &CommentRequest) -> ApiResult<Comment> {
        let url = format!("{}/posts/{}/comments", self.base_url, post_id);
        self.send_json(reqwest::Method::POST, url, request).await
    }

    async fn update_comment(&self, comment_id: Uuid, request: &CommentRequest) -> ApiResult<Comment> {
        let url = format!("{}/comments/{}", self.base_url, comment_id);
        self.send_json(reqwest::Method::PUT, url, request).await
    }

    async fn delete_comment(&self, comment_id: Uuid) -> ApiResult<()> {
        let url = format!("{}/comments/{}", self.base_url, comment_id);
        self.send_empty(reqwest::Method::DELETE, url).await
    }

    async fn create_reply(&self, comment_id: Uuid, request: &CommentRequest) -> ApiResult<Reply> {
        let url = format!("{}/comments/{}/replies", self.base_url, comment_id);
        self.send_json(reqwest::Method::POST, url, request).await
    }

    async fn update_reply(&self, reply_id: Uuid, request: &CommentRequest) -> ApiResult<Reply> {
        let url = format!("{}/replies/{}", self.base_url, reply_id);
        self.send_json(reqwest::Method::PUT, url, request).await
    }

    async fn delete_reply(&self, reply_id: Uuid) -> ApiResult<()> {
        let url = format!("{}/replies/{}", self.base_url, reply_id);
        self.send_empty(reqwest::Method::DELETE, url).await
    }

    async fn react(&self, entity_id: Uuid, kind: EntityKind, request: &ReactRequest) -> ApiResult<()> {
        let url = format!("{}/react/{}/{}", self.base_url, kind.as_str(), entity_id);
        self.send_json_empty(reqwest::Method::POST, url, request).await
    }

    async fn save_post(&self, post_id: Uuid) -> ApiResult<()> {
        let url = format!("{}/posts/{}/save", self.base_url, post_id);
        self.send_empty(reqwest::Method::POST, url).await
    }

    async fn unsave_post(&self, post_id: Uuid) -> ApiResult<()> {
        let url = format!("{}/posts/{}/save", self.base_url, post_id);
        self.send_empty(reqwest::Method::DELETE, url).await
    }

    async fn update_post(&self, post_id: Uuid, request: &UpdatePostRequest) -> ApiResult<Post> {
        let url = format!("{}/posts/{}", self.base_url, post_id);
        self.send_json(reqwest::Method::PUT, url, request).await
    }

    async fn delete_post(&self, post_id: Uuid) -> ApiResult<()> {
        let url = format!("{}/posts/{}", self.base_url, post_id);
        self.send_empty(reqwest::Method::DELETE, url).await
    }

    async fn share_post(&self, post_id: Uuid, request: &SharePostRequest) -> ApiResult<()> {
        let url = format!("{}/posts/{}/share", self.base_url, post_id);
        self.send_json_empty(reqwest::Method::POST, url, request).await
    }
}

impl Default for ApiClient {
    fn default() -> Self {
        let base_url = std::env::var("MURMUR_SERVER_URL")
            .unwrap_or_else(|_| crate::config::DEFAULT_SERVER_URL.to_string());
        Self::new(base_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_trims_trailing_slash() {
        let client = ApiClient::new("https://example.test/api/");
        assert_eq!(client.base_url(), "https://example.test/api");
    }

    #[test]
    fn test_decode_body_reads_comment_page() {
        let body = br#"[{
            "id": "00000000-0000-0000-0000-000000000001",
            "post_id": "00000000-0000-0000-0000-000000000002",
            "author_id": "00000000-0000-0000-0000-000000000003",
            "content": "hi",
            "created_at": "2024-05-01T12:00:00Z",
            "react_counts": { "love": 2 }
        }]"#;
        let page: Vec<Comment> = decode_body(body).unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].react_counts.get(ReactionType::Love), 2);
    }

    #[test]
    fn test_malformed_body_is_a_serialization_error() {
        let result: ApiResult<Vec<Comment>> = decode_body(b"<html>oops</html>");
        assert!(matches!(result, Err(ApiError::Serialization(_))));

        let result: ApiResult<Post> = decode_body(br#"{"id": 7}"#);
        assert!(matches!(result, Err(ApiError::Serialization(_))));
    }

    #[tokio::test]
    async fn test_json_writes_share_the_request_path() {
        // Nothing listens on port 1, so both calls fail at connect time
        let client = ApiClient::new("http://127.0.0.1:1");
        let react = client
            .react(Uuid::nil(), EntityKind::Post, &ReactRequest::new(Some(ReactionType::Like), None))
            .await;
        assert!(matches!(react, Err(ApiError::Network(_))));

        let share = client.share_post(Uuid::nil(), &SharePostRequest::default()).await;
        assert!(matches!(share, Err(ApiError::Network(_))));
    }
}
