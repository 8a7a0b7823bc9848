use async_trait::async_trait;
use murmur_types::*;
use uuid::Uuid;

use super::ApiResult;

/// The REST operations the post store depends on.
///
/// `ApiClient` is the production implementation; tests drive the store with
/// in-memory fakes.
#[async_trait]
pub trait FeedBackend: Send + Sync {
    /// Get a single post by ID
    async fn fetch_post(&self, post_id: Uuid) -> ApiResult<Post>;

    /// Get one page of comments for a post. An empty page means there are no more.
    async fn fetch_comments(&self, post_id: Uuid, page: u32, page_size: u32) -> ApiResult<Vec<Comment>>;

    /// Get one page of replies for a comment
    async fn fetch_replies(&self, comment_id: Uuid, page: u32, page_size: u32) -> ApiResult<Vec<Reply>>;

    async fn create_comment(&self, post_id: Uuid, request: &CommentRequest) -> ApiResult<Comment>;

    async fn update_comment(&self, comment_id: Uuid, request: &CommentRequest) -> ApiResult<Comment>;

    async fn delete_comment(&self, comment_id: Uuid) -> ApiResult<()>;

    async fn create_reply(&self, comment_id: Uuid, request: &CommentRequest) -> ApiResult<Reply>;

    async fn update_reply(&self, reply_id: Uuid, request: &CommentRequest) -> ApiResult<Reply>;

    async fn delete_reply(&self, reply_id: Uuid) -> ApiResult<()>;

    /// Apply a reaction change to a post, comment or reply
    async fn react(&self, entity_id: Uuid, kind: EntityKind, request: &ReactRequest) -> ApiResult<()>;

    async fn save_post(&self, post_id: Uuid) -> ApiResult<()>;

    async fn unsave_post(&self, post_id: Uuid) -> ApiResult<()>;

    async fn update_post(&self, post_id: Uuid, request: &UpdatePostRequest) -> ApiResult<Post>;

    async fn delete_post(&self, post_id: Uuid) -> ApiResult<()>;

    /// Share a post to the viewer's own feed
    async fn share_post(&self, post_id: Uuid, request: &SharePostRequest) -> ApiResult<()>;
}
