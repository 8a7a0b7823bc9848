use thiserror::Error;
use uuid::Uuid;

use crate::api::ApiError;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Comment not found: {0}")]
    CommentNotFound(Uuid),

    #[error("Reply {reply_id} not found under comment {comment_id}")]
    ReplyNotFound { comment_id: Uuid, reply_id: Uuid },

    #[error("Post {0} has been deleted")]
    PostDeleted(Uuid),
}

pub type StoreResult<T> = Result<T, StoreError>;
