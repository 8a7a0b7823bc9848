mod backend;
mod client;
mod error;

pub use backend::FeedBackend;
pub use client::ApiClient;
pub use error::{ApiError, ApiResult};
