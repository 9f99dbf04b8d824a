pub mod http_client;
pub mod interceptor;
pub mod response;

#[cfg(test)]
pub(crate) mod fake;

use async_trait::async_trait;

use crate::app::Result;
use crate::domain::NewStory;

pub use http_client::HttpStoryApi;
pub use interceptor::{AuthInterceptor, AuthPolicy, TokenSource};
pub use response::{
    Envelope, ErrorEnvelope, LoginResponse, LoginResult, RegisterResponse, StoryDetailResponse,
    StoryListResponse, UploadResponse,
};

/// The story service's REST endpoints.
///
/// Implementations return the decoded envelope for 2xx answers and
/// [`StorylineError::Status`](crate::app::StorylineError::Status) with the raw
/// body otherwise. Interpreting the envelope is left to the caller.
#[async_trait]
pub trait StoryApi {
    async fn register(&self, name: &str, email: &str, password: &str) -> Result<RegisterResponse>;

    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse>;

    async fn list_stories(&self, page: u32, size: u32) -> Result<StoryListResponse>;

    async fn story_detail(&self, id: &str) -> Result<StoryDetailResponse>;

    async fn upload_story(&self, story: NewStory) -> Result<UploadResponse>;

    async fn stories_with_location(&self) -> Result<StoryListResponse>;
}
