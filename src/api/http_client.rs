use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use url::Url;

use crate::api::interceptor::{AuthInterceptor, AuthPolicy};
use crate::api::response::{
    LoginResponse, RegisterResponse, StoryDetailResponse, StoryListResponse, UploadResponse,
};
use crate::api::StoryApi;
use crate::app::{Result, StorylineError};
use crate::config::ApiConfig;
use crate::domain::NewStory;

pub struct HttpStoryApi {
    client: Client,
    base_url: Url,
    interceptor: AuthInterceptor,
}

impl HttpStoryApi {
    pub fn new(config: &ApiConfig, interceptor: AuthInterceptor) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            .brotli(true)
            .user_agent(config.user_agent.as_str())
            .build()?;

        // Url::join drops the last path segment unless it ends with a slash
        let mut base = config.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }

        Ok(Self {
            client,
            base_url: Url::parse(&base)?,
            interceptor,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    async fn send<R: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        policy: AuthPolicy,
    ) -> Result<R> {
        let response = self.interceptor.intercept(request, policy).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::debug!("Request failed with {}: {}", status, body);
            return Err(StorylineError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    fn photo_mime(file_name: &str) -> &'static str {
        let lower = file_name.to_lowercase();
        if lower.ends_with(".png") {
            "image/png"
        } else if lower.ends_with(".webp") {
            "image/webp"
        } else if lower.ends_with(".gif") {
            "image/gif"
        } else {
            "image/jpeg"
        }
    }
}

#[async_trait]
impl StoryApi for HttpStoryApi {
    async fn register(&self, name: &str, email: &str, password: &str) -> Result<RegisterResponse> {
        let request = self
            .client
            .post(self.endpoint("register")?)
            .form(&[("name", name), ("email", email), ("password", password)]);

        self.send(request, AuthPolicy::Exempt).await
    }

    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse> {
        let request = self
            .client
            .post(self.endpoint("login")?)
            .form(&[("email", email), ("password", password)]);

        self.send(request, AuthPolicy::Exempt).await
    }

    async fn list_stories(&self, page: u32, size: u32) -> Result<StoryListResponse> {
        tracing::debug!("Fetching stories page {} (size {})", page, size);
        let request = self
            .client
            .get(self.endpoint("stories")?)
            .query(&[("page", page), ("size", size)]);

        self.send(request, AuthPolicy::Bearer).await
    }

    async fn story_detail(&self, id: &str) -> Result<StoryDetailResponse> {
        let request = self.client.get(self.endpoint(&format!("stories/{}", id))?);

        self.send(request, AuthPolicy::Bearer).await
    }

    async fn upload_story(&self, story: NewStory) -> Result<UploadResponse> {
        let mime = Self::photo_mime(&story.file_name);
        let photo = Part::bytes(story.photo)
            .file_name(story.file_name)
            .mime_str(mime)?;

        let mut form = Form::new()
            .part("photo", photo)
            .text("description", story.description);
        if let Some(lat) = story.lat {
            form = form.text("lat", lat.to_string());
        }
        if let Some(lon) = story.lon {
            form = form.text("lon", lon.to_string());
        }

        let request = self.client.post(self.endpoint("stories")?).multipart(form);

        self.send(request, AuthPolicy::Bearer).await
    }

    async fn stories_with_location(&self) -> Result<StoryListResponse> {
        let request = self
            .client
            .get(self.endpoint("stories")?)
            .query(&[("location", 1)]);

        self.send(request, AuthPolicy::Bearer).await
    }
}
