//! Scriptable in-process [`StoryApi`] for tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::sync::Notify;

use crate::api::response::{
    LoginResponse, LoginResult, RegisterResponse, StoryDetailResponse, StoryListResponse,
    UploadResponse,
};
use crate::api::StoryApi;
use crate::app::{Result, StorylineError};
use crate::domain::{NewStory, Story};

pub fn story(id: &str) -> Story {
    Story {
        id: id.to_string(),
        name: "Ana".to_string(),
        description: format!("Story {}", id),
        photo_url: format!("https://example.com/{}.jpg", id),
        created_at: Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap(),
        lat: None,
        lon: None,
    }
}

pub fn stories(ids: &[&str]) -> Vec<Story> {
    ids.iter().map(|id| story(id)).collect()
}

pub fn numbered(range: std::ops::RangeInclusive<u32>) -> Vec<Story> {
    range.map(|n| story(&n.to_string())).collect()
}

pub fn ids(stories: &[Story]) -> Vec<String> {
    stories.iter().map(|s| s.id.clone()).collect()
}

pub fn status(status: u16, body: &str) -> StorylineError {
    StorylineError::Status {
        status,
        body: body.to_string(),
    }
}

#[derive(Default)]
pub struct FakeApi {
    pages: Mutex<HashMap<u32, Vec<Story>>>,
    failing_pages: Mutex<HashSet<u32>>,
    gates: Mutex<HashMap<u32, Arc<Notify>>>,
    page_calls: AtomicUsize,
    requested: Mutex<Vec<(u32, u32)>>,
    pub login_reply: Mutex<Option<Result<LoginResponse>>>,
    pub register_reply: Mutex<Option<Result<RegisterResponse>>>,
    pub detail_reply: Mutex<Option<Result<StoryDetailResponse>>>,
    pub upload_reply: Mutex<Option<Result<UploadResponse>>>,
    pub location_reply: Mutex<Option<Result<StoryListResponse>>>,
    pub uploads: Mutex<Vec<NewStory>>,
    pub other_calls: AtomicUsize,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, page: u32, stories: Vec<Story>) -> Self {
        self.set_page(page, stories);
        self
    }

    pub fn set_page(&self, page: u32, stories: Vec<Story>) {
        self.pages.lock().unwrap().insert(page, stories);
    }

    pub fn fail_page(&self, page: u32) {
        self.failing_pages.lock().unwrap().insert(page);
    }

    pub fn heal_page(&self, page: u32) {
        self.failing_pages.lock().unwrap().remove(&page);
    }

    /// Hold requests for `page` until the returned handle is notified.
    pub fn gate_page(&self, page: u32) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates.lock().unwrap().insert(page, gate.clone());
        gate
    }

    pub fn page_calls(&self) -> usize {
        self.page_calls.load(Ordering::SeqCst)
    }

    pub fn requested(&self) -> Vec<(u32, u32)> {
        self.requested.lock().unwrap().clone()
    }

    fn take<T>(slot: &Mutex<Option<Result<T>>>) -> Result<T> {
        slot.lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Err(StorylineError::Other("no scripted reply".into())))
    }
}

#[async_trait]
impl StoryApi for FakeApi {
    async fn register(&self, _name: &str, _email: &str, _password: &str) -> Result<RegisterResponse> {
        self.other_calls.fetch_add(1, Ordering::SeqCst);
        Self::take(&self.register_reply)
    }

    async fn login(&self, _email: &str, _password: &str) -> Result<LoginResponse> {
        self.other_calls.fetch_add(1, Ordering::SeqCst);
        Self::take(&self.login_reply)
    }

    async fn list_stories(&self, page: u32, size: u32) -> Result<StoryListResponse> {
        self.page_calls.fetch_add(1, Ordering::SeqCst);
        self.requested.lock().unwrap().push((page, size));

        let gate = self.gates.lock().unwrap().get(&page).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if self.failing_pages.lock().unwrap().contains(&page) {
            return Err(status(500, r#"{"error":true,"message":"Server unavailable"}"#));
        }

        let list_story = self
            .pages
            .lock()
            .unwrap()
            .get(&page)
            .cloned()
            .unwrap_or_default();

        Ok(StoryListResponse {
            error: false,
            message: "Stories fetched successfully".into(),
            list_story,
        })
    }

    async fn story_detail(&self, _id: &str) -> Result<StoryDetailResponse> {
        self.other_calls.fetch_add(1, Ordering::SeqCst);
        Self::take(&self.detail_reply)
    }

    async fn upload_story(&self, story: NewStory) -> Result<UploadResponse> {
        self.other_calls.fetch_add(1, Ordering::SeqCst);
        self.uploads.lock().unwrap().push(story);
        Self::take(&self.upload_reply)
    }

    async fn stories_with_location(&self) -> Result<StoryListResponse> {
        self.other_calls.fetch_add(1, Ordering::SeqCst);
        Self::take(&self.location_reply)
    }
}

pub fn login_ok(user_id: &str, token: &str) -> LoginResponse {
    LoginResponse {
        error: false,
        message: "success".into(),
        login_result: Some(LoginResult {
            user_id: user_id.into(),
            name: "Ana".into(),
            token: token.into(),
        }),
    }
}
