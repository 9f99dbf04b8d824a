use std::sync::Arc;

use futures::stream::BoxStream;

use crate::api::{LoginResult, RegisterResponse, StoryApi, UploadResponse};
use crate::app::Result;
use crate::config::FeedConfig;
use crate::domain::credentials;
use crate::domain::{CredentialProblem, NewStory, Session, Settings, Story};
use crate::paging::{FeedMediator, FeedPager};
use crate::result::{self, ErrorKind, FailurePolicy, MessageKey, ResultState};
use crate::session::{SessionStore, Watch};
use crate::store::{SqliteStore, StoryCache};

/// Single entry point for the front end.
///
/// Feed reads go through the cache; every other operation talks to the API
/// directly and reports `Loading` followed by one terminal state.
#[derive(Clone)]
pub struct StoryRepository {
    api: Arc<dyn StoryApi + Send + Sync>,
    session: Arc<SessionStore>,
    cache: Arc<SqliteStore>,
    feed: FeedConfig,
}

impl StoryRepository {
    pub fn new(
        api: Arc<dyn StoryApi + Send + Sync>,
        session: Arc<SessionStore>,
        cache: Arc<SqliteStore>,
        feed: FeedConfig,
    ) -> Self {
        Self {
            api,
            session,
            cache,
            feed,
        }
    }

    pub fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> BoxStream<'static, ResultState<RegisterResponse>> {
        if let Some(problem) = credentials::check(email, password) {
            return refuse(problem);
        }
        let api = self.api.clone();
        let (name, email, password) = (name.to_string(), email.to_string(), password.to_string());

        result::run(
            FailurePolicy::register(),
            async move { api.register(&name, &email, &password).await },
            ResultState::Success,
        )
    }

    /// Log in and persist the session when the server accepts the credentials.
    pub fn login(&self, email: &str, password: &str) -> BoxStream<'static, ResultState<LoginResult>> {
        if let Some(problem) = credentials::check(email, password) {
            return refuse(problem);
        }
        let api = self.api.clone();
        let session = self.session.clone();
        let (email, password) = (email.to_string(), password.to_string());

        result::run(
            FailurePolicy::login(),
            async move { api.login(&email, &password).await },
            move |response| {
                let Some(login) = response.login_result else {
                    return ResultState::Error(ErrorKind::Resource(MessageKey::LoginFailed));
                };
                let saved = session.save_session(&Session::new(
                    login.user_id.as_str(),
                    login.name.as_str(),
                    login.token.as_str(),
                ));
                match saved {
                    Ok(()) => ResultState::Success(login),
                    Err(e) => ResultState::Error(ErrorKind::Api(e.to_string())),
                }
            },
        )
    }

    /// Forget the session and the feed cached for it. Settings are kept.
    pub fn logout(&self) -> Result<()> {
        self.session.logout()?;
        self.cache.clear()
    }

    pub fn story_detail(&self, id: &str) -> BoxStream<'static, ResultState<Story>> {
        let api = self.api.clone();
        let id = id.to_string();

        result::run(
            FailurePolicy::new(),
            async move { api.story_detail(&id).await },
            |response| match response.story {
                Some(story) => ResultState::Success(story),
                None => ResultState::Error(ErrorKind::Api(response.message)),
            },
        )
    }

    pub fn upload_story(&self, story: NewStory) -> BoxStream<'static, ResultState<UploadResponse>> {
        if story.photo.is_empty() || story.description.trim().is_empty() {
            return result::rejected(ErrorKind::Resource(MessageKey::EmptyStory));
        }
        let api = self.api.clone();

        result::run(
            FailurePolicy::upload(),
            async move { api.upload_story(story).await },
            ResultState::Success,
        )
    }

    /// Stories that carry coordinates, for the map view.
    pub fn stories_with_location(&self) -> BoxStream<'static, ResultState<Vec<Story>>> {
        let api = self.api.clone();

        result::run(
            FailurePolicy::new(),
            async move { api.stories_with_location().await },
            |response| {
                ResultState::Success(
                    response
                        .list_story
                        .into_iter()
                        .filter(Story::has_location)
                        .collect(),
                )
            },
        )
    }

    /// Start a feed session over the local cache.
    pub fn feed(&self) -> Result<FeedPager<SqliteStore>> {
        let mediator = FeedMediator::new(self.api.clone(), self.cache.clone(), self.feed.page_size)?;
        Ok(FeedPager::new(Arc::new(mediator), self.feed.prefetch_distance))
    }

    pub fn is_logged_in(&self) -> Watch<bool> {
        self.session.is_logged_in()
    }

    pub fn session(&self) -> Session {
        self.session.session()
    }

    pub fn settings(&self) -> Settings {
        self.session.settings()
    }

    pub fn dark_mode(&self) -> Watch<bool> {
        self.session.dark_mode()
    }

    pub fn set_dark_mode(&self, enabled: bool) -> Result<()> {
        self.session.set_dark_mode(enabled)
    }

    pub fn language(&self) -> Watch<String> {
        self.session.language()
    }

    pub fn set_language(&self, code: &str) -> Result<()> {
        self.session.set_language(code)
    }
}

fn refuse<T: Send + 'static>(problem: CredentialProblem) -> BoxStream<'static, ResultState<T>> {
    let key = match problem {
        CredentialProblem::InvalidEmail => MessageKey::InvalidEmail,
        CredentialProblem::PasswordTooShort => MessageKey::PasswordTooShort,
    };
    result::rejected(ErrorKind::Resource(key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::{login_ok, numbered, status, story, FakeApi};
    use crate::api::{LoginResponse, StoryDetailResponse, StoryListResponse};
    use futures::StreamExt;
    use std::sync::atomic::Ordering;

    struct Harness {
        api: Arc<FakeApi>,
        store: Arc<SqliteStore>,
        session: Arc<SessionStore>,
        repository: StoryRepository,
    }

    fn harness() -> Harness {
        let api = Arc::new(FakeApi::new());
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let session = Arc::new(SessionStore::with_default_language(store.clone(), "en").unwrap());
        let repository = StoryRepository::new(
            api.clone(),
            session.clone(),
            store.clone(),
            FeedConfig::default(),
        );
        Harness {
            api,
            store,
            session,
            repository,
        }
    }

    async fn collect<T>(stream: BoxStream<'static, ResultState<T>>) -> Vec<ResultState<T>> {
        stream.collect().await
    }

    #[tokio::test]
    async fn test_login_saves_session() {
        let h = harness();
        *h.api.login_reply.lock().unwrap() = Some(Ok(login_ok("user-1", "tok-1")));
        let mut logged_in = h.repository.is_logged_in();
        assert!(!logged_in.get());

        let states = collect(h.repository.login("ana@example.com", "hunter22")).await;

        assert_eq!(states.len(), 2);
        assert!(states[0].is_loading());
        assert_eq!(states[1].clone().success().unwrap().token, "tok-1");
        assert_eq!(logged_in.changed().await, Some(true));
        assert_eq!(h.session.token(), "tok-1");
    }

    #[tokio::test]
    async fn test_login_401_leaves_session_unchanged() {
        let h = harness();
        *h.api.login_reply.lock().unwrap() = Some(Err(status(
            401,
            r#"{"error":true,"message":"Invalid password"}"#,
        )));

        let states = collect(h.repository.login("ana@example.com", "wrong-password")).await;

        assert_eq!(
            states,
            vec![
                ResultState::Loading,
                ResultState::Error(ErrorKind::Resource(MessageKey::WrongCredentials)),
            ]
        );
        assert!(!h.repository.is_logged_in().get());
        assert_eq!(h.session.token(), "");
    }

    #[tokio::test]
    async fn test_login_error_flag_is_api_error() {
        let h = harness();
        *h.api.login_reply.lock().unwrap() = Some(Ok(LoginResponse {
            error: true,
            message: "\"email\" must be a valid email".into(),
            login_result: None,
        }));

        let states = collect(h.repository.login("ana@example.com", "hunter22")).await;
        assert_eq!(
            states[1],
            ResultState::Error(ErrorKind::Api("\"email\" must be a valid email".into()))
        );
        assert!(!h.repository.is_logged_in().get());
    }

    #[tokio::test]
    async fn test_malformed_email_rejected_without_request() {
        let h = harness();

        let login = collect(h.repository.login("ana.example.com", "hunter22")).await;
        let register = collect(h.repository.register("Ana", "ana@", "hunter22")).await;

        let refused = ErrorKind::Resource(MessageKey::InvalidEmail);
        assert_eq!(login[1], ResultState::Error(refused.clone()));
        assert_eq!(register, vec![ResultState::Loading, ResultState::Error(refused)]);
        assert_eq!(h.api.other_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_short_password_rejected_without_request() {
        let h = harness();

        let login = collect(h.repository.login("ana@example.com", "1234567")).await;
        let register = collect(h.repository.register("Ana", "ana@example.com", "short")).await;

        let refused = ErrorKind::Resource(MessageKey::PasswordTooShort);
        assert_eq!(login, vec![ResultState::Loading, ResultState::Error(refused.clone())]);
        assert_eq!(register[1], ResultState::Error(refused));
        assert_eq!(h.api.other_calls.load(Ordering::SeqCst), 0);
        assert!(!h.repository.is_logged_in().get());
    }

    #[tokio::test]
    async fn test_register_400_is_already_taken() {
        let h = harness();
        *h.api.register_reply.lock().unwrap() = Some(Err(status(
            400,
            r#"{"error":true,"message":"Email is already taken"}"#,
        )));

        let states = collect(h.repository.register("Ana", "ana@example.com", "hunter22")).await;
        assert_eq!(
            states[1],
            ResultState::Error(ErrorKind::Resource(MessageKey::AlreadyTaken))
        );
    }

    #[tokio::test]
    async fn test_logout_keeps_settings_and_drops_feed() {
        let h = harness();
        h.api.set_page(1, numbered(1..=5));
        *h.api.login_reply.lock().unwrap() = Some(Ok(login_ok("user-1", "tok-1")));
        collect(h.repository.login("ana@example.com", "hunter22")).await;
        h.repository.feed().unwrap().open().await;
        assert_eq!(h.store.story_count().unwrap(), 5);
        h.repository.set_dark_mode(true).unwrap();
        h.repository.set_language("id").unwrap();

        h.repository.logout().unwrap();

        assert!(!h.repository.is_logged_in().get());
        assert_eq!(h.repository.session(), Session::default());
        assert!(h.repository.dark_mode().get());
        assert_eq!(h.repository.language().get(), "id");
        assert_eq!(h.store.story_count().unwrap(), 0);
        assert!(h.store.last_remote_keys().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_story_detail_success() {
        let h = harness();
        *h.api.detail_reply.lock().unwrap() = Some(Ok(StoryDetailResponse {
            error: false,
            message: "Story fetched successfully".into(),
            story: Some(story("s1")),
        }));

        let states = collect(h.repository.story_detail("s1")).await;
        assert_eq!(states[1], ResultState::Success(story("s1")));
    }

    #[tokio::test]
    async fn test_story_detail_not_found_decodes_message() {
        let h = harness();
        *h.api.detail_reply.lock().unwrap() = Some(Err(status(
            404,
            r#"{"error":true,"message":"Story not found"}"#,
        )));

        let states = collect(h.repository.story_detail("missing")).await;
        assert_eq!(
            states[1],
            ResultState::Error(ErrorKind::Api("Story not found".into()))
        );
    }

    #[tokio::test]
    async fn test_empty_upload_rejected_without_request() {
        let h = harness();
        let story = NewStory {
            photo: vec![1, 2, 3],
            file_name: "beach.jpg".into(),
            description: "   ".into(),
            lat: None,
            lon: None,
        };

        let states = collect(h.repository.upload_story(story)).await;
        assert_eq!(
            states[1],
            ResultState::Error(ErrorKind::Resource(MessageKey::EmptyStory))
        );
        assert_eq!(h.api.other_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_upload_success() {
        let h = harness();
        *h.api.upload_reply.lock().unwrap() = Some(Ok(UploadResponse {
            error: false,
            message: "Story created successfully".into(),
        }));
        let story = NewStory {
            photo: vec![1, 2, 3],
            file_name: "beach.jpg".into(),
            description: "A day at the beach".into(),
            lat: Some(-6.2),
            lon: Some(106.8),
        };

        let states = collect(h.repository.upload_story(story)).await;
        assert!(matches!(states[1], ResultState::Success(_)));
        assert_eq!(h.api.uploads.lock().unwrap()[0].lat, Some(-6.2));
    }

    #[tokio::test]
    async fn test_upload_api_error() {
        let h = harness();
        *h.api.upload_reply.lock().unwrap() = Some(Ok(UploadResponse {
            error: true,
            message: "Payload content length greater than maximum allowed: 1000000".into(),
        }));
        let story = NewStory {
            photo: vec![1],
            file_name: "big.jpg".into(),
            description: "Too big".into(),
            lat: None,
            lon: None,
        };

        let states = collect(h.repository.upload_story(story)).await;
        assert!(matches!(states[1], ResultState::Error(ErrorKind::Api(_))));
    }

    #[tokio::test]
    async fn test_stories_with_location_filters() {
        let h = harness();
        let mut located = story("s1");
        located.lat = Some(-6.2);
        located.lon = Some(106.8);
        *h.api.location_reply.lock().unwrap() = Some(Ok(StoryListResponse {
            error: false,
            message: "Stories fetched successfully".into(),
            list_story: vec![located.clone(), story("s2")],
        }));

        let states = collect(h.repository.stories_with_location()).await;
        assert_eq!(states[1], ResultState::Success(vec![located]));
    }

    #[tokio::test]
    async fn test_feed_pages_through_cache() {
        let h = harness();
        h.api.set_page(1, numbered(1..=5));
        h.api.set_page(2, numbered(6..=8));

        let feed = h.repository.feed().unwrap();
        feed.open().await;
        feed.load_more().await;
        feed.load_more().await;

        assert_eq!(feed.len().unwrap(), 8);
        assert_eq!(h.api.page_calls(), 2);

        // A new session over the same cache resumes at end of feed
        let resumed = h.repository.feed().unwrap();
        assert!(resumed.open().await.is_none());
        assert!(!resumed.has_more());
    }
}
