use std::path::PathBuf;
use std::sync::Arc;

use crate::api::{AuthInterceptor, HttpStoryApi, StoryApi};
use crate::app::error::{Result, StorylineError};
use crate::config::Config;
use crate::repository::StoryRepository;
use crate::session::SessionStore;
use crate::store::sqlite::SqliteStore;

/// Owns every shared instance. Built once at startup and passed by reference.
pub struct AppContext {
    pub store: Arc<SqliteStore>,
    pub session: Arc<SessionStore>,
    pub repository: StoryRepository,
}

impl AppContext {
    pub fn new(config: Config, db_path: Option<PathBuf>) -> Result<Self> {
        let db_path = match db_path {
            Some(p) => p,
            None => Self::default_db_path()?,
        };

        let store = Arc::new(SqliteStore::new(&db_path)?);
        Self::with_store(config, store)
    }

    pub fn in_memory(config: Config) -> Result<Self> {
        let store = Arc::new(SqliteStore::in_memory()?);
        Self::with_store(config, store)
    }

    fn with_store(config: Config, store: Arc<SqliteStore>) -> Result<Self> {
        let session = Arc::new(SessionStore::new(store.clone())?);
        let interceptor = AuthInterceptor::new(session.clone());
        let api: Arc<dyn StoryApi + Send + Sync> =
            Arc::new(HttpStoryApi::new(&config.api, interceptor)?);

        Ok(Self::with_api(config, store, session, api))
    }

    /// Wire the context around an existing API implementation.
    pub fn with_api(
        config: Config,
        store: Arc<SqliteStore>,
        session: Arc<SessionStore>,
        api: Arc<dyn StoryApi + Send + Sync>,
    ) -> Self {
        let repository = StoryRepository::new(api, session.clone(), store.clone(), config.feed);

        Self {
            store,
            session,
            repository,
        }
    }

    fn default_db_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| StorylineError::Config("Could not find data directory".into()))?;
        let storyline_dir = data_dir.join("storyline");
        std::fs::create_dir_all(&storyline_dir)?;
        Ok(storyline_dir.join("storyline.db"))
    }
}
