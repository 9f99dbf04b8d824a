pub mod sqlite;

use std::collections::HashMap;

use crate::app::Result;
use crate::domain::{RemoteKeys, Story};

pub use sqlite::SqliteStore;

/// Local cache of the story feed.
///
/// Stories are kept in feed order by an insertion position. Every story carries
/// the [`RemoteKeys`] of the page it arrived with; the write operations skip ids
/// that are already cached and keep the first occurrence of duplicates inside a
/// page. Each write runs in a single transaction.
pub trait StoryCache {
    // Page writes
    fn replace_all(&self, stories: &[Story], keys: RemoteKeys) -> Result<usize>;
    fn append(&self, stories: &[Story], keys: RemoteKeys) -> Result<usize>;
    fn prepend(&self, stories: &[Story], keys: RemoteKeys) -> Result<usize>;
    fn clear(&self) -> Result<()>;

    // Reads
    fn get_story(&self, id: &str) -> Result<Option<Story>>;
    fn get_stories(&self, offset: usize, limit: usize) -> Result<Vec<Story>>;
    fn get_all_stories(&self) -> Result<Vec<Story>>;
    fn story_count(&self) -> Result<usize>;
    fn story_exists(&self, id: &str) -> Result<bool>;

    // Pagination bookkeeping
    fn remote_keys(&self, id: &str) -> Result<Option<RemoteKeys>>;
    fn first_remote_keys(&self) -> Result<Option<RemoteKeys>>;
    fn last_remote_keys(&self) -> Result<Option<RemoteKeys>>;
}

/// A single change to the preference table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrefEdit {
    Set(String, String),
    Remove(String),
}

impl PrefEdit {
    pub fn set(key: &str, value: impl Into<String>) -> Self {
        PrefEdit::Set(key.to_string(), value.into())
    }

    pub fn remove(key: &str) -> Self {
        PrefEdit::Remove(key.to_string())
    }
}

/// Durable key-value storage behind the session store.
pub trait PreferenceStore {
    fn load_preferences(&self) -> Result<HashMap<String, String>>;

    /// Apply all edits or none of them.
    fn apply_preferences(&self, edits: &[PrefEdit]) -> Result<()>;
}
