use std::sync::{Arc, Mutex};

use tokio::sync::watch;

use crate::app::Result;
use crate::domain::Story;
use crate::paging::mediator::{Cursor, FeedMediator, FeedStatus, LoadDirection, LoadOutcome};
use crate::store::StoryCache;

/// Consumer-facing view of the cached feed.
///
/// Reads always come from the cache. The pager asks the mediator for more
/// pages as the read position nears the end of what is cached.
pub struct FeedPager<C> {
    mediator: Arc<FeedMediator<C>>,
    prefetch_distance: usize,
    last_failed: Mutex<Option<LoadDirection>>,
}

impl<C: StoryCache + Send + Sync> FeedPager<C> {
    pub fn new(mediator: Arc<FeedMediator<C>>, prefetch_distance: usize) -> Self {
        Self {
            mediator,
            prefetch_distance,
            last_failed: Mutex::new(None),
        }
    }

    /// Run the initial load unless this session already has a window.
    pub async fn open(&self) -> Option<LoadOutcome> {
        if self.mediator.cursor() != Cursor::Unloaded {
            return None;
        }
        Some(self.run(LoadDirection::Refresh).await)
    }

    pub async fn refresh(&self) -> LoadOutcome {
        self.run(LoadDirection::Refresh).await
    }

    pub async fn load_more(&self) -> LoadOutcome {
        self.run(LoadDirection::Append).await
    }

    /// Report that the item at `index` is being read. Requests the next page
    /// when fewer than `prefetch_distance` cached stories remain after it.
    pub async fn on_position(&self, index: usize) -> Result<Option<LoadOutcome>> {
        let len = self.len()?;
        if index + self.prefetch_distance < len {
            return Ok(None);
        }
        if self.mediator.cursor() == Cursor::End {
            return Ok(None);
        }
        Ok(Some(self.run(LoadDirection::Append).await))
    }

    /// Repeat the direction that failed last, if any.
    pub async fn retry(&self) -> Option<LoadOutcome> {
        let direction = self.last_failed.lock().ok().and_then(|mut last| last.take())?;
        tracing::debug!("Retrying {:?}", direction);
        Some(self.run(direction).await)
    }

    pub fn len(&self) -> Result<usize> {
        self.mediator.cache().story_count()
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn window(&self, offset: usize, limit: usize) -> Result<Vec<Story>> {
        self.mediator.cache().get_stories(offset, limit)
    }

    pub fn snapshot(&self) -> Result<Vec<Story>> {
        self.mediator.cache().get_all_stories()
    }

    pub fn has_more(&self) -> bool {
        matches!(self.mediator.cursor(), Cursor::Next(_))
    }

    pub fn status(&self) -> watch::Receiver<FeedStatus> {
        self.mediator.status()
    }

    /// Bumped whenever the cached window changes.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.mediator.changes()
    }

    async fn run(&self, direction: LoadDirection) -> LoadOutcome {
        let outcome = self.mediator.load(direction).await;

        if let Ok(mut last) = self.last_failed.lock() {
            match &outcome {
                LoadOutcome::Failed(_) => *last = Some(direction),
                LoadOutcome::Applied { .. } => *last = None,
                LoadOutcome::Skipped(_) | LoadOutcome::Superseded => {}
            }
        }

        outcome
    }
}
