use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;

use crate::api::StoryApi;
use crate::app::{Result, StorylineError};
use crate::domain::RemoteKeys;
use crate::result::{ErrorKind, FailurePolicy};
use crate::store::StoryCache;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadDirection {
    /// Replace the cache with page 1.
    Refresh,
    Append,
    Prepend,
}

/// Next page to append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cursor {
    /// Nothing loaded in this session yet.
    Unloaded,
    Next(u32),
    End,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeedStatus {
    Idle,
    Loading(LoadDirection),
    Applied {
        direction: LoadDirection,
        inserted: usize,
    },
    Failed {
        direction: LoadDirection,
        error: ErrorKind,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Another fetch is in flight.
    Busy,
    EndOfFeed,
    NotLoaded,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    Applied { inserted: usize, end_of_feed: bool },
    Skipped(SkipReason),
    /// A refresh took over before this load could write.
    Superseded,
    Failed(ErrorKind),
}

struct Inner {
    cursor: Cursor,
    in_flight: Option<LoadDirection>,
}

/// Keeps the local story cache in step with the remote feed.
///
/// Only one fetch runs at a time. Appends and prepends that arrive while a
/// fetch is in flight are dropped; a refresh cancels an in-flight append or
/// prepend. Writes happen in one transaction after the page has arrived, so a
/// failed fetch leaves the cache untouched.
pub struct FeedMediator<C> {
    api: Arc<dyn StoryApi + Send + Sync>,
    cache: Arc<C>,
    page_size: u32,
    inner: Mutex<Inner>,
    generation: watch::Sender<u64>,
    status: watch::Sender<FeedStatus>,
    version: watch::Sender<u64>,
}

impl<C: StoryCache + Send + Sync> FeedMediator<C> {
    pub fn new(api: Arc<dyn StoryApi + Send + Sync>, cache: Arc<C>, page_size: u32) -> Result<Self> {
        let cursor = match cache.last_remote_keys()? {
            Some(keys) => keys.next_key.map(Cursor::Next).unwrap_or(Cursor::End),
            None => Cursor::Unloaded,
        };
        tracing::debug!("Feed session starts with cursor {:?}", cursor);

        let (generation, _) = watch::channel(0);
        let (status, _) = watch::channel(FeedStatus::Idle);
        let (version, _) = watch::channel(0);

        Ok(Self {
            api,
            cache,
            page_size: page_size.max(1),
            inner: Mutex::new(Inner {
                cursor,
                in_flight: None,
            }),
            generation,
            status,
            version,
        })
    }

    pub fn cache(&self) -> &Arc<C> {
        &self.cache
    }

    pub fn cursor(&self) -> Cursor {
        self.lock().map(|inner| inner.cursor).unwrap_or(Cursor::Unloaded)
    }

    pub fn is_loading(&self) -> bool {
        self.lock()
            .map(|inner| inner.in_flight.is_some())
            .unwrap_or(false)
    }

    pub fn status(&self) -> watch::Receiver<FeedStatus> {
        self.status.subscribe()
    }

    /// Counter bumped after every cache write.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    pub async fn refresh(&self) -> LoadOutcome {
        self.load(LoadDirection::Refresh).await
    }

    pub async fn append(&self) -> LoadOutcome {
        self.load(LoadDirection::Append).await
    }

    pub async fn prepend(&self) -> LoadOutcome {
        self.load(LoadDirection::Prepend).await
    }

    pub async fn load(&self, direction: LoadDirection) -> LoadOutcome {
        let mut ticket = match self.begin(direction) {
            Ok(ticket) => ticket,
            Err(outcome) => return outcome,
        };
        let (generation, page) = (ticket.generation, ticket.page);

        let mut cancelled = self.generation.subscribe();
        let response = tokio::select! {
            biased;
            _ = superseded(&mut cancelled, generation) => {
                tracing::debug!("{:?} of page {} superseded by refresh", direction, page);
                return LoadOutcome::Superseded;
            }
            response = self.api.list_stories(page, self.page_size) => response,
        };

        let mut inner = match self.lock() {
            Ok(inner) => inner,
            Err(e) => return LoadOutcome::Failed(ErrorKind::Api(e.to_string())),
        };

        // A refresh may have started between the response and this lock
        if *self.generation.borrow() != generation {
            return LoadOutcome::Superseded;
        }
        inner.in_flight = None;
        ticket.settled = true;

        let stories = match FailurePolicy::new().interpret(response) {
            Ok(response) => response.list_story,
            Err(error) => return self.fail(direction, error),
        };

        let end_of_feed = stories.len() < self.page_size as usize;
        let written = match direction {
            LoadDirection::Refresh => self
                .cache
                .replace_all(&stories, RemoteKeys::for_page(page, end_of_feed)),
            LoadDirection::Append => self
                .cache
                .append(&stories, RemoteKeys::for_page(page, end_of_feed)),
            // A prepended page always has the current first page after it
            LoadDirection::Prepend => self
                .cache
                .prepend(&stories, RemoteKeys::for_page(page, false)),
        };

        let inserted = match written {
            Ok(inserted) => inserted,
            Err(e) => return self.fail(direction, ErrorKind::Api(e.to_string())),
        };

        if direction != LoadDirection::Prepend {
            inner.cursor = if end_of_feed {
                Cursor::End
            } else {
                Cursor::Next(page + 1)
            };
        }
        drop(inner);

        tracing::info!(
            "{:?} applied page {}: {} new stories{}",
            direction,
            page,
            inserted,
            if end_of_feed { ", end of feed" } else { "" }
        );
        self.version.send_modify(|v| *v += 1);
        self.status.send_replace(FeedStatus::Applied {
            direction,
            inserted,
        });

        LoadOutcome::Applied {
            inserted,
            end_of_feed: end_of_feed && direction != LoadDirection::Prepend,
        }
    }

    /// Claim the session for `direction` and pick the page to fetch.
    fn begin(&self, direction: LoadDirection) -> std::result::Result<InFlight<'_, C>, LoadOutcome> {
        let mut inner = self
            .lock()
            .map_err(|e| LoadOutcome::Failed(ErrorKind::Api(e.to_string())))?;

        if let Some(current) = inner.in_flight {
            if direction == LoadDirection::Refresh && current != LoadDirection::Refresh {
                tracing::debug!("Refresh cancels in-flight {:?}", current);
            } else {
                return Err(LoadOutcome::Skipped(SkipReason::Busy));
            }
        }

        let page = match direction {
            LoadDirection::Refresh => 1,
            LoadDirection::Append => match inner.cursor {
                Cursor::Next(page) => page,
                Cursor::End => return Err(LoadOutcome::Skipped(SkipReason::EndOfFeed)),
                Cursor::Unloaded => return Err(LoadOutcome::Skipped(SkipReason::NotLoaded)),
            },
            LoadDirection::Prepend => match self.cache.first_remote_keys() {
                Ok(Some(RemoteKeys {
                    prev_key: Some(page),
                    ..
                })) => page,
                Ok(Some(_)) => return Err(LoadOutcome::Skipped(SkipReason::EndOfFeed)),
                Ok(None) => return Err(LoadOutcome::Skipped(SkipReason::NotLoaded)),
                Err(e) => return Err(LoadOutcome::Failed(ErrorKind::Api(e.to_string()))),
            },
        };

        if direction == LoadDirection::Refresh {
            self.generation.send_modify(|g| *g += 1);
        }
        inner.in_flight = Some(direction);
        self.status.send_replace(FeedStatus::Loading(direction));

        Ok(InFlight {
            mediator: self,
            direction,
            generation: *self.generation.borrow(),
            page,
            settled: false,
        })
    }

    fn fail(&self, direction: LoadDirection, error: ErrorKind) -> LoadOutcome {
        tracing::warn!("{:?} failed: {}", direction, error);
        self.status.send_replace(FeedStatus::Failed {
            direction,
            error: error.clone(),
        });
        LoadOutcome::Failed(error)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|e| StorylineError::Other(format!("Feed state poisoned: {}", e)))
    }
}

/// Claim on the session for one load.
///
/// A load whose future is dropped before the response is handled releases the
/// claim here, unless a refresh has already taken the session over.
struct InFlight<'a, C> {
    mediator: &'a FeedMediator<C>,
    direction: LoadDirection,
    generation: u64,
    page: u32,
    settled: bool,
}

impl<C> Drop for InFlight<'_, C> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let Ok(mut inner) = self.mediator.inner.lock() else {
            return;
        };
        if *self.mediator.generation.borrow() == self.generation
            && inner.in_flight == Some(self.direction)
        {
            tracing::debug!(
                "{:?} of page {} dropped before completion",
                self.direction,
                self.page
            );
            inner.in_flight = None;
            self.mediator.status.send_replace(FeedStatus::Idle);
        }
    }
}

/// Resolves once the generation moves past `generation`.
async fn superseded(rx: &mut watch::Receiver<u64>, generation: u64) {
    loop {
        if *rx.borrow_and_update() != generation {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
