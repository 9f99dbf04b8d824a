//! # Storyline
//!
//! An offline-first client for a photo story sharing service.
//!
//! ## Architecture
//!
//! ```text
//! API client → Feed mediator → Story cache → Pager
//!      ↑
//! Auth interceptor ← Session store
//! ```
//!
//! Every user-facing operation goes through the [`repository`], which turns
//! API calls into a stream of [`ResultState`](result::ResultState) values:
//! `Loading` first, then exactly one `Success` or `Error`.
//!
//! ## Quick Start
//!
//! ```bash
//! storyline register --name Ana --email ana@example.com --password hunter22
//! storyline login --email ana@example.com --password hunter22
//! storyline feed
//! storyline feed --more
//! storyline upload beach.jpg -d "Sunset at the pier" --lat -8.65 --lon 115.13
//! ```

/// Application context and error handling.
///
/// The [`AppContext`](app::AppContext) struct wires together the store,
/// session, API client and repository.
pub mod app;

/// Remote story service.
///
/// - [`StoryApi`](api::StoryApi): Async trait for the service endpoints
/// - [`HttpStoryApi`](api::HttpStoryApi): reqwest-based implementation
/// - [`AuthInterceptor`](api::AuthInterceptor): Attaches the bearer token
pub mod api;

/// Command-line interface using clap.
pub mod cli;

/// Configuration loaded from `~/.config/storyline/config.toml`.
pub mod config;

/// Core domain models (Story, RemoteKeys, Session, Settings).
pub mod domain;

/// Paginated story feed backed by the local cache.
pub mod paging;

pub mod repository;

/// Loading/success/error states and failure classification.
pub mod result;

/// Persisted session and user settings with change notification.
pub mod session;

/// SQLite persistence layer.
///
/// - [`StoryCache`](store::StoryCache): Ordered story cache with page keys
/// - [`PreferenceStore`](store::PreferenceStore): Key/value preferences
/// - [`SqliteStore`](store::SqliteStore): SQLite implementation of both
pub mod store;
