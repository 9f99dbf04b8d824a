use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A story as served by the feed, the detail endpoint and the location list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Story {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub photo_url: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
}

impl Story {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            photo_url: String::new(),
            created_at: Utc::now(),
            lat: None,
            lon: None,
        }
    }

    pub fn location(&self) -> Option<(f64, f64)> {
        self.lat.zip(self.lon)
    }

    pub fn has_location(&self) -> bool {
        self.location().is_some()
    }

    pub fn display_description(&self) -> &str {
        if self.description.trim().is_empty() {
            "(No description)"
        } else {
            &self.description
        }
    }
}

/// Page bookkeeping stored next to every cached story.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RemoteKeys {
    pub prev_key: Option<u32>,
    pub next_key: Option<u32>,
}

impl RemoteKeys {
    /// Keys for a story that arrived with `page`. `end_of_feed` clears the next key.
    pub fn for_page(page: u32, end_of_feed: bool) -> Self {
        Self {
            prev_key: if page <= 1 { None } else { Some(page - 1) },
            next_key: if end_of_feed { None } else { Some(page + 1) },
        }
    }
}

/// A story waiting to be uploaded.
#[derive(Debug, Clone)]
pub struct NewStory {
    pub photo: Vec<u8>,
    pub file_name: String,
    pub description: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}
