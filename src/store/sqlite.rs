use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use rusqlite_migration::{Migrations, M};

use crate::app::{Result, StorylineError};
use crate::domain::{RemoteKeys, Story};
use crate::store::{PrefEdit, PreferenceStore, StoryCache};

const STORY_COLUMNS: &str = "id, name, description, photo_url, created_at, lat, lon";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<()> {
        let migrations = Migrations::new(vec![M::up(include_str!(
            "../../migrations/001-initial/up.sql"
        ))]);

        let mut conn = self.conn()?;

        conn.execute("PRAGMA foreign_keys = ON", [])?;
        migrations
            .to_latest(&mut conn)
            .map_err(|_| StorylineError::Database(rusqlite::Error::InvalidQuery))?;

        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| {
            StorylineError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(1),
                Some(e.to_string()),
            ))
        })
    }

    fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| s.parse::<DateTime<Utc>>().ok())
    }

    fn story_from_row(row: &Row<'_>) -> rusqlite::Result<Story> {
        Ok(Story {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            photo_url: row.get(3)?,
            created_at: row
                .get::<_, String>(4)
                .ok()
                .and_then(|s| Self::parse_datetime(&s))
                .unwrap_or_else(Utc::now),
            lat: row.get(5)?,
            lon: row.get(6)?,
        })
    }

    fn keys_from_row(row: &Row<'_>) -> rusqlite::Result<RemoteKeys> {
        Ok(RemoteKeys {
            prev_key: row.get(0)?,
            next_key: row.get(1)?,
        })
    }

    /// Stories of a page that are not cached yet, first occurrence wins.
    fn fresh_stories<'a>(conn: &Connection, stories: &'a [Story]) -> Result<Vec<&'a Story>> {
        let mut seen = HashSet::new();
        let mut fresh = Vec::with_capacity(stories.len());

        for story in stories {
            if !seen.insert(story.id.as_str()) {
                tracing::debug!("Dropping duplicate story {} within page", story.id);
                continue;
            }
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM stories WHERE id = ?1)",
                params![story.id],
                |row| row.get(0),
            )?;
            if exists {
                tracing::debug!("Story {} already cached, keeping first occurrence", story.id);
                continue;
            }
            fresh.push(story);
        }

        Ok(fresh)
    }

    fn insert_from(
        conn: &Connection,
        stories: &[&Story],
        keys: RemoteKeys,
        first_position: i64,
    ) -> Result<usize> {
        for (offset, story) in stories.iter().enumerate() {
            conn.execute(
                "INSERT INTO stories (id, position, name, description, photo_url, created_at, lat, lon)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    story.id,
                    first_position + offset as i64,
                    story.name,
                    story.description,
                    story.photo_url,
                    story.created_at.to_rfc3339(),
                    story.lat,
                    story.lon
                ],
            )?;
            conn.execute(
                "INSERT OR REPLACE INTO remote_keys (id, prev_key, next_key) VALUES (?1, ?2, ?3)",
                params![story.id, keys.prev_key, keys.next_key],
            )?;
        }

        Ok(stories.len())
    }
}

impl StoryCache for SqliteStore {
    fn replace_all(&self, stories: &[Story], keys: RemoteKeys) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM remote_keys", [])?;
        tx.execute("DELETE FROM stories", [])?;

        let fresh = Self::fresh_stories(&tx, stories)?;
        let count = Self::insert_from(&tx, &fresh, keys, 1)?;

        tx.commit()?;
        Ok(count)
    }

    fn append(&self, stories: &[Story], keys: RemoteKeys) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let last: i64 = tx.query_row("SELECT COALESCE(MAX(position), 0) FROM stories", [], |row| {
            row.get(0)
        })?;
        let fresh = Self::fresh_stories(&tx, stories)?;
        let count = Self::insert_from(&tx, &fresh, keys, last + 1)?;

        // The last story carries the feed cursor, so a page with nothing new
        // still moves it on
        if count == 0 {
            tx.execute(
                "UPDATE remote_keys SET next_key = ?1
                 WHERE id = (SELECT id FROM stories ORDER BY position DESC LIMIT 1)",
                params![keys.next_key],
            )?;
        }

        tx.commit()?;
        Ok(count)
    }

    fn prepend(&self, stories: &[Story], keys: RemoteKeys) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let first: i64 = tx.query_row("SELECT COALESCE(MIN(position), 1) FROM stories", [], |row| {
            row.get(0)
        })?;
        let fresh = Self::fresh_stories(&tx, stories)?;
        let count = Self::insert_from(&tx, &fresh, keys, first - fresh.len() as i64)?;

        tx.commit()?;
        Ok(count)
    }

    fn clear(&self) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM remote_keys", [])?;
        tx.execute("DELETE FROM stories", [])?;
        tx.commit()?;
        Ok(())
    }

    fn get_story(&self, id: &str) -> Result<Option<Story>> {
        let conn = self.conn()?;

        let result = conn
            .query_row(
                &format!("SELECT {} FROM stories WHERE id = ?1", STORY_COLUMNS),
                params![id],
                Self::story_from_row,
            )
            .optional()?;

        Ok(result)
    }

    fn get_stories(&self, offset: usize, limit: usize) -> Result<Vec<Story>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM stories ORDER BY position LIMIT ?1 OFFSET ?2",
            STORY_COLUMNS
        ))?;

        let stories = stmt
            .query_map(params![limit as i64, offset as i64], Self::story_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(stories)
    }

    fn get_all_stories(&self) -> Result<Vec<Story>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM stories ORDER BY position",
            STORY_COLUMNS
        ))?;

        let stories = stmt
            .query_map([], Self::story_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(stories)
    }

    fn story_count(&self) -> Result<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM stories", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn story_exists(&self, id: &str) -> Result<bool> {
        let conn = self.conn()?;

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM stories WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )?;

        Ok(count > 0)
    }

    fn remote_keys(&self, id: &str) -> Result<Option<RemoteKeys>> {
        let conn = self.conn()?;

        let result = conn
            .query_row(
                "SELECT prev_key, next_key FROM remote_keys WHERE id = ?1",
                params![id],
                Self::keys_from_row,
            )
            .optional()?;

        Ok(result)
    }

    fn first_remote_keys(&self) -> Result<Option<RemoteKeys>> {
        let conn = self.conn()?;

        let result = conn
            .query_row(
                "SELECT k.prev_key, k.next_key FROM stories s
                 JOIN remote_keys k ON k.id = s.id
                 ORDER BY s.position ASC LIMIT 1",
                [],
                Self::keys_from_row,
            )
            .optional()?;

        Ok(result)
    }

    fn last_remote_keys(&self) -> Result<Option<RemoteKeys>> {
        let conn = self.conn()?;

        let result = conn
            .query_row(
                "SELECT k.prev_key, k.next_key FROM stories s
                 JOIN remote_keys k ON k.id = s.id
                 ORDER BY s.position DESC LIMIT 1",
                [],
                Self::keys_from_row,
            )
            .optional()?;

        Ok(result)
    }
}

impl PreferenceStore for SqliteStore {
    fn load_preferences(&self) -> Result<HashMap<String, String>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare("SELECT key, value FROM preferences")?;
        let prefs = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<std::result::Result<HashMap<_, _>, _>>()?;

        Ok(prefs)
    }

    fn apply_preferences(&self, edits: &[PrefEdit]) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        for edit in edits {
            match edit {
                PrefEdit::Set(key, value) => {
                    tx.execute(
                        "INSERT INTO preferences (key, value) VALUES (?1, ?2)
                         ON CONFLICT(key) DO UPDATE SET value = ?2",
                        params![key, value],
                    )?;
                }
                PrefEdit::Remove(key) => {
                    tx.execute("DELETE FROM preferences WHERE key = ?1", params![key])?;
                }
            }
        }

        tx.commit()?;
        Ok(())
    }
}
