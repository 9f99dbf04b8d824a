//! Durable session and settings storage with reactive reads.

mod watch;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::app::{Result, StorylineError};
use crate::domain::session::system_language;
use crate::domain::{Session, Settings};
use crate::store::{PrefEdit, PreferenceStore};

pub use self::watch::Watch;

pub const USER_ID: &str = "user_id";
pub const USER_NAME: &str = "user_name";
pub const TOKEN: &str = "token";
pub const IS_LOGIN: &str = "is_login";
pub const DARK_MODE: &str = "dark_mode";
pub const LANGUAGE: &str = "language";

/// In-memory snapshot of every persisted preference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preferences {
    pub session: Session,
    pub settings: Settings,
}

impl Preferences {
    fn from_map(map: &HashMap<String, String>, default_language: &str) -> Self {
        let text = |key: &str| map.get(key).cloned().unwrap_or_default();
        let flag = |key: &str| map.get(key).map(|v| v == "true").unwrap_or(false);

        Self {
            session: Session {
                user_id: text(USER_ID),
                name: text(USER_NAME),
                token: text(TOKEN),
                logged_in: flag(IS_LOGIN),
            },
            settings: Settings {
                dark_mode: flag(DARK_MODE),
                language: map
                    .get(LANGUAGE)
                    .cloned()
                    .unwrap_or_else(|| default_language.to_string()),
            },
        }
    }
}

/// Session and settings store.
///
/// Writes go to the [`PreferenceStore`] in one transaction and are published to
/// observers only after they commit. A writer lock serialises them.
pub struct SessionStore {
    prefs: Arc<dyn PreferenceStore + Send + Sync>,
    state: tokio::sync::watch::Sender<Preferences>,
    writer: Mutex<()>,
}

impl SessionStore {
    pub fn new(prefs: Arc<dyn PreferenceStore + Send + Sync>) -> Result<Self> {
        Self::with_default_language(prefs, &system_language())
    }

    pub fn with_default_language(
        prefs: Arc<dyn PreferenceStore + Send + Sync>,
        default_language: &str,
    ) -> Result<Self> {
        let initial = Preferences::from_map(&prefs.load_preferences()?, default_language);
        let (state, _) = tokio::sync::watch::channel(initial);

        Ok(Self {
            prefs,
            state,
            writer: Mutex::new(()),
        })
    }

    pub fn save_session(&self, session: &Session) -> Result<()> {
        let edits = vec![
            PrefEdit::set(USER_ID, session.user_id.as_str()),
            PrefEdit::set(USER_NAME, session.name.as_str()),
            PrefEdit::set(TOKEN, session.token.as_str()),
            PrefEdit::set(IS_LOGIN, "true"),
        ];
        let saved = Session {
            logged_in: true,
            ..session.clone()
        };

        self.write(&edits, |prefs| prefs.session = saved)?;
        tracing::info!("Saved session for user {}", session.user_id);
        Ok(())
    }

    /// Remove every session field. Settings are kept.
    pub fn logout(&self) -> Result<()> {
        let edits = [USER_ID, USER_NAME, TOKEN, IS_LOGIN].map(PrefEdit::remove);

        self.write(&edits, |prefs| prefs.session = Session::default())?;
        tracing::info!("Session cleared");
        Ok(())
    }

    /// Point-in-time token, empty when logged out.
    pub fn token(&self) -> String {
        self.state.borrow().session.token.clone()
    }

    pub fn session(&self) -> Session {
        self.state.borrow().session.clone()
    }

    pub fn settings(&self) -> Settings {
        self.state.borrow().settings.clone()
    }

    pub fn is_logged_in(&self) -> Watch<bool> {
        Watch::new(self.state.subscribe(), |prefs| prefs.session.logged_in)
    }

    pub fn dark_mode(&self) -> Watch<bool> {
        Watch::new(self.state.subscribe(), |prefs| prefs.settings.dark_mode)
    }

    pub fn set_dark_mode(&self, enabled: bool) -> Result<()> {
        self.write(&[PrefEdit::set(DARK_MODE, enabled.to_string())], |prefs| {
            prefs.settings.dark_mode = enabled
        })
    }

    pub fn language(&self) -> Watch<String> {
        Watch::new(self.state.subscribe(), |prefs| prefs.settings.language.clone())
    }

    pub fn set_language(&self, code: &str) -> Result<()> {
        let code = code.trim();
        if code.is_empty() {
            return Err(StorylineError::Other("Language code must not be empty".into()));
        }
        let owned = code.to_string();
        self.write(&[PrefEdit::set(LANGUAGE, code)], |prefs| {
            prefs.settings.language = owned
        })
    }

    fn write(&self, edits: &[PrefEdit], update: impl FnOnce(&mut Preferences)) -> Result<()> {
        let _guard = self
            .writer
            .lock()
            .map_err(|e| StorylineError::Other(format!("Session writer poisoned: {}", e)))?;

        self.prefs.apply_preferences(edits)?;
        self.state.send_modify(update);
        Ok(())
    }
}
