use serde::{Deserialize, Serialize};

/// The logged-in user as persisted by the session store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub name: String,
    pub token: String,
    pub logged_in: bool,
}

impl Session {
    pub fn new(
        user_id: impl Into<String>,
        name: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            name: name.into(),
            token: token.into(),
            logged_in: true,
        }
    }
}

/// User settings. These outlive the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub dark_mode: bool,
    pub language: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            dark_mode: false,
            language: system_language(),
        }
    }
}

/// Language part of the process locale, `en` when none is configured.
pub fn system_language() -> String {
    ["LC_ALL", "LC_MESSAGES", "LANG"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find_map(|value| language_from_locale(&value))
        .unwrap_or_else(|| "en".to_string())
}

fn language_from_locale(locale: &str) -> Option<String> {
    let lang = locale
        .split(['_', '.', '@', '-'])
        .next()
        .unwrap_or("")
        .trim()
        .to_lowercase();

    if lang.is_empty() || lang == "c" || lang == "posix" {
        None
    } else {
        Some(lang)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_logged_in() {
        let session = Session::new("user-1", "Ana", "tok");
        assert!(session.logged_in);
        assert_eq!(session.token, "tok");
    }

    #[test]
    fn test_default_session_is_logged_out() {
        let session = Session::default();
        assert!(!session.logged_in);
        assert!(session.token.is_empty());
    }

    #[test]
    fn test_language_from_locale() {
        assert_eq!(language_from_locale("id_ID.UTF-8"), Some("id".into()));
        assert_eq!(language_from_locale("en"), Some("en".into()));
        assert_eq!(language_from_locale("pt-BR"), Some("pt".into()));
        assert_eq!(language_from_locale("C"), None);
        assert_eq!(language_from_locale("POSIX"), None);
        assert_eq!(language_from_locale(""), None);
    }
}
