use futures::stream::{self, Stream};
use tokio::sync::watch;

use crate::session::Preferences;

/// A typed view over the preference snapshot.
///
/// Reading never blocks. [`Watch::changed`] resolves once the projected value
/// differs from the last one handed out, so a dark-mode toggle does not wake
/// a login observer.
pub struct Watch<T> {
    rx: watch::Receiver<Preferences>,
    project: fn(&Preferences) -> T,
    last: T,
}

impl<T: Clone + PartialEq> Watch<T> {
    pub(crate) fn new(rx: watch::Receiver<Preferences>, project: fn(&Preferences) -> T) -> Self {
        let last = project(&rx.borrow());
        Self { rx, project, last }
    }

    /// Current value.
    pub fn get(&self) -> T {
        (self.project)(&self.rx.borrow())
    }

    /// Wait for the next distinct value. Returns `None` once the store is gone.
    pub async fn changed(&mut self) -> Option<T> {
        loop {
            self.rx.changed().await.ok()?;
            let value = (self.project)(&self.rx.borrow_and_update());
            if value != self.last {
                self.last = value.clone();
                return Some(value);
            }
        }
    }

    /// Stream of the current value followed by every later distinct value.
    pub fn into_stream(mut self) -> impl Stream<Item = T>
    where
        T: Send + 'static,
    {
        let current = (self.project)(&self.rx.borrow_and_update());
        self.last = current.clone();

        stream::unfold((self, Some(current)), |(mut watch, pending)| async move {
            match pending {
                Some(value) => Some((value, (watch, None))),
                None => {
                    let value = watch.changed().await?;
                    Some((value, (watch, None)))
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::session::SessionStore;
    use crate::store::SqliteStore;
    use std::sync::Arc;

    #[test]
    fn test_changed_sees_write_made_before_polling() {
        let prefs = Arc::new(SqliteStore::in_memory().unwrap());
        let store = SessionStore::with_default_language(prefs, "en").unwrap();
        let mut language = store.language();

        store.set_language("id").unwrap();

        assert_eq!(tokio_test::block_on(language.changed()), Some("id".to_string()));
        assert_eq!(language.get(), "id");
    }

    #[test]
    fn test_changed_ends_when_store_dropped() {
        let prefs = Arc::new(SqliteStore::in_memory().unwrap());
        let store = SessionStore::with_default_language(prefs, "en").unwrap();
        let mut dark = store.dark_mode();
        drop(store);

        assert_eq!(tokio_test::block_on(dark.changed()), None);
    }
}
