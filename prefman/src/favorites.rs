use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use once_cell::sync::OnceCell;

use crate::store::PreferenceStore;

/// Store key holding the JSON array of favorite package names
pub const FAVORITES_KEY: &'static str = "FAVORITES_KEY";

/// The set of packages the user pinned to the top of the list
///
/// The set is loaded from the store on first use and written back on every
/// change. An empty set removes the key entirely.
pub struct Favorites {
    store: Arc<dyn PreferenceStore>,
    set: OnceCell<Mutex<BTreeSet<String>>>,
}

impl Favorites {
    pub fn new(store: Arc<dyn PreferenceStore>) -> Self {
        Self {
            store,
            set: OnceCell::new(),
        }
    }

    fn get_set(&self) -> &Mutex<BTreeSet<String>> {
        self.set.get_or_init(|| Mutex::new(load_favorites(self.store.as_ref())))
    }

    pub fn is_favorite(&self, package: &str) -> bool {
        self.get_set().lock().expect("poisoned").contains(package)
    }

    /// All favorites, sorted by package name
    pub fn all(&self) -> Vec<String> {
        self.get_set()
            .lock()
            .expect("poisoned")
            .iter()
            .cloned()
            .collect()
    }

    /// Add or remove `package` and persist the result
    pub fn set_favorite(&self, package: &str, favorite: bool) -> crate::Result<()> {
        let mut set = self.get_set().lock().expect("poisoned");
        if set.contains(package) == favorite {
            return Ok(());
        }

        let mut updated = set.clone();
        if favorite {
            updated.insert(String::from(package));
        } else {
            updated.remove(package);
        }

        log::debug!("favorite {} -> {}", package, favorite);
        if updated.is_empty() {
            self.store.remove(FAVORITES_KEY)?;
        } else {
            let json = serde_json::to_string(&updated)?;
            self.store.put_string(FAVORITES_KEY, &json)?;
        }
        *set = updated;
        Ok(())
    }
}

fn load_favorites(store: &dyn PreferenceStore) -> BTreeSet<String> {
    let raw = match store.get_string(FAVORITES_KEY) {
        Some(v) => v,
        None => return BTreeSet::new(),
    };
    match serde_json::from_str::<Vec<String>>(&raw) {
        Ok(v) => v.into_iter().collect(),
        Err(e) => {
            log::error!("invalid favorites list: {}", e);
            BTreeSet::new()
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::store::JsonPreferenceStore;
    use crate::testing::{tmp_context, TestContext};
    use rstest::*;
    use std::fs;

    #[fixture]
    fn store() -> Arc<JsonPreferenceStore> {
        Arc::new(JsonPreferenceStore::in_memory())
    }

    #[rstest]
    fn test_set_favorite(store: Arc<JsonPreferenceStore>) {
        let favorites = Favorites::new(store.clone());
        assert!(!favorites.is_favorite("com.example.app"));

        favorites
            .set_favorite("com.example.app", true)
            .expect("add favorite");
        favorites
            .set_favorite("com.android.settings", true)
            .expect("add favorite");
        assert!(favorites.is_favorite("com.example.app"));
        assert_eq!(
            favorites.all(),
            vec!["com.android.settings", "com.example.app"]
        );
        assert_eq!(
            store.get_string(FAVORITES_KEY).as_deref(),
            Some(r#"["com.android.settings","com.example.app"]"#)
        );

        let reloaded = Favorites::new(store.clone());
        assert!(reloaded.is_favorite("com.android.settings"));
    }

    #[rstest]
    fn test_removing_last_removes_key(store: Arc<JsonPreferenceStore>) {
        let favorites = Favorites::new(store.clone());
        favorites.set_favorite("com.example.app", true).expect("add");
        assert!(store.contains(FAVORITES_KEY));
        favorites
            .set_favorite("com.example.app", false)
            .expect("remove");
        assert!(!store.contains(FAVORITES_KEY));
        assert!(favorites.all().is_empty());

        // Removing something that isn't there is fine
        favorites.set_favorite("com.nope", false).expect("remove missing");
    }

    #[rstest]
    fn test_malformed_is_empty(store: Arc<JsonPreferenceStore>) {
        store
            .put_string(FAVORITES_KEY, "{\"not\": \"an array\"}")
            .expect("put");
        let favorites = Favorites::new(store);
        assert!(favorites.all().is_empty());
        favorites.set_favorite("com.example.app", true).expect("add");
        assert_eq!(favorites.all(), vec!["com.example.app"]);
    }

    #[rstest]
    fn test_failed_write_keeps_set(tmp_context: TestContext) {
        let dir = tmp_context.to_abs("prefs");
        fs::create_dir_all(&dir).expect("create prefs dir");
        let store = Arc::new(
            JsonPreferenceStore::open(&dir.join("preferences.json")).expect("open store"),
        );
        let favorites = Favorites::new(store.clone());
        favorites.set_favorite("com.kept", true).expect("add while writable");

        fs::remove_dir_all(&dir).expect("remove prefs dir");
        fs::write(&dir, "not a dir").expect("replace prefs dir");

        assert!(favorites.set_favorite("com.x", true).is_err());
        assert!(!favorites.is_favorite("com.x"));
        assert!(favorites.set_favorite("com.kept", false).is_err());
        assert!(favorites.is_favorite("com.kept"));
        assert_eq!(
            store.get_string(FAVORITES_KEY).as_deref(),
            Some(r#"["com.kept"]"#)
        );
    }
}
