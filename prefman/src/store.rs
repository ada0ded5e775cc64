use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::{Map, Value};

use crate::utils::{read_file, write_file_atomic};
use crate::Context;

/// A persisted key/value store, the host side stand-in for Android's
/// default `SharedPreferences`
pub trait PreferenceStore: Send + Sync {
    fn contains(&self, key: &str) -> bool;

    fn get_string(&self, key: &str) -> Option<String>;

    fn get_bool(&self, key: &str, default: bool) -> bool;

    fn put_string(&self, key: &str, value: &str) -> crate::Result<()>;

    fn put_bool(&self, key: &str, value: bool) -> crate::Result<()>;

    fn remove(&self, key: &str) -> crate::Result<()>;
}

/// [PreferenceStore] kept as a single JSON object on disk
///
/// Every mutation rewrites the file before returning.
pub struct JsonPreferenceStore {
    path: Option<PathBuf>,
    values: Mutex<Map<String, Value>>,
}

impl JsonPreferenceStore {
    /// Open the store at `path`. A missing file is an empty store, and so
    /// is one that doesn't hold a JSON object.
    pub fn open(path: &Path) -> crate::Result<Self> {
        let values = match read_file(path) {
            Ok(content) => match serde_json::from_str::<Map<String, Value>>(&content) {
                Ok(v) => v,
                Err(e) => {
                    log::error!("error parsing JSON in {}: {}", path.display(), e);
                    Map::new()
                }
            },
            Err(crate::Error::MissingFile(_)) => Map::new(),
            Err(e) => return Err(e),
        };

        Ok(Self {
            path: Some(PathBuf::from(path)),
            values: Mutex::new(values),
        })
    }

    /// Open the store in the context's data directory
    pub fn from_ctx(ctx: &dyn Context) -> crate::Result<Self> {
        Self::open(&ctx.get_preferences_file()?)
    }

    /// A store that is never written anywhere
    pub fn in_memory() -> Self {
        Self {
            path: None,
            values: Mutex::new(Map::new()),
        }
    }

    fn update<F>(&self, f: F) -> crate::Result<()>
    where
        F: FnOnce(&mut Map<String, Value>),
    {
        let mut values = self.values.lock().expect("poisoned");
        // Only a successful write changes what readers see
        let mut updated = values.clone();
        f(&mut updated);
        if let Some(path) = &self.path {
            let content = serde_json::to_vec_pretty(&updated)?;
            write_file_atomic(path, &content)?;
        }
        *values = updated;
        Ok(())
    }
}

impl PreferenceStore for JsonPreferenceStore {
    fn contains(&self, key: &str) -> bool {
        self.values.lock().expect("poisoned").contains_key(key)
    }

    fn get_string(&self, key: &str) -> Option<String> {
        let values = self.values.lock().expect("poisoned");
        values.get(key)?.as_str().map(String::from)
    }

    fn get_bool(&self, key: &str, default: bool) -> bool {
        let values = self.values.lock().expect("poisoned");
        values
            .get(key)
            .and_then(|it| it.as_bool())
            .unwrap_or(default)
    }

    fn put_string(&self, key: &str, value: &str) -> crate::Result<()> {
        self.update(|values| {
            values.insert(key.into(), Value::String(value.into()));
        })
    }

    fn put_bool(&self, key: &str, value: bool) -> crate::Result<()> {
        self.update(|values| {
            values.insert(key.into(), Value::Bool(value));
        })
    }

    fn remove(&self, key: &str) -> crate::Result<()> {
        self.update(|values| {
            values.remove(key);
        })
    }
}

/// Store key for whether system applications are listed
pub const SHOW_SYSTEM_APPS: &'static str = "SHOW_SYSTEM_APPS";

pub fn show_system_apps(store: &dyn PreferenceStore) -> bool {
    store.get_bool(SHOW_SYSTEM_APPS, false)
}

pub fn set_show_system_apps(store: &dyn PreferenceStore, show: bool) -> crate::Result<()> {
    store.put_bool(SHOW_SYSTEM_APPS, show)
}
