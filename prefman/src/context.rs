use blanket::blanket;
use once_cell::sync::OnceCell;
use std::env;
use std::path::PathBuf;

use directories::BaseDirs;
use which::{which, which_in};

use crate::config::Config;
use crate::utils::ensure_dir_exists;
use crate::Error;

use std::ops::DerefMut;
use std::sync::Mutex;

#[derive(Clone)]
struct CachedBin {
    name: String,
    path: String,
}

fn wrapped_which(bin: &str) -> Option<PathBuf> {
    if let Ok(search_path) = env::var("PREFMAN_PATH") {
        let cwd = env::current_dir().ok()?;
        return which_in(bin, Some(&search_path), &cwd).ok();
    }
    which(bin).ok()
}

#[inline(always)]
fn find_program(prog: &str) -> Option<String> {
    wrapped_which(prog).map(|it| it.to_string_lossy().into())
}

/// Context is a trait for an object that can help standardize file locations,
/// find binaries, and lookup env vars.
///
/// Most methods on this trait have a default implementation that is perfectly
/// safe to leave unchanged.
#[blanket(derive(Ref, Box))]
pub trait Context: Send + Sync {
    fn maybe_get_env(&self, key: &str) -> Option<String> {
        env::var(key).ok()
    }

    fn maybe_get_bin(&self, bin: &str) -> Option<String> {
        find_program(bin)
    }

    fn has_bin(&self, bin: &str) -> bool {
        self.maybe_get_bin(bin).is_some()
    }

    fn get_bin(&self, bin: &str) -> crate::Result<String> {
        self.maybe_get_bin(bin)
            .ok_or_else(|| Error::MissingBin(bin.into()))
    }

    fn has_env(&self, key: &str) -> bool {
        self.maybe_get_env(key).is_some()
    }

    fn get_env(&self, key: &str) -> crate::Result<String> {
        self.maybe_get_env(key)
            .ok_or_else(|| Error::MissingEnv(key.into()))
    }

    /// The parsed configuration file, `None` if there isn't one
    fn get_config<'a>(&'a self) -> crate::Result<Option<&'a Config>>;

    /// `$PREFMAN_CONFIG` if set, otherwise `prefman.toml` in the user
    /// config directory
    fn get_config_file(&self) -> crate::Result<PathBuf> {
        if let Some(path) = self.maybe_get_env("PREFMAN_CONFIG") {
            return Ok(PathBuf::from(path));
        }
        Ok(self.get_user_config_dir()?.join("prefman.toml"))
    }

    /// Directory holding everything we persist, `$PREFMAN_HOME` overrides
    /// the platform default. Created if needed.
    fn get_data_dir(&self) -> crate::Result<PathBuf> {
        let dir = match self.maybe_get_env("PREFMAN_HOME") {
            Some(home) => PathBuf::from(home),
            None => self.get_user_local_dir()?,
        };
        ensure_dir_exists(&dir)?;
        Ok(dir)
    }

    fn get_data_dir_child(&self, child: &str) -> crate::Result<PathBuf> {
        self.get_data_dir().map(|x| x.join(child))
    }

    /// The key/value preference file
    fn get_preferences_file(&self) -> crate::Result<PathBuf> {
        self.get_data_dir_child("preferences.json")
    }

    /// Private flat file storage for backup contents
    fn get_backups_dir(&self) -> crate::Result<PathBuf> {
        let dir = self.get_data_dir_child("backups")?;
        ensure_dir_exists(&dir)?;
        Ok(dir)
    }

    fn get_log_file(&self) -> crate::Result<PathBuf> {
        self.get_data_dir_child("log")
    }

    fn get_user_local_dir(&self) -> crate::Result<PathBuf> {
        let bd = BaseDirs::new().ok_or(Error::NoBaseDirs)?;
        Ok(bd.data_local_dir().join("prefman"))
    }

    fn get_user_config_dir(&self) -> crate::Result<PathBuf> {
        let bd = BaseDirs::new().ok_or(Error::NoBaseDirs)?;
        Ok(bd.config_dir().join("prefman"))
    }
}

pub struct DefaultContext {
    bin_cache: Mutex<Vec<CachedBin>>,
    config: OnceCell<Option<Config>>,
}

impl Clone for DefaultContext {
    fn clone(&self) -> Self {
        let cache = self.bin_cache.lock().expect("failed to lock");
        Self {
            bin_cache: Mutex::new(cache.clone()),
            config: self.config.clone(),
        }
    }
}

impl DefaultContext {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for DefaultContext {
    fn default() -> Self {
        Self {
            bin_cache: Mutex::new(Vec::new()),
            config: OnceCell::new(),
        }
    }
}

impl Context for DefaultContext {
    fn get_config<'a>(&'a self) -> crate::Result<Option<&'a Config>> {
        let cfg = self
            .config
            .get_or_try_init(|| -> crate::Result<Option<Config>> {
                let path = self.get_config_file()?;
                if !path.exists() {
                    log::debug!("no config file at {}", path.display());
                    Ok(None)
                } else {
                    Ok(Some(Config::parse(&path)?))
                }
            })?;
        Ok(cfg.as_ref())
    }

    fn maybe_get_bin(&self, prog: &str) -> Option<String> {
        let mut cache_guard = self.bin_cache.lock().expect("failed to lock");
        let cache = cache_guard.deref_mut();
        if let Some(val) = cache.iter().find(|it| it.name == prog) {
            return Some(val.path.clone());
        }

        let found = find_program(prog)?;

        cache.push(CachedBin {
            name: prog.into(),
            path: found.clone(),
        });

        Some(found)
    }
}
