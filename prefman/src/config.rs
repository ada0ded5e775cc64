use std::fmt::Display;
use std::path::Path;
use std::{borrow::Cow, path::PathBuf};
use toml::{Table, Value};

use crate::discovery::DEFAULT_DATA_BASE;
use crate::utils::{path_must_str, read_file};
use crate::Context;

#[derive(Debug)]
pub enum Error {
    InvalidType,
    MissingKey,
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::InvalidType => "InvalidType",
                Self::MissingKey => "MissingKey",
            }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

pub struct ConfigMap<'c> {
    path: &'c Path,
    name: Option<Cow<'c, str>>,
    table: &'c Table,
}

/// How the device is reached
#[derive(Clone, Debug, PartialEq)]
pub enum DeviceAccessConfig {
    /// A live device over `adb`, the default
    Adb(AdbConfig),
    /// A filesystem dump of a device on the host
    Dump(DumpConfig),
}

impl Default for DeviceAccessConfig {
    fn default() -> Self {
        Self::Adb(AdbConfig::default())
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct AdbConfig {
    pub serial: Option<String>,
    pub executable: Option<String>,
}

impl AdbConfig {
    pub(crate) const CONFIG_KEY: &'static str = "adb";

    fn from_cfg_map(cfg: &ConfigMap) -> crate::Result<Self> {
        Ok(Self {
            serial: cfg.maybe_get_str_typecheck("serial")?.map(String::from),
            executable: cfg.maybe_get_str_typecheck("executable")?.map(String::from),
        })
    }

    /// The configured `adb` executable, falling back to whatever `adb` the
    /// context can find
    pub fn get_executable<'a>(&'a self, ctx: &dyn Context) -> crate::Result<Cow<'a, str>> {
        match &self.executable {
            Some(v) => Ok(Cow::Borrowed(v.as_str())),
            None => ctx.get_bin("adb").map(Cow::Owned),
        }
    }

    /// The configured serial, falling back to `ANDROID_SERIAL`
    pub fn get_serial<'a>(&'a self, ctx: &dyn Context) -> Option<Cow<'a, str>> {
        match &self.serial {
            Some(v) => Some(Cow::Borrowed(v.as_str())),
            None => ctx.maybe_get_env("ANDROID_SERIAL").map(Cow::Owned),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DumpConfig {
    pub base: PathBuf,
}

impl DumpConfig {
    pub(crate) const CONFIG_KEY: &'static str = "dump";

    /// Relative `base` paths are resolved against the config file directory
    fn from_cfg_map(cfg: &ConfigMap) -> crate::Result<Self> {
        let path = cfg.must_get_str("base")?;
        let mut base = PathBuf::from(path);
        if base.is_relative() {
            if let Some(parent) = cfg.path.parent() {
                base = parent.join(base);
            }
        }
        Ok(Self { base })
    }
}

/// The parsed `prefman.toml`
#[derive(Clone, Debug)]
pub struct Config {
    pub can_adb: bool,
    pub device_access: DeviceAccessConfig,
    /// Directory holding the per package private data, relative paths are
    /// resolved by the device shell
    pub data_base: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            can_adb: true,
            device_access: DeviceAccessConfig::default(),
            data_base: DEFAULT_DATA_BASE.into(),
        }
    }
}

impl Config {
    pub fn parse(source: &Path) -> crate::Result<Self> {
        parse_config(source, |cfg| {
            let can_adb = cfg.get_bool_or("can-adb", true);
            let data_base = cfg
                .maybe_get_str_typecheck("data-base")?
                .unwrap_or(DEFAULT_DATA_BASE)
                .to_string();

            let device_access = match cfg.maybe_get_map_typecheck("device-access")? {
                None => DeviceAccessConfig::default(),
                Some(access) => {
                    if let Some(dump) = access.maybe_get_map_typecheck(DumpConfig::CONFIG_KEY)? {
                        DeviceAccessConfig::Dump(DumpConfig::from_cfg_map(&dump)?)
                    } else if let Some(adb) =
                        access.maybe_get_map_typecheck(AdbConfig::CONFIG_KEY)?
                    {
                        DeviceAccessConfig::Adb(AdbConfig::from_cfg_map(&adb)?)
                    } else {
                        return Err(access.missing_key("adb|dump"));
                    }
                }
            };

            Ok(Self {
                can_adb,
                device_access,
                data_base,
            })
        })
    }
}

pub fn parse_config<R, F>(file: &Path, f: F) -> crate::Result<R>
where
    F: FnOnce(&ConfigMap) -> crate::Result<R>,
{
    let as_str = read_file(file)?;

    let table: Table = match toml::from_str(&as_str) {
        Ok(v) => v,
        Err(e) => return Err(crate::Error::new_cfg(file, &e)),
    };

    let base = ConfigMap {
        name: None,
        path: file,
        table: &table,
    };

    f(&base)
}

impl<'c> ConfigMap<'c> {
    fn get_full_path(&self) -> Option<&str> {
        self.name.as_ref().map(|it| it.as_ref())
    }

    fn key_path<'a>(&self, key: &'a str) -> Cow<'a, str> {
        match self.get_full_path() {
            None => Cow::Borrowed(key),
            Some(v) => Cow::Owned(format!("{}.{}", v, key)),
        }
    }

    /// Helper to create a crate::Error for a missing key
    pub fn missing_key(&self, key: &str) -> crate::Error {
        let path = self.key_path(key);
        crate::Error::InvalidConfig(
            path_must_str(self.path).into(),
            format!("missing key: {}", path),
        )
    }

    /// Helper to create a crate::Error for an invalid key
    pub fn invalid_key(&self, key: &str, expected: &str) -> crate::Error {
        let path = self.key_path(key);
        crate::Error::InvalidConfig(
            path_must_str(self.path).into(),
            format!(
                "invalid value for key: {} (expected type: {})",
                path, expected
            ),
        )
    }

    pub fn has(&self, key: &str) -> bool {
        self.table.contains_key(key)
    }

    fn get(&self, key: &str) -> Option<&'c Value> {
        self.table.get(key)
    }

    pub fn get_str(&self, key: &str) -> Result<&'c str> {
        self.maybe_get_str(key)?.ok_or(Error::MissingKey)
    }

    pub fn maybe_get_str(&self, key: &str) -> Result<Option<&'c str>> {
        match self.get(key) {
            Some(v) => match v.as_str() {
                Some(v) => Ok(Some(v)),
                None => Err(Error::InvalidType),
            },
            None => Ok(None),
        }
    }

    pub fn maybe_get_str_typecheck(&self, key: &str) -> crate::Result<Option<&'c str>> {
        self.maybe_get_str(key)
            .map_err(|_| self.invalid_key(key, "string"))
    }

    pub fn must_get_str(&self, key: &str) -> crate::Result<&'c str> {
        match self.get_str(key) {
            Err(Error::InvalidType) => Err(self.invalid_key(key, "string")),
            Err(Error::MissingKey) => Err(self.missing_key(key)),
            Ok(v) => Ok(v),
        }
    }

    pub fn get_bool(&self, key: &str) -> Result<bool> {
        self.get(key)
            .ok_or(Error::MissingKey)?
            .as_bool()
            .ok_or(Error::InvalidType)
    }

    pub fn get_bool_or(&self, key: &str, default: bool) -> bool {
        self.table
            .get(key)
            .map(|it| it.as_bool().unwrap_or(default))
            .unwrap_or(default)
    }

    pub fn maybe_get_map(&self, key: &str) -> Result<Option<ConfigMap<'c>>> {
        match self.get(key) {
            Some(v) => match v.as_table() {
                Some(table) => {
                    let name = match self.get_full_path() {
                        Some(parents) => format!("{parents}.{key}"),
                        None => key.to_string(),
                    };
                    Ok(Some(ConfigMap {
                        name: Some(Cow::Owned(name)),
                        path: self.path,
                        table,
                    }))
                }
                None => Err(Error::InvalidType),
            },
            None => Ok(None),
        }
    }

    pub fn get_map(&self, key: &str) -> Result<ConfigMap<'c>> {
        self.maybe_get_map(key)?.ok_or(Error::MissingKey)
    }

    pub fn maybe_get_map_typecheck(&self, key: &str) -> crate::Result<Option<ConfigMap<'c>>> {
        self.maybe_get_map(key)
            .map_err(|_| self.invalid_key(key, "table"))
    }
}
