use serde::Serialize;

use crate::rootshell::{FileStat, RootShell};
use crate::utils::DevicePath;
use crate::Context;

/// Private data directories live under `<base><package>`. The path is
/// relative so the device shell resolves it against `/`.
pub const DEFAULT_DATA_BASE: &'static str = "data/data/";

/// Suffix of the files we can edit
pub const PREFERENCES_SUFFIX: &'static str = ".xml";

/// A discovered settings file
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FileRecord {
    pub name: String,
    /// Containing directory
    pub path: String,
}

impl FileRecord {
    pub fn new<N: Into<String>, P: Into<String>>(name: N, path: P) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    /// Full device path of the file
    pub fn device_path(&self) -> DevicePath {
        DevicePath::new(self.path.as_str()).join(&self.name)
    }
}

/// Recursively finds settings files under an application's data directory
pub struct Discovery<'a> {
    shell: &'a dyn RootShell,
    base: DevicePath,
}

impl<'a> Discovery<'a> {
    pub fn new(shell: &'a dyn RootShell) -> Self {
        Self {
            shell,
            base: DevicePath::new(DEFAULT_DATA_BASE),
        }
    }

    /// Discovery rooted at the configured data base
    pub fn from_ctx(shell: &'a dyn RootShell, ctx: &dyn Context) -> crate::Result<Self> {
        let it = Self::new(shell);
        Ok(match ctx.get_config()? {
            Some(cfg) => it.with_base(cfg.data_base.as_str()),
            None => it,
        })
    }

    pub fn with_base<T: Into<String>>(mut self, base: T) -> Self {
        self.base = DevicePath::new(base);
        self
    }

    /// The data directory of the given package
    pub fn package_dir(&self, package: &str) -> DevicePath {
        self.base.join(package)
    }

    /// Every regular `.xml` file anywhere under the package's data
    /// directory, in the order the shell lists them.
    ///
    /// A missing or unreadable directory yields an empty list, shell
    /// failures (no root, no device) are returned as is.
    pub fn find_xml_files(&self, package: &str) -> crate::Result<Vec<FileRecord>> {
        let root = self.package_dir(package);
        log::debug!("searching {} for preference files", root);
        let mut found = Vec::new();
        self.walk(&root, &mut found)?;
        log::info!("found {} preference files for {}", found.len(), package);
        Ok(found)
    }

    fn walk(&self, dir: &DevicePath, found: &mut Vec<FileRecord>) -> crate::Result<()> {
        let entries = self.shell.list_entries(dir)?;
        for entry in entries {
            if is_self_or_parent(&entry) {
                continue;
            }
            if entry.is_dir() {
                self.walk(&dir.join(&entry.name), found)?;
                continue;
            }
            if entry.is_file() && entry.name.ends_with(PREFERENCES_SUFFIX) {
                found.push(FileRecord::new(entry.name, dir.get_device_string()));
            }
        }
        Ok(())
    }
}

fn is_self_or_parent(entry: &FileStat) -> bool {
    entry.name.is_empty() || entry.name == "." || entry.name == ".."
}

/// Convenience wrapper for [Discovery::find_xml_files] with the default base
pub fn find_xml_files(shell: &dyn RootShell, package: &str) -> crate::Result<Vec<FileRecord>> {
    Discovery::new(shell).find_xml_files(package)
}
