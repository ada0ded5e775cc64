pub mod context;
pub use context::{Context, DefaultContext};

pub mod config;

pub mod errors;
pub use errors::{Error, Result};

pub mod adb;

pub mod command;
pub use command::run_cmd;

pub mod rootshell;
pub use rootshell::{get_root_shell, RootShell};

pub mod dump;

pub mod discovery;
pub use discovery::{find_xml_files, Discovery, FileRecord};

pub mod registry;
pub use registry::{get_package_registry, ApplicationInfo, PackageRegistry};

pub mod store;
pub use store::{JsonPreferenceStore, PreferenceStore};

pub mod favorites;
pub use favorites::Favorites;

pub mod backups;
pub use backups::{Backup, BackupContainer, BackupFiles};

pub mod catalog;
pub use catalog::{AppEntry, Catalog};

pub mod controller;
pub use controller::{CatalogController, RefreshState};

pub mod utils;
pub use utils::fs::{DEVICE_PATH_SEP, DEVICE_PATH_SEP_CHAR};
pub use utils::DevicePath;

#[cfg(test)]
pub mod testing;
