use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, BufReader, ErrorKind, Write};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::rootshell::RootShell;
use crate::store::PreferenceStore;
use crate::utils::{open_file, DevicePath};
use crate::Context;

/// A saved copy of a settings file
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backup {
    /// Milliseconds since the Unix epoch, also the name of the content file
    pub time: u64,
    /// The backed up file on the device
    pub file: DevicePath,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Backup {
    pub fn new(time: u64, file: DevicePath) -> Self {
        Self {
            time,
            file,
            name: None,
        }
    }

    pub fn with_name<T: Into<String>>(mut self, name: T) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// All backups of one package, oldest first
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackupContainer {
    backups: Vec<Backup>,
}

impl BackupContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.backups.is_empty()
    }

    pub fn len(&self) -> usize {
        self.backups.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Backup> {
        self.backups.iter()
    }

    pub fn add(&mut self, backup: Backup) {
        self.backups.push(backup);
    }

    pub fn find(&self, time: u64) -> Option<&Backup> {
        self.backups.iter().find(|it| it.time == time)
    }

    pub fn remove(&mut self, time: u64) -> Option<Backup> {
        let idx = self.backups.iter().position(|it| it.time == time)?;
        Some(self.backups.remove(idx))
    }

    /// Backups of a single device file
    pub fn for_file<'a>(&'a self, file: &'a DevicePath) -> impl Iterator<Item = &'a Backup> + 'a {
        self.backups.iter().filter(move |it| &it.file == file)
    }
}

/// Backups of `package`, empty when there are none or the stored value
/// can't be parsed
pub fn get_backups(store: &dyn PreferenceStore, package: &str) -> BackupContainer {
    let raw = match store.get_string(package) {
        Some(v) => v,
        None => return BackupContainer::new(),
    };
    match serde_json::from_str(&raw) {
        Ok(v) => v,
        Err(e) => {
            log::error!("invalid backups for {}: {}", package, e);
            BackupContainer::new()
        }
    }
}

pub fn save_backups(
    store: &dyn PreferenceStore,
    package: &str,
    container: &BackupContainer,
) -> crate::Result<()> {
    let json = serde_json::to_string(container)?;
    store.put_string(package, &json)
}

/// Flat file storage for backup contents, one file per [Backup::time]
pub struct BackupFiles {
    dir: PathBuf,
}

impl BackupFiles {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn from_ctx(ctx: &dyn Context) -> crate::Result<Self> {
        Ok(Self::new(ctx.get_backups_dir()?))
    }

    fn get_path(&self, backup: &Backup) -> PathBuf {
        self.dir.join(backup.time.to_string())
    }

    /// Store `data` as the content of `backup`
    pub fn backup_file(&self, backup: &Backup, data: &str) -> bool {
        let path = self.get_path(backup);
        match fs::write(&path, data) {
            Ok(_) => true,
            Err(e) => {
                log::error!("failed to write backup {}: {}", path.display(), e);
                false
            }
        }
    }

    /// Store `data` under `time` unless that time already has content
    fn create_content(&self, time: u64, data: &str) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.dir.join(time.to_string()))?;
        file.write_all(data.as_bytes())
    }

    /// The stored content of `backup`, every line terminated by `\n`
    pub fn get_backup_content(&self, backup: &Backup) -> Option<String> {
        let path = self.get_path(backup);
        let file = match open_file(&path) {
            Ok(v) => v,
            Err(e) => {
                log::error!("backup not found: {}", e);
                return None;
            }
        };

        let mut buffer = String::new();
        for line in BufReader::new(file).lines() {
            match line {
                Ok(line) => {
                    buffer.push_str(&line);
                    buffer.push('\n');
                }
                Err(e) => {
                    log::error!("can not read {}: {}", path.display(), e);
                    return None;
                }
            }
        }
        Some(buffer)
    }

    pub fn delete(&self, backup: &Backup) -> bool {
        let path = self.get_path(backup);
        match fs::remove_file(&path) {
            Ok(_) => true,
            Err(e) if e.kind() == ErrorKind::NotFound => true,
            Err(e) => {
                log::error!("failed to delete {}: {}", path.display(), e);
                false
            }
        }
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|it| it.as_millis() as u64)
        .unwrap_or_default()
}

/// Read `file` from the device and save it as a new backup of `package`
pub fn create_backup(
    shell: &dyn RootShell,
    store: &dyn PreferenceStore,
    files: &BackupFiles,
    package: &str,
    file: &DevicePath,
    name: Option<&str>,
) -> crate::Result<Backup> {
    let content = shell.read_file(file)?;

    let mut container = get_backups(store, package);
    // Content files of every package share one directory, so the time has
    // to be free there and not only in this package's list
    let mut time = now_millis();
    loop {
        if container.find(time).is_some() {
            time += 1;
            continue;
        }
        match files.create_content(time, &content) {
            Ok(_) => break,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => time += 1,
            Err(e) => {
                log::error!("failed to write backup {}: {}", time, e);
                return Err(crate::Error::new_generic(&format!(
                    "failed to store backup of {}",
                    file
                )));
            }
        }
    }

    let mut backup = Backup::new(time, file.clone());
    if let Some(name) = name {
        backup = backup.with_name(name);
    }

    container.add(backup.clone());
    if let Err(e) = save_backups(store, package, &container) {
        files.delete(&backup);
        return Err(e);
    }
    log::info!("backed up {} as {}", file, backup.time);
    Ok(backup)
}

/// Write the content of backup `time` back to its file on the device
pub fn restore_backup(
    shell: &dyn RootShell,
    store: &dyn PreferenceStore,
    files: &BackupFiles,
    package: &str,
    time: u64,
) -> crate::Result<Backup> {
    let container = get_backups(store, package);
    let backup = container
        .find(time)
        .cloned()
        .ok_or_else(|| crate::Error::MissingBackup(package.into(), time))?;
    let content = files
        .get_backup_content(&backup)
        .ok_or_else(|| crate::Error::MissingBackup(package.into(), time))?;
    shell.write_file(&backup.file, &content)?;
    log::info!("restored {} from {}", backup.file, backup.time);
    Ok(backup)
}

/// Forget backup `time` of `package` and delete its content
pub fn delete_backup(
    store: &dyn PreferenceStore,
    files: &BackupFiles,
    package: &str,
    time: u64,
) -> crate::Result<Backup> {
    let mut container = get_backups(store, package);
    let backup = container
        .remove(time)
        .ok_or_else(|| crate::Error::MissingBackup(package.into(), time))?;
    if !files.delete(&backup) {
        log::warn!(
            "content of backup {} of {} was left behind",
            backup.time,
            package
        );
    }
    if container.is_empty() {
        store.remove(package)?;
    } else {
        save_backups(store, package, &container)?;
    }
    Ok(backup)
}
