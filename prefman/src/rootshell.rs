//! Privileged access to the device filesystem.
//!
//! Everything under an application's private data directory is only
//! readable by that application or by root, so all file access goes through
//! a [RootShell]. The default implementation drives `su` over `adb shell`,
//! [crate::dump::DumpRootShell] serves a filesystem dump instead.

use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use crossbeam::atomic::AtomicCell;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use crate::adb::{device_error, Adb, ExecAdb};
use crate::command::{quote, CmdOutput};
use crate::config::DeviceAccessConfig;
use crate::dump::DumpRootShell;
use crate::utils::{ensure_dir_exists, path_must_str, DevicePath};
use crate::Context;

/// Where files are staged on the device before root copies them into place
const DEVICE_STAGING_DIR: &'static str = "/data/local/tmp";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum FileType {
    File,
    Dir,
    Link,
    Other,
}

impl FileType {
    fn from_mode_char(c: char) -> Self {
        match c {
            '-' => Self::File,
            'd' => Self::Dir,
            'l' => Self::Link,
            _ => Self::Other,
        }
    }
}

/// Metadata for a single entry as reported by the device
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FileStat {
    pub name: String,
    pub ty: FileType,
    pub size: u64,
    /// Mode string, ie: `-rw-rw----`
    pub permission: String,
    pub user: String,
    pub group: String,
    /// Target for symbolic links
    pub link: Option<String>,
}

impl FileStat {
    pub fn is_file(&self) -> bool {
        self.ty == FileType::File
    }

    pub fn is_dir(&self) -> bool {
        self.ty == FileType::Dir
    }
}

/// Capability interface to privileged filesystem operations.
///
/// All methods block, don't call them from a thread that must stay
/// responsive.
pub trait RootShell: Send + Sync {
    /// Whether root is available. The result of the first probe may be
    /// cached, see [RootShell::reconnect].
    fn connected(&self) -> bool;

    /// Probe again for root, ignoring any cached result
    fn reconnect(&self) -> bool {
        self.connected()
    }

    /// Stat a single path, `None` if it doesn't exist or can't be read
    fn stat(&self, path: &DevicePath) -> crate::Result<Option<FileStat>>;

    /// List the entries of a directory in the order the device reports them,
    /// including `.` and `..` if the device lists them.
    ///
    /// Missing or inaccessible directories yield an empty list. Failing to
    /// get a root shell at all is an error ([crate::Error::NotConnected]).
    fn list_entries(&self, path: &DevicePath) -> crate::Result<Vec<FileStat>>;

    fn read_file(&self, path: &DevicePath) -> crate::Result<String>;

    /// Replace the content of `path`, keeping its owner and mode
    fn write_file(&self, path: &DevicePath, content: &str) -> crate::Result<()>;
}

impl<T> RootShell for Box<T>
where
    T: RootShell + ?Sized,
{
    fn connected(&self) -> bool {
        self.as_ref().connected()
    }

    fn reconnect(&self) -> bool {
        self.as_ref().reconnect()
    }

    fn stat(&self, path: &DevicePath) -> crate::Result<Option<FileStat>> {
        self.as_ref().stat(path)
    }

    fn list_entries(&self, path: &DevicePath) -> crate::Result<Vec<FileStat>> {
        self.as_ref().list_entries(path)
    }

    fn read_file(&self, path: &DevicePath) -> crate::Result<String> {
        self.as_ref().read_file(path)
    }

    fn write_file(&self, path: &DevicePath, content: &str) -> crate::Result<()> {
        self.as_ref().write_file(path, content)
    }
}

/// [RootShell] running `su -c '...'` through any [Adb] implementation
pub struct AdbRootShell<T: Adb> {
    adb: T,
    staging: PathBuf,
    connected: AtomicCell<Option<bool>>,
}

impl<T> AdbRootShell<T>
where
    T: Adb,
{
    /// `staging` is a local directory used to hold file content on its way
    /// to the device
    pub fn new(adb: T, staging: PathBuf) -> Self {
        Self {
            adb,
            staging,
            connected: AtomicCell::new(None),
        }
    }

    pub fn as_adb(&self) -> &dyn Adb {
        &self.adb
    }

    fn probe(&self) -> bool {
        let res = match self.adb.shell("su -c id") {
            Ok(v) => v,
            Err(e) => {
                log::error!("failed to run adb: {}", e);
                return false;
            }
        };
        let is_root = res.ok() && res.stdout_contains("uid=0");
        if !is_root {
            log::warn!(
                "root probe failed: {}",
                res.stderr_utf8_lossy().trim()
            );
        }
        is_root
    }

    /// Run `cmd` as root. The returned output may still have a failing
    /// status, only adb and `su` failures are errors.
    fn su(&self, cmd: &str) -> crate::Result<CmdOutput> {
        if !self.connected() {
            return Err(crate::Error::NotConnected);
        }
        let full = format!("su -c {}", quote(cmd));
        let output = self.adb.shell(&full)?;
        if !output.ok() {
            if let Some(e) = device_error(&output.stderr_utf8_lossy()) {
                return Err(e);
            }
        }
        Ok(output)
    }

    fn stage_local(&self, content: &str) -> crate::Result<(PathBuf, String)> {
        ensure_dir_exists(&self.staging)?;
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|it| it.as_millis())
            .unwrap_or_default();
        let name = format!("prefman-{}", millis);
        let local = self.staging.join(&name);
        fs::write(&local, content)?;
        Ok((local, format!("{}/{}", DEVICE_STAGING_DIR, name)))
    }
}

impl<T> RootShell for AdbRootShell<T>
where
    T: Adb,
{
    fn connected(&self) -> bool {
        if let Some(v) = self.connected.load() {
            return v;
        }
        self.reconnect()
    }

    fn reconnect(&self) -> bool {
        let is_root = self.probe();
        self.connected.store(Some(is_root));
        is_root
    }

    fn stat(&self, path: &DevicePath) -> crate::Result<Option<FileStat>> {
        let output = self.su(&format!("ls -lad {}", quote(path.as_device_str())))?;
        if !output.ok() {
            log::debug!("stat {}: {}", path, output.stderr_utf8_lossy().trim());
            return Ok(None);
        }
        let stdout = output.stdout_utf8_lossy();
        let stat = stdout.lines().find_map(parse_ls_line).map(|mut it| {
            // `ls -d` echoes the path back instead of a name
            it.name = String::from(path.device_file_name());
            it
        });
        Ok(stat)
    }

    fn list_entries(&self, path: &DevicePath) -> crate::Result<Vec<FileStat>> {
        // The trailing separator makes `ls` follow a symlinked directory
        let dir = path.join("");
        let output = self.su(&format!("ls -la {}", quote(dir.as_device_str())))?;
        if !output.ok() {
            log::debug!("ls {}: {}", path, output.stderr_utf8_lossy().trim());
            return Ok(Vec::new());
        }
        Ok(parse_ls(&output.stdout_utf8_lossy()))
    }

    fn read_file(&self, path: &DevicePath) -> crate::Result<String> {
        let output = self
            .su(&format!("cat {}", quote(path.as_device_str())))?
            .err_on_status()?;
        Ok(output.stdout_utf8_lossy().into_owned())
    }

    fn write_file(&self, path: &DevicePath, content: &str) -> crate::Result<()> {
        if !self.connected() {
            return Err(crate::Error::NotConnected);
        }
        let (local, staged) = self.stage_local(content)?;
        let pushed = self.adb.push(path_must_str(&local), &staged);
        if let Err(e) = fs::remove_file(&local) {
            log::warn!("failed to remove {}: {}", local.display(), e);
        }
        pushed?.err_on_status()?;

        // Redirecting into the existing file keeps its owner, group and mode
        let cmd = format!(
            "cat {staged} > {target}; status=$?; rm -f {staged}; exit $status",
            staged = quote(&staged),
            target = quote(path.as_device_str()),
        );
        self.su(&cmd)?.err_on_status()?;
        Ok(())
    }
}

lazy_static! {
    static ref LS_LINE: Regex = Regex::new(concat!(
        r"^(?P<perm>[-bcdlps][-rwxsStT]{9})[.+@]?\s+",
        r"(?:\d+\s+)?",
        r"(?P<user>\S+)\s+(?P<group>\S+)\s+",
        r"(?:(?P<size>\d+)|\d+,\s*\d+)?\s*",
        r"(?:\d{4}-\d{2}-\d{2}\s+\d{2}:\d{2}(?::\d{2}(?:\.\d+)?)?(?:\s+[-+]\d{4})?",
        r"|[A-Z][a-z]{2}\s+\d{1,2}\s+(?:\d{2}:\d{2}|\d{4}))",
        r"\s+(?P<name>.+)$",
    ))
    .expect("valid ls regex");
}

/// Parse the output of `ls -la` preserving the listing order
pub fn parse_ls(output: &str) -> Vec<FileStat> {
    output.lines().filter_map(parse_ls_line).collect()
}

/// Parse a single `ls -l` line, `None` for anything that isn't an entry
/// (`total 24`, blank lines, errors)
pub fn parse_ls_line(line: &str) -> Option<FileStat> {
    let caps = LS_LINE.captures(line.trim_end_matches('\r'))?;
    let permission = caps.name("perm")?.as_str();
    let ty = FileType::from_mode_char(permission.chars().next()?);
    let size = caps
        .name("size")
        .and_then(|it| it.as_str().parse::<u64>().ok())
        .unwrap_or(0);

    let raw_name = caps.name("name")?.as_str();
    let (name, link) = match (ty, raw_name.split_once(" -> ")) {
        (FileType::Link, Some((name, target))) => (name, Some(String::from(target))),
        _ => (raw_name, None),
    };

    Some(FileStat {
        name: String::from(name),
        ty,
        size,
        permission: String::from(permission),
        user: String::from(caps.name("user")?.as_str()),
        group: String::from(caps.name("group")?.as_str()),
        link,
    })
}

/// Get the [RootShell] for the configured device access
///
/// If no config is found or device-access is unspecified, this returns an
/// [AdbRootShell] over [ExecAdb]
pub fn get_root_shell(ctx: &dyn Context) -> crate::Result<Box<dyn RootShell>> {
    let staging = ctx.get_data_dir_child("staging")?;
    let config = match ctx.get_config()? {
        Some(v) => v,
        None => {
            let adb = ExecAdb::new(ctx)?;
            return Ok(Box::new(AdbRootShell::new(adb, staging)));
        }
    };

    match &config.device_access {
        DeviceAccessConfig::Adb(adb) => {
            if !config.can_adb {
                return Err(crate::Error::AdbDisabled);
            }
            let adb = ExecAdb::try_from_adb_config(ctx, adb)?;
            Ok(Box::new(AdbRootShell::new(adb, staging)))
        }
        DeviceAccessConfig::Dump(dump) => Ok(Box::new(DumpRootShell::from_cfg(dump))),
    }
}
