use std::borrow::Cow;
use std::fs::{self, Metadata};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::config::DumpConfig;
use crate::registry::{ApplicationInfo, PackageRegistry};
use crate::rootshell::{FileStat, FileType, RootShell};
use crate::utils::{DevicePath, DEVICE_PATH_SEP_CHAR};

/// [RootShell] over a filesystem dump of a device
///
/// Device paths are resolved relative to the dump's base directory. Listings
/// are sorted by name and include `.` and `..` the same way `ls -la` does so
/// both implementations look alike to callers.
pub struct DumpRootShell {
    base: PathBuf,
}

impl DumpRootShell {
    pub fn new(base: PathBuf) -> Self {
        Self { base }
    }

    pub fn from_cfg(cfg: &DumpConfig) -> Self {
        Self::new(cfg.base.clone())
    }

    fn get_path<'a>(&'a self, device_path: &'a str) -> Cow<'a, Path> {
        // We may be given paths that we already resolved, so make sure it
        // isn't already inside the base dir
        if Path::new(device_path).starts_with(&self.base) {
            return Cow::Borrowed(Path::new(device_path));
        }

        let relative = device_path.trim_start_matches(DEVICE_PATH_SEP_CHAR);
        if relative.is_empty() {
            return Cow::Borrowed(self.base.as_path());
        }

        let mut path = self.base.clone();
        for part in relative.split(DEVICE_PATH_SEP_CHAR).filter(|it| !it.is_empty()) {
            path.push(part);
        }
        Cow::Owned(path)
    }
}

fn file_stat(name: String, meta: &Metadata, link: Option<String>) -> FileStat {
    let ft = meta.file_type();
    let ty = if ft.is_symlink() {
        FileType::Link
    } else if ft.is_dir() {
        FileType::Dir
    } else if ft.is_file() {
        FileType::File
    } else {
        FileType::Other
    };

    let (permission, user, group) = owner_and_mode(ty, meta);

    FileStat {
        name,
        ty,
        size: meta.len(),
        permission,
        user,
        group,
        link,
    }
}

#[cfg(unix)]
fn owner_and_mode(ty: FileType, meta: &Metadata) -> (String, String, String) {
    use std::os::unix::fs::MetadataExt;

    let mode = meta.mode();
    let mut perm = String::with_capacity(10);
    perm.push(match ty {
        FileType::Dir => 'd',
        FileType::Link => 'l',
        FileType::File => '-',
        FileType::Other => '?',
    });
    for shift in [6u32, 3, 0] {
        let bits = (mode >> shift) & 0o7;
        perm.push(if bits & 0o4 != 0 { 'r' } else { '-' });
        perm.push(if bits & 0o2 != 0 { 'w' } else { '-' });
        perm.push(if bits & 0o1 != 0 { 'x' } else { '-' });
    }
    (perm, meta.uid().to_string(), meta.gid().to_string())
}

#[cfg(not(unix))]
fn owner_and_mode(_ty: FileType, meta: &Metadata) -> (String, String, String) {
    let perm = if meta.permissions().readonly() {
        "-r--r--r--"
    } else {
        "-rw-rw-rw-"
    };
    (perm.into(), "0".into(), "0".into())
}

fn stat_path(name: String, path: &Path) -> Option<FileStat> {
    let meta = match fs::symlink_metadata(path) {
        Ok(v) => v,
        Err(e) => {
            if e.kind() != ErrorKind::NotFound {
                log::warn!("failed to stat {}: {}", path.display(), e);
            }
            return None;
        }
    };
    let link = if meta.file_type().is_symlink() {
        fs::read_link(path)
            .ok()
            .map(|it| it.to_string_lossy().into_owned())
    } else {
        None
    };
    Some(file_stat(name, &meta, link))
}

impl RootShell for DumpRootShell {
    fn connected(&self) -> bool {
        self.base.is_dir()
    }

    fn stat(&self, path: &DevicePath) -> crate::Result<Option<FileStat>> {
        let full = self.get_path(path.as_device_str());
        Ok(stat_path(path.device_file_name().into(), &full))
    }

    fn list_entries(&self, path: &DevicePath) -> crate::Result<Vec<FileStat>> {
        if !self.connected() {
            return Err(crate::Error::NotConnected);
        }

        let dir = self.get_path(path.as_device_str());
        let rd = match fs::read_dir(&dir) {
            Ok(v) => v,
            Err(e) => {
                log::debug!("ls {}: {}", dir.display(), e);
                return Ok(Vec::new());
            }
        };

        let mut names = rd
            .filter_map(|it| it.ok())
            .map(|it| it.file_name().to_string_lossy().into_owned())
            .collect::<Vec<String>>();
        names.sort();

        let mut entries = Vec::with_capacity(names.len() + 2);
        entries.extend(stat_path(".".into(), &dir));
        if let Some(parent) = dir.parent() {
            entries.extend(stat_path("..".into(), parent));
        }
        for name in names {
            let full = dir.join(&name);
            entries.extend(stat_path(name, &full));
        }
        Ok(entries)
    }

    fn read_file(&self, path: &DevicePath) -> crate::Result<String> {
        let full = self.get_path(path.as_device_str());
        match fs::read_to_string(&full) {
            Ok(v) => Ok(v),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(crate::Error::MissingFile(path.get_device_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn write_file(&self, path: &DevicePath, content: &str) -> crate::Result<()> {
        let full = self.get_path(path.as_device_str());
        if !full.is_file() {
            return Err(crate::Error::MissingFile(path.get_device_string()));
        }
        fs::write(&full, content)?;
        Ok(())
    }
}

/// [PackageRegistry] over a filesystem dump, every directory under the
/// data base is an installed package
pub struct DumpPackageRegistry {
    shell: DumpRootShell,
    data_base: DevicePath,
}

impl DumpPackageRegistry {
    pub fn new(base: PathBuf, data_base: &str) -> Self {
        Self {
            shell: DumpRootShell::new(base),
            data_base: DevicePath::new(data_base),
        }
    }
}

impl PackageRegistry for DumpPackageRegistry {
    fn installed_applications(&self) -> crate::Result<Vec<ApplicationInfo>> {
        let entries = self.shell.list_entries(&self.data_base)?;
        Ok(entries
            .into_iter()
            .filter(|it| it.is_dir() && it.name != "." && it.name != "..")
            .map(|it| ApplicationInfo::new(it.name))
            .collect())
    }
}
