use std::io;

use crate::command::{run_cmd, CmdOutput};
use crate::config::{AdbConfig, Config, DeviceAccessConfig};
use crate::Context;

/// The Adb trait just abstracts the handful of `adb` commands we need to
/// reach a device
pub trait Adb: Send + Sync {
    fn get_connected_devices(&self) -> crate::Result<Vec<String>>;

    /// Essentially the same as running `adb push $local $device`
    fn push(&self, local: &str, device: &str) -> io::Result<CmdOutput>;

    /// Essentially the same as running `adb shell '...'`
    fn shell(&self, shell_cmd: &str) -> io::Result<CmdOutput>;
}

impl<T> Adb for Box<T>
where
    T: Adb + ?Sized,
{
    fn get_connected_devices(&self) -> crate::Result<Vec<String>> {
        self.as_ref().get_connected_devices()
    }

    fn push(&self, local: &str, device: &str) -> io::Result<CmdOutput> {
        self.as_ref().push(local, device)
    }

    fn shell(&self, shell_cmd: &str) -> io::Result<CmdOutput> {
        self.as_ref().shell(shell_cmd)
    }
}

/// Map the stderr of a failed `adb` invocation to a device error if it
/// looks like one
pub(crate) fn device_error(stderr: &str) -> Option<crate::Error> {
    lazy_static::lazy_static! {
        static ref NOT_FOUND: regex::Regex =
            regex::Regex::new(r"device\s+'([^']+)'\s+not\s+found").expect("valid regex");
    }

    if stderr.contains("no devices/emulators") {
        return Some(crate::Error::NoAdbDevice);
    }

    let caps = NOT_FOUND.captures(stderr)?;
    let serial = caps
        .get(1)
        .map(|m| String::from(m.as_str()))
        .unwrap_or_else(|| "?".into());
    Some(crate::Error::AdbDeviceNotFound(serial))
}

#[derive(Clone)]
/// An `Adb` implementation that just invokes the external `adb` command.
pub struct ExecAdb {
    bin: String,
    serial: Option<String>,
}

impl ExecAdb {
    /// Creates a new `ExecAdb` from the given context.
    ///
    /// This will first check the config file for the device access entry:
    ///
    /// [device-access]
    /// adb = { serial = "...", executable = "..." }
    ///
    /// and use that if found. Otherwise defaults are pulled from the
    /// environment. With `can-adb = false` in the config this function fails.
    pub fn new(ctx: &dyn Context) -> crate::Result<Self> {
        match ctx.get_config()? {
            Some(cfg) => Self::try_from_config(ctx, cfg),
            None => Self::from_env(ctx),
        }
    }

    pub fn from_env(ctx: &dyn Context) -> crate::Result<Self> {
        let bin = ctx.get_bin("adb")?;
        let serial = ctx.maybe_get_env("ANDROID_SERIAL");

        Ok(Self { bin, serial })
    }

    fn try_from_config(ctx: &dyn Context, cfg: &Config) -> crate::Result<Self> {
        if !cfg.can_adb {
            return Err(crate::Error::AdbDisabled);
        }
        match &cfg.device_access {
            DeviceAccessConfig::Adb(adb) => Self::try_from_adb_config(ctx, adb),
            DeviceAccessConfig::Dump(_) => Self::from_env(ctx),
        }
    }

    pub fn try_from_adb_config(ctx: &dyn Context, cfg: &AdbConfig) -> crate::Result<Self> {
        let bin = cfg.get_executable(ctx)?.into_owned();
        let serial = cfg.get_serial(ctx).map(|it| it.into_owned());
        Ok(Self { bin, serial })
    }
}

impl Default for ExecAdb {
    fn default() -> Self {
        Self {
            bin: "adb".into(),
            serial: None,
        }
    }
}

macro_rules! adb_cmd {
    ($adb:ident, $cmd:literal, $($args:expr),*) => {
        if let Some(ref serial) = $adb.serial {
            run_cmd(&$adb.bin, &["-s", serial, $cmd, $($args),*])
        } else {
            run_cmd(&$adb.bin, &[$cmd, $($args),*])
        }
    }
}

impl Adb for ExecAdb {
    /// Returns a list of all connected devices (similar to `adb devices -l`)
    fn get_connected_devices(&self) -> crate::Result<Vec<String>> {
        let output = run_cmd(&self.bin, &["devices", "-l"])?;
        let out_str = output.stdout_utf8_lossy();
        let devices = parse_devices(&out_str);

        if devices.is_empty() {
            return Err(crate::Error::NoAdbDevice);
        }

        Ok(devices)
    }

    fn push(&self, local: &str, device: &str) -> io::Result<CmdOutput> {
        adb_cmd!(self, "push", local, device)
    }

    fn shell(&self, shell_cmd: &str) -> io::Result<CmdOutput> {
        adb_cmd!(self, "shell", shell_cmd)
    }
}

fn parse_devices(out: &str) -> Vec<String> {
    // The first line is the `List of devices attached` header
    out.lines()
        .skip(1)
        .filter(|l| !l.is_empty())
        .filter_map(|l| {
            let mut parts = l.split_ascii_whitespace();
            let id = parts.next()?;
            // Skip `offline` and `unauthorized` devices
            match parts.next() {
                Some("device") => Some(String::from(id)),
                _ => None,
            }
        })
        .collect()
}
