use std::fmt;

use clap::{self, Args};

use prefman::adb::{Adb, ExecAdb};
use prefman::config::DeviceAccessConfig;
use prefman::{get_root_shell, Context};

#[derive(Args)]
pub struct RunCheck {}

enum Importance {
    Optional,
    Required,
}

enum Status {
    Missing,
    Exists(String),
}

struct Info {
    name: String,
    status: Status,
    importance: Importance,
}

impl Info {
    fn new(name: &str, found: Option<String>, importance: Importance) -> Self {
        Self {
            name: name.into(),
            status: found.map(Status::Exists).unwrap_or(Status::Missing),
            importance,
        }
    }
}

#[cfg(feature = "emoji")]
mod status {
    pub const FAIL: &'static str = "💩";
    pub const OK: &'static str = "🚀";
    pub const MEH: &'static str = "😒";
}

#[cfg(not(feature = "emoji"))]
mod status {
    pub const FAIL: &'static str = "Fail";
    pub const OK: &'static str = "Ok";
    pub const MEH: &'static str = "Meh";
}

use status::*;

impl RunCheck {
    pub fn run(&self, ctx: &dyn Context) -> anyhow::Result<()> {
        let config = ctx.get_config()?;
        let uses_dump = matches!(
            config.map(|it| &it.device_access),
            Some(DeviceAccessConfig::Dump(_))
        );

        println!("Files:\n");
        println!("config: {}", ctx.get_config_file()?.display());
        println!("data: {}", ctx.get_data_dir()?.display());
        if let Some(DeviceAccessConfig::Dump(dump)) = config.map(|it| &it.device_access) {
            println!("dump: {}", dump.base.display());
        }

        let adb_importance = if uses_dump {
            Importance::Optional
        } else {
            Importance::Required
        };
        let checks = [
            Info::new("adb", ctx.maybe_get_bin("adb"), adb_importance),
            Info::new(
                "ANDROID_SERIAL",
                ctx.maybe_get_env("ANDROID_SERIAL"),
                Importance::Optional,
            ),
            Info::new(
                "PREFMAN_HOME",
                ctx.maybe_get_env("PREFMAN_HOME"),
                Importance::Optional,
            ),
        ];

        println!("\nEnvironment:");
        #[cfg(feature = "emoji")]
        {
            println!("\n{} = Present", OK);
            println!("{} = Required and missing", FAIL);
            println!("{} = Optional and missing\n", MEH);
        }
        for c in checks.iter() {
            println!("{}", c);
        }

        println!("\nDevice:\n");
        if !uses_dump {
            match ExecAdb::new(ctx).and_then(|adb| adb.get_connected_devices()) {
                Ok(devices) if devices.is_empty() => println!("{}: no adb devices", FAIL),
                Ok(devices) => println!("{}: devices {}", OK, devices.join(", ")),
                Err(e) => println!("{}: {}", FAIL, e),
            }
        }

        match get_root_shell(ctx) {
            Ok(shell) if shell.connected() => println!("{}: root shell", OK),
            Ok(_) => println!("{}: root shell not available", FAIL),
            Err(e) => println!("{}: {}", FAIL, e),
        }

        Ok(())
    }
}

impl fmt::Display for Info {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.status {
            Status::Missing => {
                write!(
                    f,
                    "{}: {}",
                    match self.importance {
                        Importance::Optional => MEH,
                        Importance::Required => FAIL,
                    },
                    self.name
                )
            }
            Status::Exists(path) => {
                write!(f, "{}: {} ({})", OK, self.name, path)
            }
        }
    }
}
