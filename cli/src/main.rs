use std::borrow::Cow;
use std::path::PathBuf;

use anyhow::Context as AnyhowContext;
use clap::{Parser, Subcommand};
use flexi_logger::{FileSpec, LevelFilter, LogSpecification, Logger, LoggerHandle, WriteMode};

use prefman::{Context, DefaultContext};

mod parsers;
mod printer;
mod utils;

mod apps;
use apps::Apps;

mod backup;
use backup::Backup;

mod check;
use check::RunCheck;

mod favorite;
use favorite::Favorite;

mod files;
use files::Files;

mod system_apps;
use system_apps::SystemApps;

const SIMPLE_VERSION_STRING: &'static str =
    include!(concat!(env!("OUT_DIR"), "/simple_version_string"));
const VERSION_STRING: &'static str = include!(concat!(env!("OUT_DIR"), "/version_string"));

#[derive(Parser)]
#[command(name = "prefman")]
#[command(version(SIMPLE_VERSION_STRING))]
#[command(long_version(VERSION_STRING))]
struct Cli {
    /// `-e`, `--log-stderr`: Log to `stderr` instead of the log file
    #[arg(short = 'e', long, help = "Log to stderr instead of a file", action = clap::ArgAction::SetTrue, default_value_t = false)]
    log_stderr: bool,

    /// `-f`, `--log-file`: Path of the log file, defaults to `log` in the
    /// data directory
    #[arg(short = 'f', long, help = "Send log output to the given file")]
    log_file: Option<PathBuf>,

    /// `-s`, `--log-spec`: A [flexi_logger](https://docs.rs/flexi_logger/latest/flexi_logger/struct.LogSpecification.html) log specification
    #[arg(short = 's', long, help = "Log spec for flexi_logger")]
    log_spec: Option<String>,

    /// `-l`, `--log-level`: Log verbosity
    ///
    /// | Value | Log Level |
    /// | ----- | --------- |
    /// | **0** | **Warn** |
    /// | 1 | Info |
    /// | 2 | Debug |
    /// | 3 | Trace |
    #[arg(
        short = 'l',
        long,
        help = "Set the log level, 0 = warn, 1 = info, etc",
        long_help = None,
        default_value_t = 0
    )]
    log_level: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display the full version string and exit
    #[command()]
    Version,

    /// Check that the device and the required programs are reachable
    #[command()]
    Check(RunCheck),

    /// List the applications on the device, favorites first
    #[command()]
    Apps(Apps),

    /// List the XML preference files of an application
    #[command()]
    Files(Files),

    /// Add or remove an application from the favorites
    #[command()]
    Favorite(Favorite),

    /// Show or toggle whether system applications are listed
    #[command()]
    SystemApps(SystemApps),

    /// Manage backups of preference files
    #[command()]
    Backup(Backup),
}

impl Cli {
    fn configure_loggers(&self, ctx: &DefaultContext) -> anyhow::Result<LoggerHandle> {
        let log_spec = match &self.log_spec {
            Some(s) => {
                LogSpecification::parse(s).with_context(|| format!("parsing log spec {}", s))?
            }
            None => {
                if self.log_level > 0 {
                    let lvl = match self.log_level {
                        1 => LevelFilter::Info,
                        2 => LevelFilter::Debug,
                        _ => LevelFilter::Trace,
                    };
                    LogSpecification::builder()
                        .module("prefman", lvl)
                        .module("prefman_cli", lvl)
                        .build()
                } else {
                    LogSpecification::env().with_context(|| "getting log spec from env")?
                }
            }
        };

        let mut logger = Logger::with(log_spec);

        if !self.log_stderr {
            let path = match &self.log_file {
                Some(v) if v.is_absolute() => Some(Cow::Borrowed(v)),
                Some(v) => Some(Cow::Owned(std::env::current_dir()?.join(v))),
                None => ctx.get_log_file().map(Cow::Owned).ok(),
            };

            if let Some(p) = &path {
                logger = logger
                    .log_to_file(
                        FileSpec::try_from(p.as_ref()).with_context(|| "creating filespec")?,
                    )
                    .append()
                    .write_mode(WriteMode::BufferAndFlush);
            }
        }

        Ok(logger.start().with_context(|| "starting logger")?)
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Version = &cli.command {
        println!("{}", VERSION_STRING);
        return Ok(());
    }

    let ctx = DefaultContext::default();

    let log_handle = cli.configure_loggers(&ctx)?;

    let res = match cli.command {
        Commands::Check(c) => c.run(&ctx),
        Commands::Apps(c) => c.run(&ctx),
        Commands::Files(c) => c.run(&ctx),
        Commands::Favorite(c) => c.run(&ctx),
        Commands::SystemApps(c) => c.run(&ctx),
        Commands::Backup(c) => c.run(&ctx),

        Commands::Version => unreachable!(),
    };

    log_handle.flush();
    res
}
