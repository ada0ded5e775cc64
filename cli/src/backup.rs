use std::fmt;

use clap::{self, Args, Subcommand};

use prefman::backups::{create_backup, delete_backup, get_backups, restore_backup};
use prefman::{get_root_shell, Backup as PrefBackup, BackupFiles, Context, DevicePath};

use crate::parsers::{PackageNameValueParser, PreferenceFileValueParser};
use crate::printer::{color, Printer};
use crate::utils::{open_store, prompt_choice, with_root};

#[derive(Args)]
pub struct Backup {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Save a copy of a preference file
    #[command()]
    Create(Create),

    /// List the backups of a package
    #[command()]
    List(List),

    /// Print the content of a backup
    #[command()]
    Show(Show),

    /// Write a backup back to the device
    #[command()]
    Restore(Restore),

    /// Delete a backup
    #[command()]
    Delete(Delete),
}

impl Backup {
    pub fn run(&self, ctx: &dyn Context) -> anyhow::Result<()> {
        match &self.command {
            Command::Create(c) => c.run(ctx),
            Command::List(c) => c.run(ctx),
            Command::Show(c) => c.run(ctx),
            Command::Restore(c) => c.run(ctx),
            Command::Delete(c) => c.run(ctx),
        }
    }
}

#[derive(Args)]
struct Create {
    #[arg(value_parser = PackageNameValueParser)]
    package: String,

    /// Device path of the preference file
    #[arg(value_parser = PreferenceFileValueParser)]
    file: DevicePath,

    /// Optional label for the backup
    #[arg(short, long)]
    name: Option<String>,
}

impl Create {
    fn run(&self, ctx: &dyn Context) -> anyhow::Result<()> {
        let shell = get_root_shell(ctx)?;
        let store = open_store(ctx)?;
        let files = BackupFiles::from_ctx(ctx)?;
        let backup = with_root(shell.as_ref(), |shell| {
            create_backup(
                shell,
                store.as_ref(),
                &files,
                &self.package,
                &self.file,
                self.name.as_deref(),
            )
        })?;
        Printer::new().println_colored(format!("Created {}", BackupRow(&backup)), color::OK);
        Ok(())
    }
}

#[derive(Args)]
struct List {
    #[arg(value_parser = PackageNameValueParser)]
    package: String,

    /// Only list backups of this file
    #[arg(short, long, value_parser = PreferenceFileValueParser)]
    file: Option<DevicePath>,

    /// Print the backups as JSON
    #[arg(short, long, action = clap::ArgAction::SetTrue, default_value_t = false)]
    json: bool,
}

impl List {
    fn run(&self, ctx: &dyn Context) -> anyhow::Result<()> {
        let store = open_store(ctx)?;
        let container = get_backups(store.as_ref(), &self.package);
        let backups = container
            .iter()
            .filter(|it| self.file.as_ref().map_or(true, |f| &it.file == f))
            .collect::<Vec<&PrefBackup>>();

        if self.json {
            println!("{}", serde_json::to_string_pretty(&backups)?);
            return Ok(());
        }

        let printer = Printer::new();
        if backups.is_empty() {
            printer.println(format!("No backups for {}", self.package));
        }
        for it in backups {
            printer.println(BackupRow(it));
        }
        Ok(())
    }
}

#[derive(Args)]
struct Show {
    #[arg(value_parser = PackageNameValueParser)]
    package: String,

    /// Time of the backup, as printed by `list`
    time: u64,
}

impl Show {
    fn run(&self, ctx: &dyn Context) -> anyhow::Result<()> {
        let store = open_store(ctx)?;
        let files = BackupFiles::from_ctx(ctx)?;
        let container = get_backups(store.as_ref(), &self.package);
        let backup = container
            .find(self.time)
            .ok_or_else(|| prefman::Error::MissingBackup(self.package.clone(), self.time))?;
        let content = files
            .get_backup_content(backup)
            .ok_or_else(|| prefman::Error::MissingBackup(self.package.clone(), self.time))?;
        print!("{}", content);
        Ok(())
    }
}

#[derive(Args)]
struct Restore {
    #[arg(value_parser = PackageNameValueParser)]
    package: String,

    /// Time of the backup, prompts for one when omitted
    time: Option<u64>,
}

impl Restore {
    fn run(&self, ctx: &dyn Context) -> anyhow::Result<()> {
        let store = open_store(ctx)?;
        let files = BackupFiles::from_ctx(ctx)?;

        let time = match self.time {
            Some(v) => v,
            None => {
                let container = get_backups(store.as_ref(), &self.package);
                let rows = container.iter().map(BackupRow).collect::<Vec<BackupRow>>();
                prompt_choice(
                    &rows,
                    &format!("Backups of {}:", self.package),
                    "Backup number: ",
                )?
                .0
                .time
            }
        };

        let shell = get_root_shell(ctx)?;
        let backup = with_root(shell.as_ref(), |shell| {
            restore_backup(shell, store.as_ref(), &files, &self.package, time)
        })?;
        Printer::new().println_colored(format!("Restored {}", BackupRow(&backup)), color::OK);
        Ok(())
    }
}

#[derive(Args)]
struct Delete {
    #[arg(value_parser = PackageNameValueParser)]
    package: String,

    time: u64,
}

impl Delete {
    fn run(&self, ctx: &dyn Context) -> anyhow::Result<()> {
        let store = open_store(ctx)?;
        let files = BackupFiles::from_ctx(ctx)?;
        let backup = delete_backup(store.as_ref(), &files, &self.package, self.time)?;
        Printer::new().println(format!("Deleted {}", BackupRow(&backup)));
        Ok(())
    }
}

struct BackupRow<'a>(&'a PrefBackup);

impl fmt::Display for BackupRow<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}", self.0.time, self.0.file)?;
        if let Some(name) = &self.0.name {
            write!(f, " \"{}\"", name)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rstest::*;

    #[rstest]
    fn test_backup_row() {
        let file = DevicePath::new("data/data/com.example.app/shared_prefs/main.xml");
        let backup = PrefBackup::new(1700000000000, file.clone());
        assert_eq!(
            BackupRow(&backup).to_string(),
            "1700000000000 data/data/com.example.app/shared_prefs/main.xml"
        );
        let named = backup.with_name("before update");
        assert_eq!(
            BackupRow(&named).to_string(),
            "1700000000000 data/data/com.example.app/shared_prefs/main.xml \"before update\""
        );
    }
}
