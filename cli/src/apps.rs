use clap::{self, Args};
use itertools::Itertools;

use prefman::{AppEntry, Context};

use crate::printer::{color, Printer};
use crate::utils::get_controller;

#[derive(Args)]
pub struct Apps {
    /// Only list applications whose label or package contains this text
    #[arg(short = 'q', long)]
    filter: Option<String>,

    /// Only list favorites
    #[arg(short = 'F', long, action = clap::ArgAction::SetTrue, default_value_t = false)]
    favorites: bool,

    /// Print the list as JSON
    #[arg(short, long, action = clap::ArgAction::SetTrue, default_value_t = false)]
    json: bool,
}

impl Apps {
    pub fn run(&self, ctx: &dyn Context) -> anyhow::Result<()> {
        let ctrl = get_controller(ctx)?;
        ctrl.start_refresh();
        ctrl.wait();

        let catalog = ctrl.catalog();
        let entries = catalog
            .filter(self.filter.as_deref())
            .into_iter()
            .filter(|it| !self.favorites || it.favorite)
            .collect::<Vec<&AppEntry>>();

        if self.json {
            println!("{}", serde_json::to_string_pretty(&entries)?);
            return Ok(());
        }

        let printer = Printer::new();
        if catalog.is_empty() {
            printer.println_colored(
                "No applications found, is a device connected?",
                color::ERROR,
            );
            return Ok(());
        }
        print_grouped(&printer, &entries);
        Ok(())
    }
}

/// Entries under their sticky header character
fn group_by_header<'a>(entries: &[&'a AppEntry]) -> Vec<(char, Vec<&'a AppEntry>)> {
    entries
        .iter()
        .chunk_by(|it| it.header_char())
        .into_iter()
        .map(|(header, group)| (header, group.copied().collect()))
        .collect()
}

fn print_grouped(printer: &Printer, entries: &[&AppEntry]) {
    for (header, group) in group_by_header(entries) {
        printer.println_header(header);
        for entry in group {
            print_entry(printer, entry);
        }
    }
}

fn print_entry(printer: &Printer, entry: &AppEntry) {
    printer.print("  ");
    if entry.favorite {
        printer.print_colored(entry.label(), color::FAVORITE);
    } else {
        printer.print(entry.label());
    }
    if entry.label() != entry.package_name() {
        printer.print(format!(" ({})", entry.package_name()));
    }
    if !entry.info.enabled {
        printer.print_colored(" [disabled]", color::GREY);
    }
    if entry.info.system {
        printer.print_colored(" [system]", color::GREY);
    }
    printer.println("");
}
