use clap::{self, Args};

use prefman::{get_root_shell, Context, Discovery};

use crate::parsers::PackageNameValueParser;
use crate::printer::{color, Printer};
use crate::utils::with_root;

#[derive(Args)]
pub struct Files {
    /// Package to search
    #[arg(value_parser = PackageNameValueParser)]
    package: String,

    /// Print the files as JSON
    #[arg(short, long, action = clap::ArgAction::SetTrue, default_value_t = false)]
    json: bool,
}

impl Files {
    pub fn run(&self, ctx: &dyn Context) -> anyhow::Result<()> {
        let shell = get_root_shell(ctx)?;
        let files = with_root(shell.as_ref(), |shell| {
            Discovery::from_ctx(shell, ctx)?.find_xml_files(&self.package)
        })?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&files)?);
            return Ok(());
        }

        let printer = Printer::new();
        if files.is_empty() {
            printer.println_colored(
                format!("No preference files found for {}", self.package),
                color::ERROR,
            );
            return Ok(());
        }
        for file in files {
            printer.print_colored(format!("{}/", file.path), color::GREY);
            printer.println(&file.name);
        }
        Ok(())
    }
}
