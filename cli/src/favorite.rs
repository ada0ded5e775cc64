use clap::{self, Args};

use prefman::{Context, Favorites};

use crate::parsers::PackageNameValueParser;
use crate::printer::{color, Printer};
use crate::utils::open_store;

#[derive(Args)]
pub struct Favorite {
    /// Package to add to the favorites, omit to list them
    #[arg(value_parser = PackageNameValueParser)]
    package: Option<String>,

    /// Remove the package from the favorites instead
    #[arg(short, long, action = clap::ArgAction::SetTrue, default_value_t = false)]
    remove: bool,
}

impl Favorite {
    pub fn run(&self, ctx: &dyn Context) -> anyhow::Result<()> {
        let favorites = Favorites::new(open_store(ctx)?);
        let printer = Printer::new();

        let package = match &self.package {
            Some(v) => v,
            None => {
                for pkg in favorites.all() {
                    printer.println_colored(pkg, color::FAVORITE);
                }
                return Ok(());
            }
        };

        favorites.set_favorite(package, !self.remove)?;
        if self.remove {
            printer.println(format!("Removed {} from the favorites", package));
        } else {
            printer.println_colored(format!("Added {} to the favorites", package), color::OK);
        }
        Ok(())
    }
}
