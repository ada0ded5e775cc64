use clap::{self, Args};

use prefman::Context;

use crate::printer::Printer;
use crate::utils::get_controller;

#[derive(Args)]
pub struct SystemApps {
    /// Flip the setting and reload the application list
    #[arg(short, long, action = clap::ArgAction::SetTrue, default_value_t = false)]
    toggle: bool,
}

impl SystemApps {
    pub fn run(&self, ctx: &dyn Context) -> anyhow::Result<()> {
        let ctrl = get_controller(ctx)?;
        let printer = Printer::new();

        if !self.toggle {
            printer.println(describe(ctrl.show_system_apps()));
            return Ok(());
        }

        let show = ctrl.toggle_show_system_apps()?;
        ctrl.wait();
        printer.println(describe(show));
        printer.println(format!("{} applications listed", ctrl.apps().len()));
        Ok(())
    }
}

fn describe(show: bool) -> &'static str {
    if show {
        "System applications are shown"
    } else {
        "System applications are hidden"
    }
}
