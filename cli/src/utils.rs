use std::fmt::Display;
use std::io::stdin;
use std::sync::Arc;

use anyhow::{bail, Context as AnyhowContext};
use crossterm::tty::IsTty;
use promptly::{prompt, prompt_default};

use prefman::{get_package_registry, CatalogController, Context, JsonPreferenceStore, RootShell};

use crate::printer::{color, Printer};

pub fn open_store(ctx: &dyn Context) -> anyhow::Result<Arc<JsonPreferenceStore>> {
    let store = JsonPreferenceStore::from_ctx(ctx).with_context(|| "opening preference store")?;
    Ok(Arc::new(store))
}

/// A controller over the configured device's package registry
pub fn get_controller(ctx: &dyn Context) -> anyhow::Result<CatalogController> {
    let registry = get_package_registry(ctx)?;
    let store = open_store(ctx)?;
    Ok(CatalogController::new(Arc::from(registry), store))
}

/// Run `func` against the root shell, offering to retry when root access
/// isn't available
pub fn with_root<T, F>(shell: &dyn RootShell, mut func: F) -> anyhow::Result<T>
where
    F: FnMut(&dyn RootShell) -> prefman::Result<T>,
{
    let printer = Printer::new();
    loop {
        let err = match func(shell) {
            Ok(v) => return Ok(v),
            Err(e) => e,
        };
        if !err.is_not_connected() {
            return Err(err.into());
        }

        printer.println_colored(format!("Root access required: {}", err), color::ERROR);
        printer.flush();
        if !prompt_retry()? {
            bail!(err);
        }
        if !shell.reconnect() {
            log::warn!("root shell still unavailable");
        }
    }
}

fn prompt_retry() -> anyhow::Result<bool> {
    if !stdin().is_tty() {
        return Ok(false);
    }
    match prompt_default("Grant root access on the device and retry?", true) {
        Ok(ans) => Ok(ans),
        Err(e) => bail!("prompt failed: {}", e),
    }
}

pub fn prompt_choice<'a, E: Display>(
    choices: &'a [E],
    desc: &str,
    prompt_text: &str,
) -> anyhow::Result<&'a E> {
    if choices.is_empty() {
        bail!("nothing to choose from");
    }
    println!("{}", desc);
    for (i, c) in choices.iter().enumerate() {
        println!("({}) {}", i, c);
    }

    loop {
        let sel: usize = match prompt(prompt_text) {
            Ok(ans) => ans,
            Err(e) => bail!("prompt failed: {}", e),
        };
        match choices.get(sel) {
            Some(v) => return Ok(v),
            None => eprintln!("invalid selection {}", sel),
        }
    }
}
