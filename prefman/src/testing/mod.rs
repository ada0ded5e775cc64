use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;

use crate::command::CmdOutput;

mod adb;
pub use adb::*;

mod context;
pub use context::*;

mod shell;
pub use shell::*;

/// Build the output of a finished command
pub fn cmd_output(code: i32, stdout: &str, stderr: &str) -> CmdOutput {
    CmdOutput {
        status: ExitStatus::from_raw(code << 8),
        stdout: stdout.as_bytes().to_vec(),
        stderr: stderr.as_bytes().to_vec(),
    }
}
