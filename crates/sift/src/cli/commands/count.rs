//! Implementation of `sift count`.

use std::process::ExitCode;

use super::shared::build_request;
use crate::cli::{args::CountCommand, context::CommandContext};

/// Prints how many records a query matches.
pub fn run(ctx: &CommandContext, cmd: &CountCommand) -> ExitCode {
    let request = match build_request(&cmd.query) {
        Ok(request) => request,
        Err(code) => return code,
    };
    let backend = match ctx.open_indexed() {
        Ok(backend) => backend,
        Err(code) => return code,
    };
    match backend.count(&request) {
        Ok(total) => {
            println!("{total}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: count failed: {e}");
            ExitCode::FAILURE
        }
    }
}
