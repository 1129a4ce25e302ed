//! Implementation of `sift delete`.

use std::process::ExitCode;

use crate::cli::{
    args::DeleteCommand,
    context::{CommandContext, parse_content_type},
};

/// Removes one record from every segment it was written to.
///
/// The catalog snapshot is left alone; a later `sift index` restores the record.
pub fn run(ctx: &CommandContext, cmd: &DeleteCommand) -> ExitCode {
    let content_type = match parse_content_type(&cmd.content_type) {
        Ok(ct) => ct,
        Err(code) => return code,
    };
    let backend = match ctx.open_indexed() {
        Ok(backend) => backend,
        Err(code) => return code,
    };
    if let Err(e) = backend.delete_pk(&content_type, &cmd.pk) {
        eprintln!("error: delete failed: {e}");
        return ExitCode::FAILURE;
    }
    println!("Deleted {content_type} {}", cmd.pk);
    ExitCode::SUCCESS
}
