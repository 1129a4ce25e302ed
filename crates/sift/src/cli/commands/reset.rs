//! Implementation of `sift reset`.

use std::process::ExitCode;

use sift_index::MemoryCatalog;

use crate::cli::{
    args::ResetCommand,
    context::{CommandContext, parse_content_type},
};

/// Drops every segment under the storage root, including the catalog snapshot.
///
/// With a content type, only that type's segment is emptied and the snapshot
/// is kept.
pub fn run(ctx: &CommandContext, cmd: &ResetCommand) -> ExitCode {
    if let Some(label) = &cmd.content_type {
        return clear(ctx, label);
    }
    if let Err(code) = ctx.storage_root() {
        return code;
    }
    let backend = match ctx.open_backend(MemoryCatalog::new()) {
        Ok(backend) => backend,
        Err(code) => return code,
    };
    if let Err(e) = backend.reset_index() {
        eprintln!("error: reset failed: {e}");
        return ExitCode::FAILURE;
    }
    println!("Index reset.");
    ExitCode::SUCCESS
}

/// Empties one content type's segment.
fn clear(ctx: &CommandContext, label: &str) -> ExitCode {
    let content_type = match parse_content_type(label) {
        Ok(ct) => ct,
        Err(code) => return code,
    };
    let backend = match ctx.open_indexed() {
        Ok(backend) => backend,
        Err(code) => return code,
    };
    if let Err(e) = backend.clear(&content_type) {
        eprintln!("error: clear failed: {e}");
        return ExitCode::FAILURE;
    }
    println!("Cleared {content_type}.");
    ExitCode::SUCCESS
}
