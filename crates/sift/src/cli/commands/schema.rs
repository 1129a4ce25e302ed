//! Implementation of `sift schema`.

use std::process::ExitCode;

use crate::cli::{
    args::SchemaCommand,
    context::{CommandContext, parse_content_type},
    output::output_schema,
};

/// Shows the index fields derived from a content type's declared search fields.
pub fn run(ctx: &CommandContext, cmd: &SchemaCommand) -> ExitCode {
    let content_type = match parse_content_type(&cmd.content_type) {
        Ok(ct) => ct,
        Err(code) => return code,
    };
    let backend = match ctx.open_indexed() {
        Ok(backend) => backend,
        Err(code) => return code,
    };
    match backend.schema(&content_type) {
        Ok(schema) => output_schema(&schema, cmd.json),
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
