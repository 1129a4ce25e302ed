//! Command implementations and dispatch.

pub mod check;
pub mod count;
pub mod delete;
pub mod index;
pub mod reset;
pub mod schema;
pub mod search;
mod shared;

use std::process::ExitCode;

use super::{args::Commands, context::CommandContext};

/// Dispatches to the selected subcommand.
pub fn run(command: Commands, ctx: &CommandContext) -> ExitCode {
    match command {
        Commands::Index(cmd) => index::run(ctx, &cmd),
        Commands::Search(cmd) => search::run(ctx, &cmd),
        Commands::Count(cmd) => count::run(ctx, &cmd),
        Commands::Delete(cmd) => delete::run(ctx, &cmd),
        Commands::Reset(cmd) => reset::run(ctx, &cmd),
        Commands::Schema(cmd) => schema::run(ctx, &cmd),
        Commands::Check => check::run(ctx),
    }
}
