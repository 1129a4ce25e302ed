//! Command-line interface for the `sift` search backend.

use std::{io, process::ExitCode};

use clap::Parser;
use sift::cli::{
    CommandContext,
    args::{Cli, Commands},
    commands,
};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Environment variable holding a tracing filter directive.
const LOG_ENV: &str = "SIFT_LOG";

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose);

    let loaded = if matches!(cli.command, Commands::Check) {
        CommandContext::load_cwd_only(&cli.global)
    } else {
        CommandContext::load(&cli.global)
    };
    let ctx = match loaded {
        Ok(ctx) => ctx,
        Err(code) => return code,
    };
    commands::run(cli.command, &ctx)
}

/// Installs a stderr subscriber. `SIFT_LOG` wins over `-v`.
fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(filter));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(io::stderr))
        .init();
}
