//! Implementation of `sift check`.

use std::{path::PathBuf, process::ExitCode};

use sift_config::{Config, ConfigWarning, StorageKind, discover_config_files};

use crate::cli::context::{CATALOG_SNAPSHOT, CommandContext};

/// Exit codes for `sift check`.
mod exit_codes {
    use std::process::ExitCode;

    /// Configuration is valid with no warnings.
    pub const OK: ExitCode = ExitCode::SUCCESS;
    /// Configuration has warnings but is usable.
    pub const WARNINGS: ExitCode = ExitCode::FAILURE;
    /// Configuration has errors and cannot be used.
    pub const ERROR: ExitCode = ExitCode::FAILURE;
}

/// Validates configuration and reports the state of the storage root.
pub fn run(ctx: &CommandContext) -> ExitCode {
    let config_files: Vec<PathBuf> = match &ctx.global.config {
        Some(path) => vec![ctx.cwd.join(path)],
        None => discover_config_files(&ctx.cwd),
    };

    println!("Checking configuration...");
    println!();

    if config_files.is_empty() {
        println!("No configuration files found; using defaults.");
    } else {
        println!("Config files:");
        for path in &config_files {
            println!("  {}", path.display());
        }
    }
    println!();

    let mut config = match Config::load_from_files(&config_files) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return exit_codes::ERROR;
        }
    };
    if let Some(data) = &ctx.global.data {
        config.backend.path = Some(ctx.cwd.join(data));
        config.backend.storage = StorageKind::Disk;
    }

    if let Err(e) = config.backend.check() {
        eprintln!("error: {e}");
        if config.backend.path.is_none() {
            eprintln!("Set backend.path in .sift.toml or pass --data <dir>.");
        }
        return exit_codes::ERROR;
    }

    print_storage(&config);
    match config.settings_to_toml() {
        Ok(settings) => {
            println!("Effective settings:");
            for line in settings.lines() {
                println!("  {line}");
            }
            println!();
        }
        Err(e) => eprintln!("warning: could not render settings: {e}"),
    }

    let warnings = config.validate();
    if warnings.is_empty() {
        println!("No issues found.");
        return exit_codes::OK;
    }

    println!("Warnings ({}):", warnings.len());
    for warning in &warnings {
        println!("  - {warning}");
    }
    println!();
    print_hints(&warnings);

    exit_codes::WARNINGS
}

/// Prints where segments live and whether an index has been built there.
fn print_storage(config: &Config) {
    println!("Storage:");
    match (config.backend.storage, &config.backend.path) {
        (StorageKind::Memory, _) => println!("  in memory (nothing persists)"),
        (StorageKind::Disk, Some(path)) => {
            let status = if path.join(CATALOG_SNAPSHOT).exists() {
                "indexed"
            } else if path.exists() {
                "empty"
            } else {
                "missing"
            };
            println!("  {} [{status}]", path.display());
        }
        (StorageKind::Disk, None) => println!("  (no path)"),
    }
    println!();
}

/// Prints hints for resolving common warnings.
fn print_hints(warnings: &[ConfigWarning]) {
    let mut hints: Vec<&str> = warnings
        .iter()
        .map(|warning| match warning {
            ConfigWarning::MemoryBelowMinimum { .. } => {
                "Raise backend.memory or lower backend.procs."
            }
            ConfigWarning::FuzzyDistanceTooLarge { .. } => {
                "Set search.fuzzy_distance to 0, 1 or 2."
            }
            ConfigWarning::PathIgnored { .. } => {
                "Remove backend.path or set backend.storage = \"disk\"."
            }
            ConfigWarning::TimeoutIgnored => {
                "Remove backend.write_timeout_ms or set backend.write_policy = \"block\"."
            }
        })
        .collect();
    hints.sort_unstable();
    hints.dedup();

    println!("Hints:");
    for hint in hints {
        println!("  - {hint}");
    }
}
