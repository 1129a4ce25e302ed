//! Shared context for running CLI commands.

use std::{
    env,
    path::{Path, PathBuf},
    process::ExitCode,
};

use sift_config::{Config, StorageKind};
use sift_index::{ContentType, MemoryCatalog, SearchBackend, load_fixture};
use tracing::debug;

use super::args::GlobalArgs;

/// File name of the catalog snapshot written next to the segments by `sift index`.
pub const CATALOG_SNAPSHOT: &str = "catalog.json";

/// Command execution context built once per CLI invocation.
#[derive(Debug)]
pub struct CommandContext {
    /// Current working directory.
    pub cwd: PathBuf,
    /// Loaded configuration with command-line overrides applied.
    pub config: Config,
    /// Options shared by every command.
    pub global: GlobalArgs,
}

impl CommandContext {
    /// Loads the current directory and configuration.
    pub fn load(global: &GlobalArgs) -> Result<Self, ExitCode> {
        let cwd = current_dir_or_failure()?;
        let mut config = load_config_or_failure(&cwd, global.config.as_deref())?;
        if let Some(data) = &global.data {
            config.backend.path = Some(cwd.join(data));
            config.backend.storage = StorageKind::Disk;
        }
        debug!(
            path = ?config.backend.path,
            storage = ?config.backend.storage,
            "configuration loaded"
        );
        Ok(Self {
            cwd,
            config,
            global: global.clone(),
        })
    }

    /// Loads only the current directory, skipping configuration parsing.
    ///
    /// Used by `check`, which must work even when a config file is invalid.
    pub fn load_cwd_only(global: &GlobalArgs) -> Result<Self, ExitCode> {
        let cwd = current_dir_or_failure()?;
        Ok(Self {
            cwd,
            config: Config::default(),
            global: global.clone(),
        })
    }

    /// The storage root, required by every command that touches segments.
    pub fn storage_root(&self) -> Result<&Path, ExitCode> {
        self.config.backend.path.as_deref().ok_or_else(|| {
            eprintln!("error: no index path configured");
            eprintln!("Set backend.path in .sift.toml or pass --data <dir>.");
            ExitCode::FAILURE
        })
    }

    /// Where `sift index` keeps its copy of the catalog fixture.
    pub fn snapshot_path(&self) -> Result<PathBuf, ExitCode> {
        Ok(self.storage_root()?.join(CATALOG_SNAPSHOT))
    }

    /// Opens a backend over `catalog`.
    pub fn open_backend(
        &self,
        catalog: MemoryCatalog,
    ) -> Result<SearchBackend<MemoryCatalog>, ExitCode> {
        SearchBackend::new(&self.config, catalog).map_err(|e| {
            eprintln!("error: failed to open index: {e}");
            ExitCode::FAILURE
        })
    }

    /// Opens a backend over the catalog snapshot of the last `sift index` run.
    pub fn open_indexed(&self) -> Result<SearchBackend<MemoryCatalog>, ExitCode> {
        let snapshot = self.snapshot_path()?;
        if !snapshot.exists() {
            eprintln!("error: no catalog found at {}", snapshot.display());
            eprintln!("Run 'sift index <fixture>' to build the index first.");
            return Err(ExitCode::FAILURE);
        }
        let catalog = load_fixture(&snapshot).map_err(|e| {
            eprintln!("error: failed to load catalog: {e}");
            ExitCode::FAILURE
        })?;
        self.open_backend(catalog)
    }
}

/// Parses a content type label or exits with an error.
pub fn parse_content_type(label: &str) -> Result<ContentType, ExitCode> {
    label.parse().map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::FAILURE
    })
}

/// Returns the current working directory or exits with a consistent error.
fn current_dir_or_failure() -> Result<PathBuf, ExitCode> {
    env::current_dir().map_err(|e| {
        eprintln!("error: could not determine current directory: {e}");
        ExitCode::FAILURE
    })
}

/// Loads configuration from an explicit file or by discovery from `cwd`.
fn load_config_or_failure(cwd: &Path, explicit: Option<&Path>) -> Result<Config, ExitCode> {
    let loaded = match explicit {
        Some(path) => Config::load_from_files(&[cwd.join(path)]),
        None => Config::load(cwd),
    };
    loaded.map_err(|e| {
        eprintln!("error: failed to load configuration: {e}");
        ExitCode::FAILURE
    })
}
