//! Configuration system for sift.
//!
//! sift uses TOML configuration files named `.sift.toml`. Configuration is resolved by walking
//! up the directory tree from the current working directory, collecting any `.sift.toml` files
//! found, then loading `~/.sift.toml` as the global config with lowest precedence. Setting
//! `SIFT_CONFIG` to a file path loads that file alone.
//!
//! ```toml
//! [backend]
//! path = "./search-index"
//! language = "english"
//! ngram_length = [2, 4]
//!
//! [search]
//! default_operator = "or"
//! ```

mod discovery;
mod error;
mod merge;
mod parse;
mod resolve;
mod validate;

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

pub use discovery::{CONFIG_ENV, CONFIG_FILENAME, discover_config_files};
pub use error::ConfigError;
pub use merge::{ParsedConfig, merge_configs};
pub use parse::{RawBackend, RawConfig, RawSearchSettings, parse_config_file, parse_config_str};
pub use resolve::resolve_storage_path;
use serde::{Deserialize, Serialize};
use sift_query::Operator;
pub use validate::{ConfigWarning, MIN_MEMORY_PER_THREAD, clamp_fuzzy_distance};
use validate::validate_config;

/// Top-level merged configuration for sift.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Index storage and writer settings.
    pub backend: BackendConfig,
    /// Query defaults.
    pub search: SearchSettings,
    /// Directory containing the most specific config file.
    pub config_root: Option<PathBuf>,
}

impl Config {
    /// Loads configuration by discovering and merging all relevant `.sift.toml` files.
    ///
    /// Returns `Ok(Config::default())` if no configuration files are found.
    pub fn load(cwd: &Path) -> Result<Self, ConfigError> {
        let config_files = discover_config_files(cwd);
        Self::load_from_files(&config_files)
    }

    /// Loads configuration from a specific list of config file paths.
    ///
    /// Files should be provided in precedence order: highest precedence first.
    pub fn load_from_files(files: &[PathBuf]) -> Result<Self, ConfigError> {
        let parsed = files
            .iter()
            .map(|path| {
                let config = parse_config_file(path)?;
                Ok(ParsedConfig {
                    path: path.clone(),
                    config,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        merge_configs(&parsed)
    }

    /// A configuration that keeps every segment in memory.
    pub fn in_memory() -> Self {
        Self {
            backend: BackendConfig {
                storage: StorageKind::Memory,
                ..BackendConfig::default()
            },
            ..Self::default()
        }
    }

    /// A configuration that stores segments under `path`.
    pub fn on_disk(path: impl Into<PathBuf>) -> Self {
        Self {
            backend: BackendConfig {
                path: Some(path.into()),
                ..BackendConfig::default()
            },
            ..Self::default()
        }
    }

    /// Validates the configuration and returns any warnings.
    ///
    /// This checks for:
    /// - A writer heap below the per-thread minimum
    /// - A fuzzy distance the engine cannot honour
    /// - Settings that are ignored in combination with others
    pub fn validate(&self) -> Vec<ConfigWarning> {
        validate_config(self)
    }

    /// Serializes the effective settings to TOML format.
    pub fn settings_to_toml(&self) -> Result<String, ConfigError> {
        let serializable = SerializableSettings {
            backend: &self.backend,
            search: &self.search,
        };
        Ok(toml::to_string_pretty(&serializable)?)
    }
}

/// Where segments are stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// One directory per content type under `path`.
    #[default]
    Disk,
    /// Process-local RAM; nothing persists.
    Memory,
}

/// What a write does when another writer holds the segment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WritePolicy {
    /// Wait for the writer, optionally bounded by `write_timeout_ms`.
    #[default]
    Block,
    /// Fail immediately.
    Fail,
}

impl WritePolicy {
    /// Whether the policy waits for a busy writer.
    pub fn waits(self) -> bool {
        matches!(self, Self::Block)
    }
}

/// Inclusive n-gram length range for partial-match fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NgramRange {
    /// Shortest gram.
    pub min: usize,
    /// Longest gram.
    pub max: usize,
}

impl Default for NgramRange {
    fn default() -> Self {
        Self { min: 2, max: 4 }
    }
}

/// The `[backend]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Storage root. Required for disk storage.
    pub path: Option<PathBuf>,
    /// Where segments live.
    pub storage: StorageKind,
    /// Stemmer language name or ISO code.
    pub language: String,
    /// Named text analyzer; `None` picks one from `language`.
    pub analyzer: Option<String>,
    /// Writer heap budget in bytes.
    pub memory: usize,
    /// Writer thread count.
    pub procs: usize,
    /// N-gram range for partial-match and autocomplete fields.
    pub ngram_length: NgramRange,
    /// Write contention policy.
    pub write_policy: WritePolicy,
    /// Bounded wait for the `block` policy.
    pub write_timeout_ms: Option<u64>,
    /// Compact segments after deletes.
    pub optimize_after_delete: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            path: None,
            storage: StorageKind::Disk,
            language: String::from("english"),
            analyzer: None,
            memory: 50_000_000,
            procs: 1,
            ngram_length: NgramRange::default(),
            write_policy: WritePolicy::Block,
            write_timeout_ms: None,
            optimize_after_delete: false,
        }
    }
}

impl BackendConfig {
    /// Rejects settings the backend cannot start with.
    pub fn check(&self) -> Result<(), ConfigError> {
        if self.storage == StorageKind::Disk && self.path.is_none() {
            return Err(ConfigError::MissingPath);
        }
        if self.procs == 0 {
            return Err(ConfigError::ZeroProcs);
        }
        let NgramRange { min, max } = self.ngram_length;
        if min == 0 || min > max {
            return Err(ConfigError::InvalidNgramRange { min, max });
        }
        Ok(())
    }

    /// Writer heap actually used: at least the engine minimum per thread.
    pub fn effective_memory(&self) -> usize {
        self.memory.max(MIN_MEMORY_PER_THREAD * self.procs.max(1))
    }

    /// Bounded wait for a busy writer, if any.
    pub fn write_timeout(&self) -> Option<Duration> {
        self.write_timeout_ms.map(Duration::from_millis)
    }
}

/// The `[search]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Operator between plain-text words when a query does not name one.
    pub default_operator: Operator,
    /// Fuzzy matching Levenshtein distance (0 = disabled).
    pub fuzzy_distance: u8,
    /// Results returned by the CLI when no limit is given.
    pub default_limit: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            default_operator: Operator::Or,
            fuzzy_distance: 0,
            default_limit: 10,
        }
    }
}

/// Internal struct for TOML serialization of settings.
#[derive(Serialize)]
struct SerializableSettings<'a> {
    /// Backend settings.
    backend: &'a BackendConfig,
    /// Search settings.
    search: &'a SearchSettings,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_defaults() {
        let backend = BackendConfig::default();
        assert_eq!(backend.storage, StorageKind::Disk);
        assert_eq!(backend.language, "english");
        assert_eq!(backend.memory, 50_000_000);
        assert_eq!(backend.procs, 1);
        assert_eq!(backend.ngram_length, NgramRange { min: 2, max: 4 });
        assert_eq!(backend.write_policy, WritePolicy::Block);
        assert!(!backend.optimize_after_delete);
    }

    #[test]
    fn test_search_defaults() {
        let search = SearchSettings::default();
        assert_eq!(search.default_operator, Operator::Or);
        assert_eq!(search.fuzzy_distance, 0);
        assert_eq!(search.default_limit, 10);
    }

    #[test]
    fn test_check_requires_path_for_disk() {
        let config = Config::default();
        assert!(matches!(config.backend.check(), Err(ConfigError::MissingPath)));
        assert!(Config::in_memory().backend.check().is_ok());
        assert!(Config::on_disk("/tmp/x").backend.check().is_ok());
    }

    #[test]
    fn test_check_rejects_bad_ranges() {
        let mut config = Config::in_memory();
        config.backend.ngram_length = NgramRange { min: 4, max: 2 };
        assert!(matches!(
            config.backend.check(),
            Err(ConfigError::InvalidNgramRange { min: 4, max: 2 })
        ));

        config.backend.ngram_length = NgramRange::default();
        config.backend.procs = 0;
        assert!(matches!(config.backend.check(), Err(ConfigError::ZeroProcs)));
    }

    #[test]
    fn test_effective_memory() {
        let mut backend = BackendConfig {
            memory: 1024,
            procs: 3,
            ..BackendConfig::default()
        };
        assert_eq!(backend.effective_memory(), 45_000_000);
        backend.memory = 100_000_000;
        assert_eq!(backend.effective_memory(), 100_000_000);
    }

    #[test]
    fn test_settings_to_toml() {
        let config = Config::on_disk("/var/lib/sift");
        let toml = config.settings_to_toml().unwrap();

        assert!(toml.contains("[backend]"));
        assert!(toml.contains("[search]"));
        assert!(toml.contains("language = \"english\""));
        assert!(toml.contains("default_operator = \"or\""));

        let parsed: toml::Value = toml::from_str(&toml).unwrap();
        assert!(parsed.get("backend").is_some());
    }
}
