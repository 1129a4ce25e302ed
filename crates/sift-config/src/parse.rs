//! Configuration file parsing.
//!
//! Parses individual `.sift.toml` files into intermediate `RawConfig` structures
//! that preserve the optional nature of all fields before merging.

use std::{fs, path::Path};

use serde::Deserialize;
use sift_query::Operator;

use crate::{ConfigError, StorageKind, WritePolicy};

/// Raw configuration as parsed directly from a TOML file.
///
/// All fields are optional to support partial configs that will be merged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawConfig {
    /// When true, stop discovery here - ignore parent and global configs.
    pub root: Option<bool>,
    /// Backend settings section.
    pub backend: Option<RawBackend>,
    /// Search settings section.
    pub search: Option<RawSearchSettings>,
}

/// Raw `[backend]` section.
///
/// Upper-case aliases match the settings names hosts already use.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawBackend {
    /// Storage root for on-disk segments.
    #[serde(alias = "PATH")]
    pub path: Option<String>,
    /// Where segments live.
    #[serde(alias = "STORAGE")]
    pub storage: Option<StorageKind>,
    /// Stemmer language name or ISO code.
    #[serde(alias = "LANGUAGE")]
    pub language: Option<String>,
    /// Named text analyzer.
    #[serde(alias = "ANALYZER")]
    pub analyzer: Option<String>,
    /// Writer heap budget in bytes.
    #[serde(alias = "MEMORY")]
    pub memory: Option<usize>,
    /// Writer thread count.
    #[serde(alias = "PROCS")]
    pub procs: Option<usize>,
    /// N-gram range `[min, max]` for partial-match fields.
    #[serde(alias = "NGRAM_LENGTH")]
    pub ngram_length: Option<[usize; 2]>,
    /// Behaviour when another writer holds a segment.
    pub write_policy: Option<WritePolicy>,
    /// Bounded wait for `write_policy = "block"`.
    pub write_timeout_ms: Option<u64>,
    /// Compact segments after deletes.
    pub optimize_after_delete: Option<bool>,
}

/// Raw `[search]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawSearchSettings {
    /// Operator used between plain-text words.
    pub default_operator: Option<Operator>,
    /// Fuzzy matching Levenshtein distance (0 = disabled).
    pub fuzzy_distance: Option<u8>,
    /// Results returned by the CLI when no limit is given.
    pub default_limit: Option<usize>,
}

/// Parses a configuration file from disk.
pub fn parse_config_file(path: &Path) -> Result<RawConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;

    parse_config_str(&contents, path)
}

/// Parses configuration from a TOML string.
///
/// The `path` parameter is used for error reporting.
pub fn parse_config_str(contents: &str, path: &Path) -> Result<RawConfig, ConfigError> {
    toml::from_str(contents).map_err(|source| ConfigError::ParseToml {
        path: path.to_path_buf(),
        source,
    })
}

/// Checks if a config file has `root = true` set.
///
/// Returns false if the file cannot be read or parsed.
pub fn is_root_config(path: &Path) -> bool {
    let Ok(contents) = fs::read_to_string(path) else {
        return false;
    };
    let Ok(config) = toml::from_str::<RawConfig>(&contents) else {
        return false;
    };
    config.root == Some(true)
}
