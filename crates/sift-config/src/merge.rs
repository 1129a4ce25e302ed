//! Configuration merging.
//!
//! Merges multiple `RawConfig` files into a single resolved `Config`, applying precedence
//! rules and resolving the storage path against the file that set it.

use std::path::{Path, PathBuf};

use crate::{
    BackendConfig, Config, ConfigError, NgramRange, SearchSettings,
    parse::{RawBackend, RawConfig, RawSearchSettings},
    resolve::resolve_storage_path,
};

/// A parsed config file with its source path.
pub struct ParsedConfig {
    /// Path to the config file.
    pub path: PathBuf,
    /// Parsed raw configuration.
    pub config: RawConfig,
}

/// Merges multiple configuration files into a single resolved `Config`.
///
/// Configs should be provided in precedence order: highest precedence first (closest to CWD),
/// lowest precedence last (global config). For every key the first defined value wins.
pub fn merge_configs(configs: &[ParsedConfig]) -> Result<Config, ConfigError> {
    let mut backend = BackendConfig::default();
    let mut search = SearchSettings::default();

    // Lowest precedence first so higher precedence overwrites.
    for parsed in configs.iter().rev() {
        let config_dir = parsed.path.parent().unwrap_or_else(|| Path::new("."));
        if let Some(ref raw) = parsed.config.backend {
            apply_raw_backend(&mut backend, raw, config_dir)?;
        }
        if let Some(ref raw) = parsed.config.search {
            apply_raw_search(&mut search, raw);
        }
    }

    let config_root = configs
        .first()
        .and_then(|c| c.path.parent())
        .map(Path::to_path_buf);

    Ok(Config {
        backend,
        search,
        config_root,
    })
}

/// Applies raw backend settings to result, overwriting any present values.
fn apply_raw_backend(
    result: &mut BackendConfig,
    raw: &RawBackend,
    config_dir: &Path,
) -> Result<(), ConfigError> {
    if let Some(ref v) = raw.path {
        result.path = Some(resolve_storage_path(v, config_dir)?);
    }
    if let Some(v) = raw.storage {
        result.storage = v;
    }
    if let Some(ref v) = raw.language {
        result.language = v.clone();
    }
    if let Some(ref v) = raw.analyzer {
        result.analyzer = Some(v.clone());
    }
    if let Some(v) = raw.memory {
        result.memory = v;
    }
    if let Some(v) = raw.procs {
        result.procs = v;
    }
    if let Some([min, max]) = raw.ngram_length {
        result.ngram_length = NgramRange { min, max };
    }
    if let Some(v) = raw.write_policy {
        result.write_policy = v;
    }
    if let Some(v) = raw.write_timeout_ms {
        result.write_timeout_ms = Some(v);
    }
    if let Some(v) = raw.optimize_after_delete {
        result.optimize_after_delete = v;
    }
    Ok(())
}

/// Applies raw search settings to result.
fn apply_raw_search(result: &mut SearchSettings, raw: &RawSearchSettings) {
    if let Some(v) = raw.default_operator {
        result.default_operator = v;
    }
    if let Some(v) = raw.fuzzy_distance {
        result.fuzzy_distance = v;
    }
    if let Some(v) = raw.default_limit {
        result.default_limit = v;
    }
}

#[cfg(test)]
mod tests {
    use sift_query::Operator;

    use super::*;
    use crate::{StorageKind, WritePolicy, parse::parse_config_str};

    fn parsed(path: &str, toml: &str) -> ParsedConfig {
        ParsedConfig {
            path: PathBuf::from(path),
            config: parse_config_str(toml, Path::new(path)).unwrap(),
        }
    }

    #[test]
    fn test_merge_empty() {
        let config = merge_configs(&[]).unwrap();
        assert!(config.backend.path.is_none());
        assert!(config.config_root.is_none());
    }

    #[test]
    fn test_closest_config_wins_per_key() {
        let configs = [
            parsed(
                "/srv/site/.sift.toml",
                "[backend]\nprocs = 4\n[search]\ndefault_operator = \"and\"\n",
            ),
            parsed(
                "/home/me/.sift.toml",
                "[backend]\npath = \"idx\"\nprocs = 1\nwrite_policy = \"fail\"\n",
            ),
        ];

        let config = merge_configs(&configs).unwrap();
        assert_eq!(config.backend.procs, 4);
        assert_eq!(config.backend.write_policy, WritePolicy::Fail);
        assert_eq!(config.search.default_operator, Operator::And);
        assert_eq!(config.config_root, Some(PathBuf::from("/srv/site")));
    }

    #[test]
    fn test_path_resolves_against_defining_file() {
        let configs = [
            parsed("/srv/site/.sift.toml", "[backend]\nstorage = \"memory\"\n"),
            parsed("/home/me/.sift.toml", "[backend]\npath = \"idx\"\n"),
        ];

        let config = merge_configs(&configs).unwrap();
        assert_eq!(config.backend.path, Some(PathBuf::from("/home/me/idx")));
        assert_eq!(config.backend.storage, StorageKind::Memory);
    }

    #[test]
    fn test_ngram_length() {
        let configs = [parsed("/a/.sift.toml", "[backend]\nNGRAM_LENGTH = [1, 3]\n")];
        let config = merge_configs(&configs).unwrap();
        assert_eq!(config.backend.ngram_length, NgramRange { min: 1, max: 3 });
    }
}
