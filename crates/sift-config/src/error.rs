//! Error types for sift configuration.

use std::{io, path::PathBuf};

use thiserror::Error;
use toml::{de, ser};

/// Errors that can occur when loading or checking configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path to the file that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// Failed to parse TOML configuration.
    #[error("failed to parse config file {path}: {source}")]
    ParseToml {
        /// Path to the file that could not be parsed.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: de::Error,
    },

    /// Disk storage was selected without a storage path.
    #[error("backend.path is required when storage = \"disk\"")]
    MissingPath,

    /// The n-gram range is empty or inverted.
    #[error("invalid ngram_length [{min}, {max}]: need 1 <= min <= max")]
    InvalidNgramRange {
        /// Lower bound.
        min: usize,
        /// Upper bound.
        max: usize,
    },

    /// The writer thread count is zero.
    #[error("backend.procs must be at least 1")]
    ZeroProcs,

    /// Failed to render settings as TOML.
    #[error("failed to serialize settings: {source}")]
    Serialize {
        /// Underlying TOML serialization error.
        #[from]
        source: ser::Error,
    },

    /// Failed to determine home directory.
    #[error("could not determine home directory")]
    NoHomeDirectory,
}
