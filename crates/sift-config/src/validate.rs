//! Configuration validation.
//!
//! Fatal problems are returned by [`BackendConfig::check`](crate::BackendConfig::check);
//! everything here is advisory.

use std::fmt;

use crate::{Config, StorageKind};

/// Smallest writer heap the index engine accepts per writer thread.
pub const MIN_MEMORY_PER_THREAD: usize = 15_000_000;

/// Largest fuzzy distance the index engine supports.
const MAX_FUZZY_DISTANCE: u8 = 2;

/// A non-fatal warning about the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// The writer heap is below the engine minimum and will be raised.
    MemoryBelowMinimum {
        /// Configured heap in bytes.
        memory: usize,
        /// Heap the writer will actually use.
        effective: usize,
    },
    /// Fuzzy distance above what the engine supports; it will be clamped.
    FuzzyDistanceTooLarge {
        /// Configured distance.
        distance: u8,
    },
    /// A storage path is set but storage is in memory.
    PathIgnored {
        /// The ignored path.
        path: String,
    },
    /// A write timeout is set but the write policy never waits.
    TimeoutIgnored,
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MemoryBelowMinimum { memory, effective } => write!(
                f,
                "backend.memory = {memory} is below the writer minimum; using {effective}"
            ),
            Self::FuzzyDistanceTooLarge { distance } => write!(
                f,
                "search.fuzzy_distance = {distance} is above {MAX_FUZZY_DISTANCE}; clamping"
            ),
            Self::PathIgnored { path } => {
                write!(f, "backend.path {path} is ignored with in-memory storage")
            }
            Self::TimeoutIgnored => {
                write!(f, "backend.write_timeout_ms is ignored with write_policy = \"fail\"")
            }
        }
    }
}

/// Validates the configuration and returns any warnings.
pub fn validate_config(config: &Config) -> Vec<ConfigWarning> {
    let mut warnings = Vec::new();
    let backend = &config.backend;

    let effective = backend.effective_memory();
    if effective != backend.memory {
        warnings.push(ConfigWarning::MemoryBelowMinimum {
            memory: backend.memory,
            effective,
        });
    }

    if config.search.fuzzy_distance > MAX_FUZZY_DISTANCE {
        warnings.push(ConfigWarning::FuzzyDistanceTooLarge {
            distance: config.search.fuzzy_distance,
        });
    }

    if backend.storage == StorageKind::Memory
        && let Some(ref path) = backend.path
    {
        warnings.push(ConfigWarning::PathIgnored {
            path: path.display().to_string(),
        });
    }

    if backend.write_timeout_ms.is_some() && !backend.write_policy.waits() {
        warnings.push(ConfigWarning::TimeoutIgnored);
    }

    warnings
}

/// Clamps a fuzzy distance to what the engine supports.
pub fn clamp_fuzzy_distance(distance: u8) -> u8 {
    distance.min(MAX_FUZZY_DISTANCE)
}
