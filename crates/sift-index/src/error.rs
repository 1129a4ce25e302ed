//! Error types for the sift-index crate.

use std::{io, path::PathBuf};

use sift_config::ConfigError;
use tantivy::{TantivyError, directory::error::LockError};
use thiserror::Error;

use crate::catalog::CatalogError;

/// Errors that can occur when working with the search backend.
#[derive(Debug, Error)]
pub enum IndexError {
    /// The backend configuration is unusable.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Invalid stemmer language.
    #[error("unsupported stemmer language: {0}")]
    InvalidLanguage(String),

    /// Unknown analyzer name.
    #[error("unknown analyzer '{0}' (expected standard, stemming or whitespace)")]
    UnknownAnalyzer(String),

    /// The storage root cannot be created or written.
    #[error("the index path {path} is not writable: {source}")]
    StorageNotWritable {
        /// Storage root.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// A field or query boost is negative or not finite.
    #[error("invalid boost {boost} on {target}")]
    InvalidBoost {
        /// Field or query node carrying the boost.
        target: String,
        /// The rejected value.
        boost: f32,
    },

    /// A related field declares another related field.
    #[error("related field '{parent}' cannot contain related field '{child}'")]
    NestedRelated {
        /// Outer related field.
        parent: String,
        /// Inner related field.
        child: String,
    },

    /// Two declared fields map to the same index field.
    #[error("field '{field}' is declared more than once for {content_type}")]
    SchemaConflict {
        /// Content type being built.
        content_type: String,
        /// Colliding index field name.
        field: String,
    },

    /// A declared field name cannot be used as an index field name.
    #[error("invalid field name '{field}' for {content_type}")]
    InvalidFieldName {
        /// Content type being built.
        content_type: String,
        /// Offending index field name.
        field: String,
    },

    /// The query cannot run against the selected fields.
    #[error("{kind} queries are not supported here: {reason}")]
    UnsupportedQuery {
        /// Query node kind.
        kind: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// A field restriction or filter names a field the content type does not declare.
    #[error("unknown field '{field}' for {content_type}")]
    UnknownField {
        /// Content type searched.
        content_type: String,
        /// Requested field.
        field: String,
    },

    /// Another writer holds the segment and the write policy does not wait.
    #[error("segment {content_type} is locked by another writer")]
    WriteConflict {
        /// Segment content type.
        content_type: String,
    },

    /// The index engine failed on a segment.
    #[error("segment {content_type}: {message}")]
    SegmentIo {
        /// Segment content type.
        content_type: String,
        /// Engine error message.
        message: String,
    },

    /// A content type label is malformed.
    #[error("invalid content type '{0}' (expected app_label.model)")]
    InvalidContentType(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The system of record failed.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl IndexError {
    /// Maps an engine error on a segment, recognising writer lock contention.
    pub(crate) fn segment(content_type: &str, source: &TantivyError) -> Self {
        match source {
            TantivyError::LockFailure(LockError::LockBusy, _) => Self::WriteConflict {
                content_type: content_type.to_string(),
            },
            other => Self::SegmentIo {
                content_type: content_type.to_string(),
                message: other.to_string(),
            },
        }
    }

    /// Whether this error is raised while constructing the backend or a schema.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::InvalidLanguage(_)
                | Self::UnknownAnalyzer(_)
                | Self::StorageNotWritable { .. }
                | Self::InvalidBoost { .. }
                | Self::NestedRelated { .. }
                | Self::SchemaConflict { .. }
                | Self::InvalidFieldName { .. }
        )
    }
}
