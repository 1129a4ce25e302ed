//! sift: a search backend with one index segment per content type.
//!
//! The `sift` binary manages an index built from a JSON catalog fixture:
//! it rebuilds segments, runs searches across a type hierarchy, deletes
//! records and inspects the derived schemas.

#![warn(missing_docs)]

pub mod cli;
