//! Query compilation.
//!
//! Query expressions come from `sift-query`, either built directly or parsed
//! from the query language:
//!
//! - **Terms**: `python` - words matched against the selected fields
//! - **Phrases**: `"learning python"` - exact sequences on phrase fields
//! - **Negation**: `-draft` - documents that must NOT match
//! - **OR**: `python OR javascript` - alternatives
//! - **Filters**: `status:live` - exact match on a filter field
//! - **Boosting**: `javascript^2` - multiply relevance
//!
//! [`QueryCompiler`] turns them into tantivy queries for one segment schema.

mod compile;

pub use compile::QueryCompiler;
pub use sift_query::{Operator, QueryError, QueryExpr, parse};
