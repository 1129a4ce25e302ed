//! Query expressions for sift.
//!
//! The engine compiles a small query algebra ([`QueryExpr`]) against each
//! content type's index schema. This crate defines that algebra and a parser
//! for the textual form used by the CLI:
//!
//! - **Terms**: `rust` - words that must appear
//! - **Phrases**: `"error handling"` - exact sequences
//! - **Match all**: `*`
//! - **Negation**: `-deprecated` - terms that must NOT appear
//! - **OR**: `rust OR golang` - alternatives
//! - **Grouping**: `(a b) OR (c d)` - precedence control
//! - **Filters**: `status:live` - exact match on a filter field
//! - **Boosting**: `rust^2.5` - adjust term importance
//!
//! # Example
//!
//! ```
//! use sift_query::{QueryExpr, parse};
//!
//! let expr = parse("status:live (rust OR golang) -deprecated").unwrap();
//! assert!(matches!(expr, Some(QueryExpr::And(_))));
//! ```

mod ast;
mod error;
mod lexer;
mod parser;

pub use ast::{Operator, ParseOperatorError, QueryExpr};
pub use error::{LexError, ParseError, QueryError, QueryErrorKind};
pub use lexer::{Token, tokenize};
pub use parser::parse;
