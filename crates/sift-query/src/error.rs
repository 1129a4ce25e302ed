//! Error types for query-string lexing and parsing.

use std::{error, fmt};

use thiserror::Error;

/// Lexer error with position information.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("query syntax error: {message} (at byte {position})")]
pub struct LexError {
    /// Error message.
    pub message: String,
    /// Byte position in input where error occurred.
    pub position: usize,
    /// The original input string.
    pub input: String,
}

impl LexError {
    /// Creates a new lexer error.
    pub fn new(message: impl Into<String>, position: usize, input: &str) -> Self {
        Self {
            message: message.into(),
            position,
            input: input.to_string(),
        }
    }
}

/// Parse error with token position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// Error message.
    pub message: String,
    /// Token index where error occurred (if applicable).
    pub token_index: Option<usize>,
}

impl ParseError {
    /// Creates a new parse error.
    pub fn new(message: impl Into<String>, token_index: Option<usize>) -> Self {
        Self {
            message: message.into(),
            token_index,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.token_index {
            Some(idx) => write!(f, "at token {idx}: {}", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Which stage of query-string processing failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryErrorKind {
    /// Tokenization failed.
    Lex {
        /// Byte position in input.
        position: usize,
    },
    /// The token stream is not a valid expression.
    Parse {
        /// Token index, when known.
        token_index: Option<usize>,
    },
}

/// A query-string error, carrying the original query for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryError {
    /// The kind of error that occurred.
    pub kind: QueryErrorKind,
    /// Error message without context.
    pub message: String,
    /// The original query string.
    pub query: String,
}

impl QueryError {
    /// Wraps a parse error with the query it came from.
    pub fn from_parse(err: ParseError, query: &str) -> Self {
        Self {
            kind: QueryErrorKind::Parse {
                token_index: err.token_index,
            },
            message: err.message,
            query: query.to_string(),
        }
    }

    /// Returns a hint for common mistakes.
    pub fn suggestion(&self) -> Option<&'static str> {
        let msg = self.message.as_str();
        if msg.contains("unclosed quote") {
            Some("add a closing quote (\") to complete the phrase")
        } else if msg.contains("closing parenthesis") {
            Some("add a closing parenthesis ) to match the opening one")
        } else if msg.contains("OR") {
            Some("OR requires expressions on both sides, e.g. 'rust OR golang'")
        } else if msg.contains("filter") {
            Some("filters take a word or a quoted phrase, e.g. status:live")
        } else {
            None
        }
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "query syntax error: {}", self.message)?;
        if let QueryErrorKind::Lex { position } = self.kind {
            let clamped = position.min(self.query.len());
            write!(f, "\n  {}\n  {}^", self.query, " ".repeat(clamped))?;
        } else {
            write!(f, "\n  {}", self.query)?;
        }
        if let Some(hint) = self.suggestion() {
            write!(f, "\nhint: {hint}")?;
        }
        Ok(())
    }
}

impl error::Error for ParseError {}

impl error::Error for QueryError {}

impl From<LexError> for QueryError {
    fn from(err: LexError) -> Self {
        Self {
            kind: QueryErrorKind::Lex {
                position: err.position,
            },
            message: err.message,
            query: err.input,
        }
    }
}
