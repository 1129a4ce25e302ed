//! Query abstract syntax tree.
//!
//! Represents query expressions before compilation to search engine queries.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How the words of a plain-text query combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    /// Every word must match.
    And,
    /// At least one word must match.
    #[default]
    Or,
}

/// Error returned when an operator name is not `and` or `or`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown operator '{0}' (expected 'and' or 'or')")]
pub struct ParseOperatorError(pub String);

impl FromStr for Operator {
    type Err = ParseOperatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "and" => Ok(Self::And),
            "or" => Ok(Self::Or),
            _ => Err(ParseOperatorError(s.to_string())),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => write!(f, "AND"),
            Self::Or => write!(f, "OR"),
        }
    }
}

/// A query expression.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryExpr {
    /// Matches every document.
    MatchAll,

    /// A single search term with its own boost.
    Term {
        /// The literal text.
        text: String,
        /// Score multiplier for this term.
        boost: f32,
    },

    /// Free text whose words combine with an operator.
    PlainText {
        /// The raw text; words are split on whitespace.
        text: String,
        /// Word operator. `None` defers to the request or backend default.
        operator: Option<Operator>,
    },

    /// An exact phrase (sequence of terms).
    Phrase(String),

    /// Exact match against a filter field.
    Filter {
        /// Declared field name.
        field: String,
        /// Value compared verbatim.
        value: String,
    },

    /// Negation: results must NOT match this expression.
    Not(Box<Self>),

    /// Conjunction: all sub-expressions must match.
    And(Vec<Self>),

    /// Disjunction: at least one sub-expression must match.
    Or(Vec<Self>),

    /// Boosted query: multiplies the score of the inner expression.
    Boost {
        /// The expression to boost.
        expr: Box<Self>,
        /// The boost factor (e.g., 2.5 means 2.5x the normal score).
        factor: f32,
    },
}

impl QueryExpr {
    /// Creates an unboosted term.
    pub fn term(text: impl Into<String>) -> Self {
        Self::Term {
            text: text.into(),
            boost: 1.0,
        }
    }

    /// Creates a plain-text query that uses the default operator.
    pub fn plain_text(text: impl Into<String>) -> Self {
        Self::PlainText {
            text: text.into(),
            operator: None,
        }
    }

    /// Creates a plain-text query with an explicit word operator.
    pub fn plain_text_with(text: impl Into<String>, operator: Operator) -> Self {
        Self::PlainText {
            text: text.into(),
            operator: Some(operator),
        }
    }

    /// Creates a phrase query.
    pub fn phrase(text: impl Into<String>) -> Self {
        Self::Phrase(text.into())
    }

    /// Creates a filter-field match.
    pub fn filter(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Filter {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Negates an expression.
    #[allow(clippy::should_implement_trait)]
    pub fn not(expr: Self) -> Self {
        Self::Not(Box::new(expr))
    }

    /// Creates an And expression, flattening nested Ands.
    pub fn and(exprs: Vec<Self>) -> Self {
        let mut flattened: Vec<Self> = exprs
            .into_iter()
            .flat_map(|e| match e {
                Self::And(inner) => inner,
                other => vec![other],
            })
            .collect();

        match flattened.len() {
            1 => flattened.remove(0),
            _ => Self::And(flattened),
        }
    }

    /// Creates an Or expression, flattening nested Ors.
    pub fn or(exprs: Vec<Self>) -> Self {
        let mut flattened: Vec<Self> = exprs
            .into_iter()
            .flat_map(|e| match e {
                Self::Or(inner) => inner,
                other => vec![other],
            })
            .collect();

        match flattened.len() {
            1 => flattened.remove(0),
            _ => Self::Or(flattened),
        }
    }

    /// Creates a boosted expression.
    pub fn boost(expr: Self, factor: f32) -> Self {
        Self::Boost {
            expr: Box::new(expr),
            factor,
        }
    }

    /// Returns the variant name, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MatchAll => "MatchAll",
            Self::Term { .. } => "Term",
            Self::PlainText { .. } => "PlainText",
            Self::Phrase(_) => "Phrase",
            Self::Filter { .. } => "Filter",
            Self::Not(_) => "Not",
            Self::And(_) => "And",
            Self::Or(_) => "Or",
            Self::Boost { .. } => "Boost",
        }
    }

    /// Formats the expression as a tree structure with the given indentation level.
    fn fmt_tree(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        let prefix = "  ".repeat(indent);
        match self {
            Self::MatchAll => writeln!(f, "{prefix}MatchAll"),
            Self::Term { text, boost } => writeln!(f, "{prefix}Term({text:?}, {boost})"),
            Self::PlainText { text, operator } => match operator {
                Some(op) => writeln!(f, "{prefix}PlainText({text:?}, {op})"),
                None => writeln!(f, "{prefix}PlainText({text:?})"),
            },
            Self::Phrase(text) => writeln!(f, "{prefix}Phrase({text:?})"),
            Self::Filter { field, value } => writeln!(f, "{prefix}Filter({field}={value:?})"),
            Self::Not(inner) => {
                writeln!(f, "{prefix}Not")?;
                inner.fmt_tree(f, indent + 1)
            }
            Self::And(exprs) => {
                writeln!(f, "{prefix}And")?;
                for expr in exprs {
                    expr.fmt_tree(f, indent + 1)?;
                }
                Ok(())
            }
            Self::Or(exprs) => {
                writeln!(f, "{prefix}Or")?;
                for expr in exprs {
                    expr.fmt_tree(f, indent + 1)?;
                }
                Ok(())
            }
            Self::Boost { expr, factor } => {
                writeln!(f, "{prefix}Boost({factor})")?;
                expr.fmt_tree(f, indent + 1)
            }
        }
    }

    /// Formats the expression as a query string (human-readable form).
    ///
    /// This produces output like: `(python OR javascript^2)`. Plain text is
    /// rendered with its operator spelled out between the words, so the
    /// string round-trips through [`crate::parse`] only for the subset the
    /// parser understands.
    pub fn to_query_string(&self) -> String {
        match self {
            Self::MatchAll => "*".to_string(),
            Self::Term { text, boost } => with_boost(text.clone(), *boost),
            Self::PlainText { text, operator } => {
                let words: Vec<&str> = text.split_whitespace().collect();
                match (words.len(), operator) {
                    (0, _) => String::new(),
                    (1, _) => words[0].to_string(),
                    (_, Some(op)) => format!("({})", words.join(&format!(" {op} "))),
                    (_, None) => format!("({})", words.join(" ")),
                }
            }
            Self::Phrase(text) => format!("\"{text}\""),
            Self::Filter { field, value } => format!("{field}:{value}"),
            Self::Not(inner) => format!("-{}", inner.to_query_string()),
            Self::And(exprs) => {
                let parts: Vec<String> = exprs.iter().map(Self::to_query_string).collect();
                match parts.len() {
                    0 => "*".to_string(),
                    1 => parts.join(""),
                    _ => format!("({})", parts.join(" ")),
                }
            }
            Self::Or(exprs) => {
                let parts: Vec<String> = exprs.iter().map(Self::to_query_string).collect();
                match parts.len() {
                    0 => "()".to_string(),
                    1 => parts.join(""),
                    _ => format!("({})", parts.join(" OR ")),
                }
            }
            Self::Boost { expr, factor } => with_boost(expr.to_query_string(), *factor),
        }
    }
}

/// Appends a `^factor` suffix unless the factor is neutral.
fn with_boost(text: String, factor: f32) -> String {
    if (factor - 1.0).abs() < f32::EPSILON {
        text
    } else {
        format!("{text}^{factor}")
    }
}

impl fmt::Display for QueryExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_tree(f, 0)
    }
}
