//! Query-string parser.
//!
//! Parses a token stream into a [`QueryExpr`] using recursive descent.
//!
//! # Grammar
//!
//! ```text
//! query      → or_expr
//! or_expr    → and_expr ("OR" and_expr)*
//! and_expr   → unary ("AND"? unary)*
//! unary      → "-" unary | primary BOOST?
//! primary    → TERM | PHRASE | "*" | filter | "(" or_expr ")"
//! filter     → FIELD_PREFIX (TERM | PHRASE)
//! ```
//!
//! Adjacent expressions are conjoined, `OR` binds loosest, `-` negates the
//! following expression and `^N` boosts the expression before it.

use std::mem;

use crate::{
    ast::QueryExpr,
    error::{ParseError, QueryError},
    lexer::{Token, tokenize},
};

/// Recursive descent parser for query expressions.
struct Parser {
    /// Token stream to parse.
    tokens: Vec<Token>,
    /// Current position in token stream.
    position: usize,
}

impl Parser {
    /// Creates a new parser from a token stream.
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            position: 0,
        }
    }

    /// Parses the token stream into a query expression.
    fn parse(mut self) -> Result<Option<QueryExpr>, ParseError> {
        if self.tokens.is_empty() {
            return Ok(None);
        }

        let expr = self.parse_or_expr()?;

        if let Some(token) = self.peek() {
            return Err(ParseError::new(
                format!("unexpected token: {token:?}"),
                Some(self.position),
            ));
        }

        Ok(Some(expr))
    }

    /// Parses: or_expr → and_expr ("OR" and_expr)*
    fn parse_or_expr(&mut self) -> Result<QueryExpr, ParseError> {
        let mut left = self.parse_and_expr()?;

        while self.check(&Token::Or) {
            self.advance();
            let right = self.parse_and_expr()?;
            left = QueryExpr::or(vec![left, right]);
        }

        Ok(left)
    }

    /// Parses: and_expr → unary ("AND"? unary)*
    fn parse_and_expr(&mut self) -> Result<QueryExpr, ParseError> {
        let mut exprs = vec![self.parse_unary()?];

        loop {
            if self.check(&Token::And) {
                self.advance();
                exprs.push(self.parse_unary()?);
            } else if self.can_start_unary() {
                exprs.push(self.parse_unary()?);
            } else {
                break;
            }
        }

        Ok(QueryExpr::and(exprs))
    }

    /// Checks if the current token can start a unary expression.
    fn can_start_unary(&self) -> bool {
        matches!(
            self.peek(),
            Some(
                Token::Term(_)
                    | Token::Phrase(_)
                    | Token::Star
                    | Token::Not
                    | Token::LParen
                    | Token::FieldPrefix(_)
            )
        )
    }

    /// Applies a trailing boost, if one follows. Term boosts fold into the term.
    fn maybe_apply_boost(&mut self, expr: QueryExpr) -> QueryExpr {
        let factor = match self.peek() {
            Some(&Token::Boost(factor)) => factor,
            _ => return expr,
        };
        self.advance();

        match expr {
            QueryExpr::Term { text, boost } => QueryExpr::Term {
                text,
                boost: boost * factor,
            },
            other => QueryExpr::boost(other, factor),
        }
    }

    /// Parses: unary → "-" unary | primary
    fn parse_unary(&mut self) -> Result<QueryExpr, ParseError> {
        if self.check(&Token::Not) {
            self.advance();
            let expr = self.parse_unary()?;
            return Ok(QueryExpr::not(expr));
        }

        self.parse_primary()
    }

    /// Parses: primary → TERM | PHRASE | "*" | filter | "(" or_expr ")"
    fn parse_primary(&mut self) -> Result<QueryExpr, ParseError> {
        let expr = match self.peek().cloned() {
            Some(Token::Term(text)) => {
                self.advance();
                QueryExpr::term(text)
            }
            Some(Token::Phrase(text)) => {
                self.advance();
                QueryExpr::phrase(text)
            }
            Some(Token::Star) => {
                self.advance();
                QueryExpr::MatchAll
            }
            Some(Token::FieldPrefix(field)) => {
                self.advance();
                self.parse_filter_value(field)?
            }
            Some(Token::LParen) => self.parse_group()?,
            Some(Token::RParen) => {
                return Err(ParseError::new(
                    "unexpected closing parenthesis",
                    Some(self.position),
                ));
            }
            Some(Token::Or) => {
                return Err(ParseError::new(
                    "unexpected OR (needs expression before it)",
                    Some(self.position),
                ));
            }
            Some(Token::And) => {
                return Err(ParseError::new(
                    "unexpected AND (needs expression before it)",
                    Some(self.position),
                ));
            }
            Some(Token::Not) => {
                return Err(ParseError::new("unexpected negation", Some(self.position)));
            }
            Some(Token::Boost(_)) => {
                return Err(ParseError::new(
                    "unexpected boost (needs expression before it)",
                    Some(self.position),
                ));
            }
            None => return Err(ParseError::new("unexpected end of query", None)),
        };

        Ok(self.maybe_apply_boost(expr))
    }

    /// Parses the value after a filter prefix.
    fn parse_filter_value(&mut self, field: String) -> Result<QueryExpr, ParseError> {
        match self.peek().cloned() {
            Some(Token::Term(value) | Token::Phrase(value)) => {
                self.advance();
                Ok(QueryExpr::filter(field, value))
            }
            _ => Err(ParseError::new(
                format!("expected a filter value after '{field}:'"),
                Some(self.position),
            )),
        }
    }

    /// Parses a parenthesized group, consuming the surrounding parentheses.
    fn parse_group(&mut self) -> Result<QueryExpr, ParseError> {
        self.advance();
        if self.check(&Token::RParen) {
            return Err(ParseError::new("empty group", Some(self.position)));
        }
        let inner = self.parse_or_expr()?;

        if !self.check(&Token::RParen) {
            return Err(ParseError::new(
                "expected closing parenthesis",
                Some(self.position),
            ));
        }
        self.advance();

        Ok(inner)
    }

    /// Returns the current token without consuming it.
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    /// Checks if the current token has the same kind as the given token.
    fn check(&self, token: &Token) -> bool {
        self.peek()
            .is_some_and(|t| mem::discriminant(t) == mem::discriminant(token))
    }

    /// Advances to the next token.
    fn advance(&mut self) {
        if self.position < self.tokens.len() {
            self.position += 1;
        }
    }
}

/// Parses a query string into an expression.
///
/// Returns `Ok(None)` for empty queries, `Ok(Some(expr))` for valid queries,
/// or `Err(QueryError)` for invalid syntax.
pub fn parse(input: &str) -> Result<Option<QueryExpr>, QueryError> {
    let tokens = tokenize(input)?;
    Parser::new(tokens)
        .parse()
        .map_err(|e| QueryError::from_parse(e, input))
}
