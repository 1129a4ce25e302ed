//! Shared helpers for command implementations.

use std::process::ExitCode;

use sift_index::{Operator, QueryExpr, SearchRequest, parse_query};

use crate::cli::{args::QueryArgs, context::parse_content_type};

/// Parses query words into an expression. Empty input matches everything.
pub fn parse_expr(text: &str, operator: Option<Operator>) -> Result<QueryExpr, ExitCode> {
    match parse_query(text) {
        Ok(None) => Ok(QueryExpr::MatchAll),
        Ok(Some(expr)) => Ok(as_plain_text(expr, operator)),
        Err(e) => {
            eprintln!("error: invalid query: {e}");
            if let Some(hint) = e.suggestion() {
                eprintln!("hint: {hint}");
            }
            Err(ExitCode::FAILURE)
        }
    }
}

/// Builds the request shared by `search` and `count`.
pub fn build_request(args: &QueryArgs) -> Result<SearchRequest, ExitCode> {
    let content_type = parse_content_type(&args.content_type)?;
    let expr = parse_expr(&args.text(), args.operator)?;
    let mut request = SearchRequest::new(content_type, expr);
    if let Some(names) = args.field_names() {
        request = request.fields(names);
    }
    if let Some(operator) = args.operator {
        request = request.operator(operator);
    }
    if args.autocomplete {
        request = request.autocomplete();
    }
    Ok(request)
}

/// The text of an unboosted term.
fn bare_word(expr: &QueryExpr) -> Option<&str> {
    match expr {
        QueryExpr::Term { text, boost } if (boost - 1.0).abs() < f32::EPSILON => Some(text),
        _ => None,
    }
}

/// Turns a run of bare words into plain text so the word operator applies.
///
/// Anything with syntax (phrases, filters, boosts, `OR`, negation) is kept.
fn as_plain_text(expr: QueryExpr, operator: Option<Operator>) -> QueryExpr {
    let words: Option<Vec<&str>> = match &expr {
        QueryExpr::And(children) => children.iter().map(bare_word).collect(),
        other => bare_word(other).map(|w| vec![w]),
    };
    match words.map(|w| w.join(" ")) {
        Some(text) => QueryExpr::PlainText { text, operator },
        None => expr,
    }
}
