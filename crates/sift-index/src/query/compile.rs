//! Query compiler.
//!
//! Compiles a query expression into a Tantivy query for one segment.
//! Boost factors are pushed down to the leaves, so nested boosts multiply.

use sift_query::{Operator, QueryExpr};
use tantivy::{
    Term,
    query::{
        AllQuery, BooleanQuery, BoostQuery, ConstScoreQuery, EmptyQuery, FuzzyTermQuery, Occur,
        PhraseQuery, Query, TermQuery,
    },
    schema::{Field, IndexRecordOption},
};

use crate::{
    IndexError,
    analyzer::Analyzers,
    fields::MatchKind,
    schema::{FieldSet, MappedField, SegmentSchema},
    utils::{query_factor, transliterate},
};

/// A compiled clause, or `None` when the expression analyzed to nothing.
type Compiled = Option<Box<dyn Query>>;

/// Compiles query expressions against one segment schema.
#[derive(Debug)]
pub struct QueryCompiler<'a> {
    /// Schema providing filter fields.
    schema: &'a SegmentSchema,
    /// Analyzers matching those registered on the segment.
    analyzers: Analyzers,
    /// Levenshtein distance for phrase-field terms (0 = disabled).
    fuzzy_distance: u8,
    /// Operator used when neither the expression nor the request names one.
    default_operator: Operator,
    /// Operator requested for this search.
    request_operator: Option<Operator>,
    /// Reject filters on fields the segment does not declare.
    strict_filters: bool,
}

impl<'a> QueryCompiler<'a> {
    /// Creates a compiler for `schema`.
    pub fn new(
        schema: &'a SegmentSchema,
        analyzers: Analyzers,
        fuzzy_distance: u8,
        default_operator: Operator,
    ) -> Self {
        Self {
            schema,
            analyzers,
            fuzzy_distance,
            default_operator,
            request_operator: None,
            strict_filters: true,
        }
    }

    /// Sets the operator requested for this search.
    pub fn with_operator(mut self, operator: Option<Operator>) -> Self {
        self.request_operator = operator;
        self
    }

    /// Whether a filter on an undeclared field is an error.
    ///
    /// When off, such a filter matches nothing in this segment. Descendant
    /// segments of a search compile this way, since a subtype need not
    /// declare every filter its ancestor does.
    pub fn strict_filters(mut self, strict: bool) -> Self {
        self.strict_filters = strict;
        self
    }

    /// Compiles `expr` to match against `fields`.
    ///
    /// An expression that analyzes to nothing matches nothing; its negation
    /// matches everything.
    pub fn compile(&self, expr: &QueryExpr, fields: &FieldSet) -> Result<Box<dyn Query>, IndexError> {
        Ok(self
            .compile_node(expr, fields, 1.0)?
            .unwrap_or_else(|| Box::new(EmptyQuery)))
    }

    /// Compiles one node with the boost factor composed so far.
    fn compile_node(
        &self,
        expr: &QueryExpr,
        fields: &FieldSet,
        factor: f32,
    ) -> Result<Compiled, IndexError> {
        match expr {
            QueryExpr::MatchAll => Ok(Some(boosted(Box::new(AllQuery), factor))),
            QueryExpr::Term { text, boost } => {
                let boost = query_factor(&format!("term '{text}'"), *boost)?;
                Ok(self.compile_text(text, fields, factor * boost))
            }
            QueryExpr::PlainText { text, operator } => {
                let operator = operator
                    .or(self.request_operator)
                    .unwrap_or(self.default_operator);
                Ok(self.compile_plain_text(text, operator, fields, factor))
            }
            QueryExpr::Phrase(text) => {
                if !fields.has_phrase_fields() {
                    return Err(IndexError::UnsupportedQuery {
                        kind: expr.kind(),
                        reason: format!(
                            "none of the fields [{}] support phrase matching",
                            fields.names().join(", ")
                        ),
                    });
                }
                Ok(self.compile_phrase(text, fields, factor))
            }
            QueryExpr::Filter { field, value } => {
                let field = match self.schema.filter_field(field) {
                    Ok(field) => field,
                    Err(IndexError::UnknownField { .. }) if !self.strict_filters => {
                        return Ok(Some(Box::new(EmptyQuery)));
                    }
                    Err(e) => return Err(e),
                };
                let term = TermQuery::new(
                    Term::from_field_text(field, value),
                    IndexRecordOption::Basic,
                );
                Ok(Some(Box::new(ConstScoreQuery::new(Box::new(term), 0.0))))
            }
            QueryExpr::Boost { expr: inner, factor: f } => {
                let f = query_factor(&format!("boost on {}", inner.kind()), *f)?;
                self.compile_node(inner, fields, factor * f)
            }
            QueryExpr::Not(inner) => Ok(Some(match self.compile_node(inner, fields, factor)? {
                Some(q) => exclude(vec![q]),
                None => boosted(Box::new(AllQuery), factor),
            })),
            QueryExpr::And(exprs) => self.compile_and(exprs, fields, factor),
            QueryExpr::Or(exprs) => self.compile_or(exprs, fields, factor),
        }
    }

    /// Conjunction. Negated children become MUST_NOT clauses.
    ///
    /// Children that analyze to nothing are dropped; if only negations were
    /// dropped the conjunction matches everything.
    fn compile_and(
        &self,
        exprs: &[QueryExpr],
        fields: &FieldSet,
        factor: f32,
    ) -> Result<Compiled, IndexError> {
        if exprs.is_empty() {
            return Ok(Some(boosted(Box::new(AllQuery), factor)));
        }

        let mut positive = Vec::new();
        let mut negative = Vec::new();
        for expr in exprs {
            match expr {
                QueryExpr::Not(inner) => {
                    if let Some(q) = self.compile_node(inner, fields, factor)? {
                        negative.push(q);
                    }
                }
                other => {
                    if let Some(q) = self.compile_node(other, fields, factor)? {
                        positive.push(q);
                    }
                }
            }
        }

        if positive.is_empty() {
            if !negative.is_empty() {
                return Ok(Some(exclude(negative)));
            }
            let only_negations = exprs.iter().all(|e| matches!(e, QueryExpr::Not(_)));
            return Ok(only_negations.then(|| boosted(Box::new(AllQuery), factor)));
        }
        if positive.len() == 1 && negative.is_empty() {
            return Ok(positive.pop());
        }

        let mut clauses: Vec<(Occur, Box<dyn Query>)> =
            positive.into_iter().map(|q| (Occur::Must, q)).collect();
        clauses.extend(negative.into_iter().map(|q| (Occur::MustNot, q)));
        Ok(Some(Box::new(BooleanQuery::new(clauses))))
    }

    /// Disjunction.
    fn compile_or(
        &self,
        exprs: &[QueryExpr],
        fields: &FieldSet,
        factor: f32,
    ) -> Result<Compiled, IndexError> {
        if exprs.is_empty() {
            return Ok(Some(Box::new(EmptyQuery)));
        }

        let mut queries = Vec::new();
        for expr in exprs {
            if let Some(q) = self.compile_node(expr, fields, factor)? {
                queries.push(q);
            }
        }
        Ok(combine(queries, Occur::Should))
    }

    /// Whitespace-separated words joined by `operator`.
    fn compile_plain_text(
        &self,
        text: &str,
        operator: Operator,
        fields: &FieldSet,
        factor: f32,
    ) -> Compiled {
        let occur = match operator {
            Operator::And => Occur::Must,
            Operator::Or => Occur::Should,
        };
        let words = text
            .split_whitespace()
            .filter_map(|word| self.compile_text(word, fields, factor))
            .collect();
        combine(words, occur)
    }

    /// Text matched against every field in the set.
    fn compile_text(&self, text: &str, fields: &FieldSet, factor: f32) -> Compiled {
        let text = transliterate(text);
        let per_field = fields
            .iter()
            .filter_map(|mapped| {
                let leaf = match mapped.spec.match_kind {
                    MatchKind::PhraseText => {
                        self.phrase_leaf(mapped.field, &self.analyzers.tokenize_text(&text))
                    }
                    MatchKind::NGramText => {
                        ngram_leaf(mapped.field, &self.analyzers.longest_ngrams(&text))
                    }
                    MatchKind::ExactId => Some(exact_leaf(mapped.field, &text)),
                }?;
                Some(field_boosted(leaf, mapped, factor))
            })
            .collect();
        combine(per_field, Occur::Should)
    }

    /// An exact phrase on the phrase fields of the set.
    fn compile_phrase(&self, text: &str, fields: &FieldSet, factor: f32) -> Compiled {
        let text = transliterate(text);
        let tokens = self.analyzers.tokenize_text(&text);
        let per_field = fields
            .iter()
            .filter(|mapped| mapped.spec.match_kind == MatchKind::PhraseText)
            .filter_map(|mapped| {
                let leaf = self.phrase_leaf(mapped.field, &tokens)?;
                Some(field_boosted(leaf, mapped, factor))
            })
            .collect();
        combine(per_field, Occur::Should)
    }

    /// A term (fuzzy when enabled) for one token, a phrase for several.
    fn phrase_leaf(&self, field: Field, tokens: &[String]) -> Compiled {
        match tokens {
            [] => None,
            [token] => {
                let term = Term::from_field_text(field, token);
                if self.fuzzy_distance > 0 {
                    Some(Box::new(FuzzyTermQuery::new(
                        term,
                        self.fuzzy_distance,
                        true,
                    )))
                } else {
                    Some(Box::new(TermQuery::new(term, IndexRecordOption::WithFreqs)))
                }
            }
            _ => {
                let terms = tokens
                    .iter()
                    .map(|t| Term::from_field_text(field, t))
                    .collect();
                Some(Box::new(PhraseQuery::new(terms)))
            }
        }
    }
}

/// Every gram must be present.
fn ngram_leaf(field: Field, grams: &[String]) -> Compiled {
    let terms = grams
        .iter()
        .map(|gram| -> Box<dyn Query> {
            Box::new(TermQuery::new(
                Term::from_field_text(field, gram),
                IndexRecordOption::WithFreqs,
            ))
        })
        .collect();
    combine(terms, Occur::Must)
}

/// The untokenized value.
fn exact_leaf(field: Field, value: &str) -> Box<dyn Query> {
    Box::new(TermQuery::new(
        Term::from_field_text(field, value),
        IndexRecordOption::Basic,
    ))
}

/// Applies the field boost times the composed factor.
fn field_boosted(leaf: Box<dyn Query>, mapped: &MappedField, factor: f32) -> Box<dyn Query> {
    Box::new(BoostQuery::new(leaf, mapped.spec.boost * factor))
}

/// Wraps `query` in a boost unless the factor is neutral.
fn boosted(query: Box<dyn Query>, factor: f32) -> Box<dyn Query> {
    if (factor - 1.0).abs() < f32::EPSILON {
        query
    } else {
        Box::new(BoostQuery::new(query, factor))
    }
}

/// Everything except documents matching any of `excluded`.
fn exclude(excluded: Vec<Box<dyn Query>>) -> Box<dyn Query> {
    let mut clauses: Vec<(Occur, Box<dyn Query>)> = vec![(Occur::Must, Box::new(AllQuery))];
    clauses.extend(excluded.into_iter().map(|q| (Occur::MustNot, q)));
    Box::new(BooleanQuery::new(clauses))
}

/// Joins queries with one occurrence; a single query is returned as is.
fn combine(mut queries: Vec<Box<dyn Query>>, occur: Occur) -> Compiled {
    match queries.len() {
        0 => None,
        1 => queries.pop(),
        _ => Some(Box::new(BooleanQuery::new(
            queries.into_iter().map(|q| (occur, q)).collect(),
        ))),
    }
}
