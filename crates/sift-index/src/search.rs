//! Multi-segment search and result merging.
//!
//! A search runs the compiled query against the requested content type's
//! segment and then against every descendant type's segment. Scores are merged
//! per primary key, keeping the best one, and the surviving keys are resolved
//! against the catalog in a single batched fetch.

use std::collections::{HashMap, HashSet, hash_map::Entry};

use sift_config::SearchSettings;
use sift_query::{Operator, QueryExpr};
use tantivy::{
    Searcher, TantivyDocument,
    collector::TopDocs,
    query::Query,
    schema::Value,
};
use tracing::{debug, warn};

use crate::{
    IndexError,
    catalog::Catalog,
    document::Record,
    fields::FieldRole,
    query::QueryCompiler,
    schema::{FieldSet, SegmentSchema},
    store::IndexStore,
    utils::{ContentType, search_targets},
};

/// Which declared fields a search matches against by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchMode {
    /// Plain search over the searchable fields.
    #[default]
    Search,
    /// Prefix-style search over the autocomplete fields.
    Autocomplete,
}

/// One search call.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    /// The query.
    pub expr: QueryExpr,
    /// Content type searched; descendants are searched too.
    pub content_type: ContentType,
    /// Declared field paths to restrict matching to.
    pub fields: Option<Vec<String>>,
    /// Operator between plain-text words, overriding the configured default.
    pub operator: Option<Operator>,
    /// Order by descending score; otherwise keep the record store's order.
    pub order_by_relevance: bool,
    /// Default field selection.
    pub mode: SearchMode,
    /// First result returned.
    pub start: usize,
    /// One past the last result returned.
    pub stop: Option<usize>,
    /// Attach scores to the hits.
    pub annotate_scores: bool,
}

impl SearchRequest {
    /// A relevance-ordered search for `expr` in `ct`.
    pub fn new(content_type: ContentType, expr: QueryExpr) -> Self {
        Self {
            expr,
            content_type,
            fields: None,
            operator: None,
            order_by_relevance: true,
            mode: SearchMode::Search,
            start: 0,
            stop: None,
            annotate_scores: false,
        }
    }

    /// A search for free text, or for everything when `text` is empty.
    pub fn plain(content_type: ContentType, text: &str) -> Self {
        let expr = if text.trim().is_empty() {
            QueryExpr::MatchAll
        } else {
            QueryExpr::plain_text(text)
        };
        Self::new(content_type, expr)
    }

    /// Restricts matching to the given declared fields.
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the operator between plain-text words.
    pub fn operator(mut self, operator: Operator) -> Self {
        self.operator = Some(operator);
        self
    }

    /// Returns records in the record store's order instead of by score.
    pub fn unordered(mut self) -> Self {
        self.order_by_relevance = false;
        self
    }

    /// Matches against autocomplete fields.
    pub fn autocomplete(mut self) -> Self {
        self.mode = SearchMode::Autocomplete;
        self
    }

    /// Returns only results in `[start, stop)`.
    pub fn slice(mut self, start: usize, stop: Option<usize>) -> Self {
        self.start = start;
        self.stop = stop;
        self
    }

    /// Attaches scores to the hits.
    pub fn with_scores(mut self) -> Self {
        self.annotate_scores = true;
        self
    }

    /// Applies the slice window to `items`.
    fn window<T>(&self, items: Vec<T>) -> Vec<T> {
        let iter = items.into_iter().skip(self.start);
        match self.stop {
            Some(stop) => iter.take(stop.saturating_sub(self.start)).collect(),
            None => iter.collect(),
        }
    }
}

/// A resolved search result.
#[derive(Debug, Clone)]
pub struct Hit<R> {
    /// The record from the catalog.
    pub record: R,
    /// Best score across segments, when requested.
    pub score: Option<f32>,
}

/// Best score per primary key, in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct ScoreMap {
    /// Scores by pk.
    scores: HashMap<String, f32>,
    /// Keys in the order they were first seen.
    order: Vec<String>,
}

impl ScoreMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a score, keeping the maximum for a repeated key.
    pub fn insert(&mut self, pk: impl Into<String>, score: f32) {
        let pk = pk.into();
        match self.scores.entry(pk) {
            Entry::Occupied(mut entry) => {
                if score > *entry.get() {
                    entry.insert(score);
                }
            }
            Entry::Vacant(entry) => {
                self.order.push(entry.key().clone());
                entry.insert(score);
            }
        }
    }

    /// The retained score for `pk`.
    pub fn get(&self, pk: &str) -> Option<f32> {
        self.scores.get(pk).copied()
    }

    /// Keys in first-seen order.
    pub fn keys(&self) -> &[String] {
        &self.order
    }

    /// Keys by descending score; ties keep first-seen order.
    pub fn ranked(&self) -> Vec<String> {
        let mut keys = self.order.clone();
        keys.sort_by(|a, b| {
            let sa = self.scores.get(a).copied().unwrap_or(0.0);
            let sb = self.scores.get(b).copied().unwrap_or(0.0);
            sb.total_cmp(&sa)
        });
        keys
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether no key was recorded.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Runs every matching document of a segment through `query`.
///
/// Returns `(pk, score)` pairs in engine order.
pub fn collect_hits(
    searcher: &Searcher,
    schema: &SegmentSchema,
    query: &dyn Query,
) -> Result<Vec<(String, f32)>, IndexError> {
    let ct = schema.content_type.as_str();
    let live = searcher.num_docs();
    if live == 0 {
        return Ok(Vec::new());
    }
    let limit = usize::try_from(live).unwrap_or(usize::MAX);
    let top = searcher
        .search(query, &TopDocs::with_limit(limit))
        .map_err(|e| IndexError::segment(ct, &e))?;

    let mut hits = Vec::with_capacity(top.len());
    for (score, address) in top {
        let doc: TantivyDocument = searcher
            .doc(address)
            .map_err(|e| IndexError::segment(ct, &e))?;
        if let Some(pk) = doc.get_first(schema.pk).and_then(|v| v.as_str()) {
            hits.push((pk.to_string(), score));
        }
    }
    Ok(hits)
}

/// Executes search requests over a content type hierarchy.
#[derive(Debug)]
pub struct ResultMerger<'a, C> {
    /// Segment owner.
    store: &'a IndexStore,
    /// System of record.
    catalog: &'a C,
    /// Operator and fuzziness defaults.
    settings: &'a SearchSettings,
}

impl<'a, C: Catalog> ResultMerger<'a, C> {
    /// Creates a merger.
    pub fn new(store: &'a IndexStore, catalog: &'a C, settings: &'a SearchSettings) -> Self {
        Self {
            store,
            catalog,
            settings,
        }
    }

    /// Searches the primary segment and every indexed descendant segment.
    ///
    /// Field names and filters are checked strictly on the primary only; a
    /// descendant lacking them contributes no hits. Any segment failure
    /// aborts the whole search.
    pub fn scores(&self, request: &SearchRequest) -> Result<ScoreMap, IndexError> {
        let mut scores = ScoreMap::new();
        for (i, ct) in search_targets(self.catalog, &request.content_type)
            .iter()
            .enumerate()
        {
            let primary = i == 0;
            let declared = self.catalog.search_fields(ct)?;
            let names = self.field_names(request, ct)?;
            let hits = self.store.with_searcher(ct, &declared, |searcher, schema| {
                let fields = select_fields(schema, request.mode, names.as_deref(), primary)?;
                if !primary && fields.is_empty() && names.is_some() {
                    debug!(content_type = %ct, "no requested fields declared, skipping segment");
                    return Ok(Vec::new());
                }
                let compiler = QueryCompiler::new(
                    schema,
                    *self.store.analyzers(),
                    self.settings.fuzzy_distance,
                    self.settings.default_operator,
                )
                .with_operator(request.operator)
                .strict_filters(primary);
                let query = compiler.compile(&request.expr, &fields)?;
                collect_hits(searcher, schema, query.as_ref())
            })?;
            debug!(
                content_type = %ct,
                query = %request.expr.to_query_string(),
                hits = hits.len(),
                "searched segment"
            );
            for (pk, score) in hits {
                scores.insert(pk, score);
            }
        }
        Ok(scores)
    }

    /// Runs `request` and resolves the hits against the catalog.
    pub fn search(&self, request: &SearchRequest) -> Result<Vec<Hit<C::Record>>, IndexError> {
        let scores = self.scores(request)?;
        let hits = self.resolve(request, &scores)?;
        Ok(request.window(hits))
    }

    /// Number of records a request resolves to, ignoring its slice.
    pub fn count(&self, request: &SearchRequest) -> Result<usize, IndexError> {
        let scores = self.scores(request)?;
        Ok(self.resolve(request, &scores)?.len())
    }

    /// Fetches the records behind `scores` in one batch and orders them.
    ///
    /// Keys without a record are stale and dropped.
    fn resolve(
        &self,
        request: &SearchRequest,
        scores: &ScoreMap,
    ) -> Result<Vec<Hit<C::Record>>, IndexError> {
        if scores.is_empty() {
            return Ok(Vec::new());
        }
        let ids = if request.order_by_relevance {
            scores.ranked()
        } else {
            scores.keys().to_vec()
        };
        let records = self.catalog.fetch_by_ids(&request.content_type, &ids)?;

        let annotate = |record: C::Record| {
            let score = request
                .annotate_scores
                .then(|| scores.get(&record.pk()))
                .flatten();
            Hit { record, score }
        };

        let hits: Vec<Hit<C::Record>> = if request.order_by_relevance {
            let mut by_pk: HashMap<String, C::Record> = HashMap::with_capacity(records.len());
            for record in records {
                by_pk.entry(record.pk()).or_insert(record);
            }
            ids.iter()
                .filter_map(|pk| by_pk.remove(pk))
                .map(annotate)
                .collect()
        } else {
            let mut seen = HashSet::with_capacity(records.len());
            records
                .into_iter()
                .filter(|r| seen.insert(r.pk()))
                .map(annotate)
                .collect()
        };

        let stale = ids.len().saturating_sub(hits.len());
        if stale > 0 {
            warn!(content_type = %request.content_type, stale, "dropped stale index entries");
        }
        Ok(hits)
    }

    /// Declared field paths to match against in `ct`.
    fn field_names(
        &self,
        request: &SearchRequest,
        ct: &ContentType,
    ) -> Result<Option<Vec<String>>, IndexError> {
        if request.fields.is_some() {
            return Ok(request.fields.clone());
        }
        match request.mode {
            SearchMode::Search => Ok(None),
            SearchMode::Autocomplete => {
                let names: Vec<String> = self
                    .catalog
                    .autocomplete_fields(ct)?
                    .into_iter()
                    .map(|f| f.name)
                    .collect();
                Ok((!names.is_empty()).then_some(names))
            }
        }
    }
}

/// Field set for one segment. The primary segment resolves names strictly.
fn select_fields(
    schema: &SegmentSchema,
    mode: SearchMode,
    names: Option<&[String]>,
    strict: bool,
) -> Result<FieldSet, IndexError> {
    let role = match mode {
        SearchMode::Search => FieldRole::Search,
        SearchMode::Autocomplete => FieldRole::Autocomplete,
    };
    schema.select(role, names, strict)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn score_map_keeps_maximum() {
        let mut scores = ScoreMap::new();
        scores.insert("1", 0.5);
        scores.insert("2", 2.0);
        scores.insert("1", 1.5);
        scores.insert("2", 1.0);
        assert_eq!(scores.get("1"), Some(1.5));
        assert_eq!(scores.get("2"), Some(2.0));
        assert_eq!(scores.len(), 2);
        assert_eq!(scores.keys(), ["1".to_string(), "2".to_string()]);
    }

    #[test]
    fn ranked_is_descending_and_stable() {
        let mut scores = ScoreMap::new();
        scores.insert("a", 1.0);
        scores.insert("b", 3.0);
        scores.insert("c", 1.0);
        scores.insert("d", 2.0);
        assert_eq!(scores.ranked(), ["b", "d", "a", "c"]);
    }

    #[test]
    fn slice_window() {
        let ct: ContentType = "tests.book".parse().unwrap();
        let request = SearchRequest::plain(ct.clone(), "x").slice(1, Some(3));
        assert_eq!(request.window(vec![1, 2, 3, 4]), vec![2, 3]);

        let request = SearchRequest::plain(ct.clone(), "x").slice(2, None);
        assert_eq!(request.window(vec![1, 2, 3]), vec![3]);

        let request = SearchRequest::plain(ct, "x").slice(3, Some(1));
        assert!(request.window(vec![1, 2, 3, 4]).is_empty());
    }

    #[test]
    fn empty_text_matches_everything() {
        let ct: ContentType = "tests.book".parse().unwrap();
        assert_eq!(SearchRequest::plain(ct.clone(), "  ").expr, QueryExpr::MatchAll);
        assert_eq!(
            SearchRequest::plain(ct, "python").expr,
            QueryExpr::plain_text("python")
        );
    }
}
