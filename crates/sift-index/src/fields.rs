//! Declared search fields and their mapping onto index fields.
//!
//! A content type declares [`SearchFieldSpec`]s. Each maps to one or more
//! [`IndexFieldSpec`]s:
//!
//! | declared       | index field            | role         | match      |
//! |----------------|------------------------|--------------|------------|
//! | `PlainText`    | `{path}`               | Search       | PhraseText |
//! | `PartialMatch` | `{path}_ngrams`        | Search       | NGramText  |
//! | `Autocomplete` | `{path}_autocomplete`  | Autocomplete | NGramText  |
//! | `Filter`       | `{path}_filter`        | Filter       | ExactId    |
//!
//! `path` is the field name, or `{parent}__{child}` inside a related field.

use crate::{
    IndexError,
    analyzer::{NGRAM_TOKENIZER, RAW_TOKENIZER, TEXT_TOKENIZER},
    utils::normalize_boost,
};

/// Separator between a related field and its children in index field names.
pub const RELATED_SEPARATOR: &str = "__";

/// A field declared by a content type.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchFieldSpec {
    /// Attribute name on the record.
    pub name: String,
    /// How the field is indexed.
    pub kind: SearchFieldKind,
    /// Relevance multiplier; `None` means 1.0.
    pub boost: Option<f32>,
}

/// The indexing behaviour of a declared field.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchFieldKind {
    /// Full-text, phrase-capable.
    PlainText,
    /// Substring matching through n-grams.
    PartialMatch,
    /// Exact-match filtering.
    Filter,
    /// Prefix-style matching for autocomplete.
    Autocomplete,
    /// Fields of a related record, indexed on this record.
    Related(Vec<SearchFieldSpec>),
}

impl SearchFieldSpec {
    /// Declares a full-text field.
    pub fn plain_text(name: impl Into<String>) -> Self {
        Self::of(name, SearchFieldKind::PlainText)
    }

    /// Declares a partial-match field.
    pub fn partial_match(name: impl Into<String>) -> Self {
        Self::of(name, SearchFieldKind::PartialMatch)
    }

    /// Declares a filter field.
    pub fn filter(name: impl Into<String>) -> Self {
        Self::of(name, SearchFieldKind::Filter)
    }

    /// Declares an autocomplete field.
    pub fn autocomplete(name: impl Into<String>) -> Self {
        Self::of(name, SearchFieldKind::Autocomplete)
    }

    /// Declares a related field with its children.
    pub fn related(name: impl Into<String>, children: Vec<Self>) -> Self {
        Self::of(name, SearchFieldKind::Related(children))
    }

    /// Sets the boost.
    pub fn with_boost(mut self, boost: f32) -> Self {
        self.boost = Some(boost);
        self
    }

    /// Builds an unboosted spec.
    fn of(name: impl Into<String>, kind: SearchFieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            boost: None,
        }
    }
}

/// What a mapped field is used for at query time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRole {
    /// Part of the default plain-search field set.
    Search,
    /// Only reachable through filter expressions.
    Filter,
    /// Part of the default autocomplete field set.
    Autocomplete,
}

/// Whether the original value is kept in the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Storage {
    /// Value retrievable from hits.
    Stored,
    /// Indexed only.
    Unstored,
}

/// How query text is matched against the field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// Whole value as one token.
    ExactId,
    /// Analysed words with positions.
    PhraseText,
    /// Word n-grams.
    NGramText,
}

impl FieldRole {
    /// Lower-case name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::Filter => "filter",
            Self::Autocomplete => "autocomplete",
        }
    }
}

impl Storage {
    /// Lower-case name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stored => "stored",
            Self::Unstored => "unstored",
        }
    }
}

impl MatchKind {
    /// Lower-case name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ExactId => "exact",
            Self::PhraseText => "phrase",
            Self::NGramText => "ngram",
        }
    }
}

/// A field in a segment's index schema.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexFieldSpec {
    /// Index field name.
    pub name: String,
    /// Declared path without suffix, used for field restrictions.
    pub source: String,
    /// Query-time role.
    pub role: FieldRole,
    /// Stored or not.
    pub storage: Storage,
    /// Matching behaviour.
    pub match_kind: MatchKind,
    /// Normalised boost.
    pub boost: f32,
    /// Registered tokenizer name.
    pub analyzer: &'static str,
}

/// Index field name for a declared kind at `path`.
pub fn index_field_name(kind: &SearchFieldKind, path: &str) -> String {
    match kind {
        SearchFieldKind::PlainText | SearchFieldKind::Related(_) => path.to_string(),
        SearchFieldKind::PartialMatch => format!("{path}_ngrams"),
        SearchFieldKind::Filter => format!("{path}_filter"),
        SearchFieldKind::Autocomplete => format!("{path}_autocomplete"),
    }
}

/// Joins a related parent and child name.
pub fn related_path(parent: &str, child: &str) -> String {
    format!("{parent}{RELATED_SEPARATOR}{child}")
}

/// Maps a declared field to its index fields.
///
/// `prefix` is the enclosing related field, if any. Related fields may not nest.
pub fn map_field(
    spec: &SearchFieldSpec,
    prefix: Option<&str>,
) -> Result<Vec<IndexFieldSpec>, IndexError> {
    map_with_parent_boost(spec, prefix, 1.0)
}

/// Maps a field, multiplying its boost by the enclosing related field's boost.
fn map_with_parent_boost(
    spec: &SearchFieldSpec,
    prefix: Option<&str>,
    parent_boost: f32,
) -> Result<Vec<IndexFieldSpec>, IndexError> {
    let path = match prefix {
        Some(parent) => related_path(parent, &spec.name),
        None => spec.name.clone(),
    };
    let boost = normalize_boost(&path, spec.boost)? * parent_boost;

    let single = |role, storage, match_kind, analyzer| IndexFieldSpec {
        name: index_field_name(&spec.kind, &path),
        source: path.clone(),
        role,
        storage,
        match_kind,
        boost,
        analyzer,
    };

    let mapped = match &spec.kind {
        SearchFieldKind::PlainText => vec![single(
            FieldRole::Search,
            Storage::Stored,
            MatchKind::PhraseText,
            TEXT_TOKENIZER,
        )],
        SearchFieldKind::PartialMatch => vec![single(
            FieldRole::Search,
            Storage::Stored,
            MatchKind::NGramText,
            NGRAM_TOKENIZER,
        )],
        SearchFieldKind::Autocomplete => vec![single(
            FieldRole::Autocomplete,
            Storage::Unstored,
            MatchKind::NGramText,
            NGRAM_TOKENIZER,
        )],
        SearchFieldKind::Filter => vec![single(
            FieldRole::Filter,
            Storage::Stored,
            MatchKind::ExactId,
            RAW_TOKENIZER,
        )],
        SearchFieldKind::Related(children) => {
            if let Some(parent) = prefix {
                return Err(IndexError::NestedRelated {
                    parent: parent.to_string(),
                    child: spec.name.clone(),
                });
            }
            let mut fields = Vec::new();
            for child in children {
                fields.extend(map_with_parent_boost(child, Some(&spec.name), boost)?);
            }
            fields
        }
    };

    Ok(mapped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_maps_to_phrase_field() {
        let fields = map_field(&SearchFieldSpec::plain_text("title").with_boost(2.0), None).unwrap();
        assert_eq!(
            fields,
            vec![IndexFieldSpec {
                name: "title".into(),
                source: "title".into(),
                role: FieldRole::Search,
                storage: Storage::Stored,
                match_kind: MatchKind::PhraseText,
                boost: 2.0,
                analyzer: TEXT_TOKENIZER,
            }]
        );
    }

    #[test]
    fn suffixes_and_roles() {
        let cases = [
            (SearchFieldSpec::partial_match("body"), "body_ngrams", FieldRole::Search),
            (SearchFieldSpec::filter("status"), "status_filter", FieldRole::Filter),
            (
                SearchFieldSpec::autocomplete("title"),
                "title_autocomplete",
                FieldRole::Autocomplete,
            ),
        ];
        for (spec, name, role) in cases {
            let fields = map_field(&spec, None).unwrap();
            assert_eq!(fields.len(), 1);
            assert_eq!(fields[0].name, name);
            assert_eq!(fields[0].role, role);
        }
    }

    #[test]
    fn autocomplete_is_unstored() {
        let fields = map_field(&SearchFieldSpec::autocomplete("title"), None).unwrap();
        assert_eq!(fields[0].storage, Storage::Unstored);
        assert_eq!(fields[0].match_kind, MatchKind::NGramText);
    }

    #[test]
    fn related_children_are_prefixed_and_boosts_multiply() {
        let spec = SearchFieldSpec::related(
            "author",
            vec![
                SearchFieldSpec::plain_text("name").with_boost(3.0),
                SearchFieldSpec::filter("country"),
            ],
        )
        .with_boost(2.0);

        let fields = map_field(&spec, None).unwrap();
        let names: Vec<_> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["author__name", "author__country_filter"]);
        assert_eq!(fields[0].source, "author__name");
        assert_eq!(fields[0].boost, 6.0);
        assert_eq!(fields[1].boost, 2.0);
    }

    #[test]
    fn nested_related_is_rejected() {
        let spec = SearchFieldSpec::related(
            "author",
            vec![SearchFieldSpec::related(
                "publisher",
                vec![SearchFieldSpec::plain_text("name")],
            )],
        );
        let err = map_field(&spec, None).unwrap_err();
        assert!(matches!(err, IndexError::NestedRelated { .. }));
    }

    #[test]
    fn zero_boost_is_neutral_and_negative_fails() {
        let fields = map_field(&SearchFieldSpec::plain_text("t").with_boost(0.0), None).unwrap();
        assert_eq!(fields[0].boost, 1.0);

        let err = map_field(&SearchFieldSpec::plain_text("t").with_boost(-2.0), None).unwrap_err();
        assert!(matches!(err, IndexError::InvalidBoost { .. }));
    }
}
