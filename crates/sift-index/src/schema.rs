//! Per-content-type index schemas.
//!
//! Every segment schema starts with two system fields:
//! - `pk`: record primary key (string, stored); documents are replaced by it
//! - `content_type`: the segment's content type label (string, stored)
//!
//! followed by the mapped fields of the content type in declaration order.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use parking_lot::RwLock;
use tantivy::schema::{
    Field, IndexRecordOption, STORED, STRING, Schema, TextFieldIndexing, TextOptions,
};

use crate::{
    IndexError,
    fields::{FieldRole, IndexFieldSpec, MatchKind, SearchFieldSpec, Storage, map_field},
    utils::ContentType,
};

/// Name of the primary key field.
pub const PK_FIELD: &str = "pk";

/// Name of the content type field.
pub const CONTENT_TYPE_FIELD: &str = "content_type";

/// A mapped field and its handle in the engine schema.
#[derive(Debug, Clone)]
pub struct MappedField {
    /// Field specification.
    pub spec: IndexFieldSpec,
    /// Engine handle.
    pub field: Field,
}

/// The schema of one segment.
#[derive(Debug)]
pub struct SegmentSchema {
    /// Content type this schema belongs to.
    pub content_type: ContentType,
    /// The underlying Tantivy schema.
    schema: Schema,
    /// Primary key field.
    pub pk: Field,
    /// Content type field.
    pub content_type_field: Field,
    /// Mapped fields in declaration order.
    fields: Vec<MappedField>,
}

/// A set of fields a query may match against.
#[derive(Debug, Clone, Default)]
pub struct FieldSet {
    /// Selected fields.
    fields: Vec<MappedField>,
}

impl FieldSet {
    /// Iterates over the selected fields.
    pub fn iter(&self) -> impl Iterator<Item = &MappedField> {
        self.fields.iter()
    }

    /// Whether no field is selected.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Whether any selected field supports phrase matching.
    pub fn has_phrase_fields(&self) -> bool {
        self.fields
            .iter()
            .any(|f| f.spec.match_kind == MatchKind::PhraseText)
    }

    /// Index field names, for logging.
    pub fn names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.spec.name.as_str()).collect()
    }
}

/// Builds the schema for `ct` from its declared fields.
pub fn build_schema(
    ct: &ContentType,
    declared: &[SearchFieldSpec],
) -> Result<SegmentSchema, IndexError> {
    let mut specs = Vec::new();
    for spec in declared {
        specs.extend(map_field(spec, None)?);
    }

    let mut seen: HashSet<&str> = HashSet::from([PK_FIELD, CONTENT_TYPE_FIELD]);
    for spec in &specs {
        if spec.name.is_empty() || spec.name.starts_with('-') {
            return Err(IndexError::InvalidFieldName {
                content_type: ct.to_string(),
                field: spec.name.clone(),
            });
        }
        if !seen.insert(spec.name.as_str()) {
            return Err(IndexError::SchemaConflict {
                content_type: ct.to_string(),
                field: spec.name.clone(),
            });
        }
    }

    let mut builder = Schema::builder();
    let pk = builder.add_text_field(PK_FIELD, STRING | STORED);
    let content_type_field = builder.add_text_field(CONTENT_TYPE_FIELD, STRING | STORED);

    let fields = specs
        .into_iter()
        .map(|spec| {
            let field = builder.add_text_field(&spec.name, text_options(&spec));
            MappedField { spec, field }
        })
        .collect();

    Ok(SegmentSchema {
        content_type: ct.clone(),
        schema: builder.build(),
        pk,
        content_type_field,
        fields,
    })
}

/// Engine options for a mapped field.
fn text_options(spec: &IndexFieldSpec) -> TextOptions {
    let options = match spec.match_kind {
        MatchKind::ExactId => return STRING | STORED,
        MatchKind::PhraseText => TextOptions::default().set_indexing_options(
            TextFieldIndexing::default()
                .set_tokenizer(spec.analyzer)
                .set_index_option(IndexRecordOption::WithFreqsAndPositions),
        ),
        MatchKind::NGramText => TextOptions::default().set_indexing_options(
            TextFieldIndexing::default()
                .set_tokenizer(spec.analyzer)
                .set_index_option(IndexRecordOption::WithFreqs),
        ),
    };
    match spec.storage {
        Storage::Stored => options.set_stored(),
        Storage::Unstored => options,
    }
}

impl SegmentSchema {
    /// Returns a reference to the underlying Tantivy schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Mapped fields in declaration order.
    pub fn fields(&self) -> &[MappedField] {
        &self.fields
    }

    /// Engine handle of a mapped field by index field name.
    pub fn field(&self, name: &str) -> Option<Field> {
        self.fields
            .iter()
            .find(|f| f.spec.name == name)
            .map(|f| f.field)
    }

    /// Selects fields with `role`, optionally restricted to declared paths.
    ///
    /// With `strict`, a name matching nothing fails with
    /// [`IndexError::UnknownField`]; otherwise it is ignored.
    pub fn select(
        &self,
        role: FieldRole,
        names: Option<&[String]>,
        strict: bool,
    ) -> Result<FieldSet, IndexError> {
        let candidates = self.fields.iter().filter(|f| f.spec.role == role);
        let Some(names) = names else {
            return Ok(FieldSet {
                fields: candidates.cloned().collect(),
            });
        };

        if strict {
            for name in names {
                if !self
                    .fields
                    .iter()
                    .any(|f| f.spec.role == role && &f.spec.source == name)
                {
                    return Err(self.unknown(name));
                }
            }
        }

        Ok(FieldSet {
            fields: candidates
                .filter(|f| names.contains(&f.spec.source))
                .cloned()
                .collect(),
        })
    }

    /// Default or restricted fields for plain search.
    pub fn search_fields(&self, names: Option<&[String]>) -> Result<FieldSet, IndexError> {
        self.select(FieldRole::Search, names, true)
    }

    /// Default or restricted fields for autocomplete.
    pub fn autocomplete_fields(&self, names: Option<&[String]>) -> Result<FieldSet, IndexError> {
        self.select(FieldRole::Autocomplete, names, true)
    }

    /// The filter field declared at `name`.
    pub fn filter_field(&self, name: &str) -> Result<Field, IndexError> {
        self.fields
            .iter()
            .find(|f| f.spec.role == FieldRole::Filter && f.spec.source == name)
            .map(|f| f.field)
            .ok_or_else(|| self.unknown(name))
    }

    /// Unknown-field error for this content type.
    fn unknown(&self, name: &str) -> IndexError {
        IndexError::UnknownField {
            content_type: self.content_type.to_string(),
            field: name.to_string(),
        }
    }
}

/// Schemas built so far, keyed by content type.
#[derive(Debug, Default)]
pub struct SchemaCache {
    /// Cached schemas.
    schemas: RwLock<HashMap<ContentType, Arc<SegmentSchema>>>,
}

impl SchemaCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached schema for `ct`, building it on first use.
    pub fn get_or_build(
        &self,
        ct: &ContentType,
        declared: &[SearchFieldSpec],
    ) -> Result<Arc<SegmentSchema>, IndexError> {
        if let Some(schema) = self.schemas.read().get(ct) {
            return Ok(Arc::clone(schema));
        }
        let built = Arc::new(build_schema(ct, declared)?);
        let mut schemas = self.schemas.write();
        Ok(Arc::clone(schemas.entry(ct.clone()).or_insert(built)))
    }

    /// The cached schema for `ct`, if any.
    pub fn get(&self, ct: &ContentType) -> Option<Arc<SegmentSchema>> {
        self.schemas.read().get(ct).cloned()
    }

    /// Forgets the schema for `ct`.
    pub fn invalidate(&self, ct: &ContentType) {
        self.schemas.write().remove(ct);
    }

    /// Forgets every schema.
    pub fn clear(&self) {
        self.schemas.write().clear();
    }

    /// Number of cached schemas.
    pub fn len(&self) -> usize {
        self.schemas.read().len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.schemas.read().is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn ct() -> ContentType {
        "tests.book".parse().unwrap()
    }

    fn declared() -> Vec<SearchFieldSpec> {
        vec![
            SearchFieldSpec::plain_text("title").with_boost(2.0),
            SearchFieldSpec::partial_match("title"),
            SearchFieldSpec::autocomplete("title"),
            SearchFieldSpec::filter("status"),
            SearchFieldSpec::related("author", vec![SearchFieldSpec::plain_text("name")]),
        ]
    }

    #[test]
    fn system_fields_come_first() {
        let schema = build_schema(&ct(), &declared()).unwrap();
        let names: Vec<_> = schema
            .schema()
            .fields()
            .map(|(_, entry)| entry.name().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "pk",
                "content_type",
                "title",
                "title_ngrams",
                "title_autocomplete",
                "status_filter",
                "author__name"
            ]
        );
    }

    #[test]
    fn storage_follows_field_kind() {
        let schema = build_schema(&ct(), &declared()).unwrap();
        let tantivy = schema.schema();
        let stored = |name: &str| {
            let field = tantivy.get_field(name).unwrap();
            tantivy.get_field_entry(field).is_stored()
        };
        assert!(stored("pk"));
        assert!(stored("title"));
        assert!(stored("status_filter"));
        assert!(!stored("title_autocomplete"));
    }

    #[test]
    fn duplicate_fields_conflict() {
        let declared = vec![
            SearchFieldSpec::plain_text("title"),
            SearchFieldSpec::plain_text("title"),
        ];
        let err = build_schema(&ct(), &declared).unwrap_err();
        assert!(matches!(err, IndexError::SchemaConflict { ref field, .. } if field == "title"));
    }

    #[test]
    fn system_field_collision_conflicts() {
        let err = build_schema(&ct(), &[SearchFieldSpec::plain_text("pk")]).unwrap_err();
        assert!(matches!(err, IndexError::SchemaConflict { .. }));
    }

    #[test]
    fn related_path_collision_conflicts() {
        let declared = vec![
            SearchFieldSpec::plain_text("author__name"),
            SearchFieldSpec::related("author", vec![SearchFieldSpec::plain_text("name")]),
        ];
        assert!(matches!(
            build_schema(&ct(), &declared),
            Err(IndexError::SchemaConflict { .. })
        ));
    }

    #[test]
    fn field_selection() {
        let schema = build_schema(&ct(), &declared()).unwrap();

        let all = schema.search_fields(None).unwrap();
        assert_eq!(all.names(), vec!["title", "title_ngrams", "author__name"]);

        let restricted = schema.search_fields(Some(&["title".to_string()])).unwrap();
        assert_eq!(restricted.names(), vec!["title", "title_ngrams"]);

        let auto = schema.autocomplete_fields(None).unwrap();
        assert_eq!(auto.names(), vec!["title_autocomplete"]);
        assert!(!auto.has_phrase_fields());

        let err = schema
            .search_fields(Some(&["summary".to_string()]))
            .unwrap_err();
        assert!(matches!(err, IndexError::UnknownField { .. }));

        let lenient = schema
            .select(FieldRole::Search, Some(&["summary".to_string()]), false)
            .unwrap();
        assert!(lenient.is_empty());
    }

    #[test]
    fn filter_lookup() {
        let schema = build_schema(&ct(), &declared()).unwrap();
        assert!(schema.filter_field("status").is_ok());
        assert!(matches!(
            schema.filter_field("title"),
            Err(IndexError::UnknownField { .. })
        ));
    }

    #[test]
    fn cache_memoizes_and_invalidates() {
        let cache = SchemaCache::new();
        let a = cache.get_or_build(&ct(), &declared()).unwrap();
        let b = cache.get_or_build(&ct(), &[]).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);

        cache.invalidate(&ct());
        assert!(cache.get(&ct()).is_none());
        let c = cache.get_or_build(&ct(), &[]).unwrap();
        assert!(c.fields().is_empty());

        cache.clear();
        assert!(cache.is_empty());
    }
}
