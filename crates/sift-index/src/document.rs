//! Flattening records into index documents.

use std::{fmt, sync::Arc};

use tantivy::TantivyDocument;

use crate::{
    IndexError,
    fields::{SearchFieldKind, SearchFieldSpec, index_field_name, related_path},
    schema::SegmentSchema,
    utils::{ContentType, transliterate},
};

/// Separator used when joining lists, maps and related rows.
const JOIN: &str = ", ";

/// A record from the system of record.
pub trait Record: Send + Sync + fmt::Debug {
    /// Primary key, unique within the content type hierarchy.
    fn pk(&self) -> String;

    /// The value of a declared attribute. Unknown names yield [`FieldValue::Null`].
    fn field_value(&self, name: &str) -> FieldValue;
}

/// An attribute value as handed over by the record layer.
#[derive(Clone)]
pub enum FieldValue {
    /// No value.
    Null,
    /// A boolean.
    Bool(bool),
    /// An integer.
    Int(i64),
    /// A float.
    Float(f64),
    /// Text.
    Text(String),
    /// An ordered sequence.
    List(Vec<Self>),
    /// A mapping; only values are indexed, in insertion order.
    Map(Vec<(String, Self)>),
    /// Computed on demand.
    Callable(Arc<dyn Fn() -> Self + Send + Sync>),
    /// A single related record.
    Record(Arc<dyn Record>),
    /// A one-to-many relation.
    Records(Vec<Arc<dyn Record>>),
}

impl fmt::Debug for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Self::Int(i) => f.debug_tuple("Int").field(i).finish(),
            Self::Float(x) => f.debug_tuple("Float").field(x).finish(),
            Self::Text(s) => f.debug_tuple("Text").field(s).finish(),
            Self::List(items) => f.debug_tuple("List").field(items).finish(),
            Self::Map(entries) => f.debug_tuple("Map").field(entries).finish(),
            Self::Callable(_) => f.write_str("Callable(..)"),
            Self::Record(r) => f.debug_tuple("Record").field(&r.pk()).finish(),
            Self::Records(rs) => {
                let pks: Vec<String> = rs.iter().map(|r| r.pk()).collect();
                f.debug_tuple("Records").field(&pks).finish()
            }
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl<T: Into<Self>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl FieldValue {
    /// Flattens the value to the string that gets indexed.
    ///
    /// Related records outside a related field are represented by their pk.
    pub fn coerce(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::Float(x) => x.to_string(),
            Self::Text(s) => s.clone(),
            Self::List(items) => join(items.iter().map(Self::coerce)),
            Self::Map(entries) => join(entries.iter().map(|(_, v)| v.coerce())),
            Self::Callable(f) => f().coerce(),
            Self::Record(r) => r.pk(),
            Self::Records(rs) => join(rs.iter().map(|r| r.pk())),
        }
    }

    /// Resolves callables until a concrete value remains.
    fn resolve(self) -> Self {
        match self {
            Self::Callable(f) => f().resolve(),
            other => other,
        }
    }
}

/// Joins non-empty parts with `", "`.
fn join(parts: impl Iterator<Item = String>) -> String {
    parts
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(JOIN)
}

/// A flattened record ready for indexing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Primary key.
    pub pk: String,
    /// The segment the document is written to.
    pub content_type: ContentType,
    /// Index field name and value pairs, in schema order.
    pub fields: Vec<(String, String)>,
}

impl Document {
    /// The value of an index field, if present.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Flattens `record` according to the fields `ct` declares.
pub fn materialize(
    ct: &ContentType,
    declared: &[SearchFieldSpec],
    record: &dyn Record,
) -> Result<Document, IndexError> {
    let mut fields = Vec::new();
    for spec in declared {
        match &spec.kind {
            SearchFieldKind::Related(children) => {
                let related = record.field_value(&spec.name).resolve();
                for child in children {
                    if let SearchFieldKind::Related(_) = child.kind {
                        return Err(IndexError::NestedRelated {
                            parent: spec.name.clone(),
                            child: child.name.clone(),
                        });
                    }
                    let path = related_path(&spec.name, &child.name);
                    let value = related_value(&related, child);
                    fields.push((index_field_name(&child.kind, &path), value));
                }
            }
            kind => {
                let raw = record.field_value(&spec.name).coerce();
                fields.push((index_field_name(kind, &spec.name), prepare(kind, raw)));
            }
        }
    }
    Ok(Document {
        pk: record.pk(),
        content_type: ct.clone(),
        fields,
    })
}

/// The value of one child of a related field.
fn related_value(related: &FieldValue, child: &SearchFieldSpec) -> String {
    match related {
        FieldValue::Record(r) => prepare(&child.kind, r.field_value(&child.name).coerce()),
        FieldValue::Records(rs) => join(
            rs.iter()
                .map(|r| prepare(&child.kind, r.field_value(&child.name).coerce())),
        ),
        _ => String::new(),
    }
}

/// Transliterates text kinds; filter values stay verbatim.
fn prepare(kind: &SearchFieldKind, value: String) -> String {
    match kind {
        SearchFieldKind::Filter => value,
        SearchFieldKind::PlainText
        | SearchFieldKind::PartialMatch
        | SearchFieldKind::Autocomplete
        | SearchFieldKind::Related(_) => transliterate(&value),
    }
}

/// Converts a document to the engine's representation.
///
/// Fields the schema does not know are skipped.
pub fn to_tantivy(doc: &Document, schema: &SegmentSchema) -> TantivyDocument {
    let mut out = TantivyDocument::default();
    out.add_text(schema.pk, &doc.pk);
    out.add_text(schema.content_type_field, doc.content_type.as_str());
    for (name, value) in &doc.fields {
        if let Some(field) = schema.field(name) {
            out.add_text(field, value);
        }
    }
    out
}
