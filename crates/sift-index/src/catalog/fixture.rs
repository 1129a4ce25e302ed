//! JSON fixtures for [`MemoryCatalog`].
//!
//! ```json
//! {
//!   "types": [
//!     {"content_type": "core.page", "fields": [{"name": "title", "kind": "plain_text", "boost": 2.0}]},
//!     {"content_type": "blog.post", "parent": "core.page",
//!      "fields": [{"name": "author", "kind": "related",
//!                  "fields": [{"name": "name", "kind": "plain_text"}]}]}
//!   ],
//!   "records": [
//!     {"content_type": "blog.post", "pk": "1",
//!      "values": {"title": "Hello", "author": {"pk": "7", "name": "Ada"}}}
//!   ]
//! }
//! ```
//!
//! Types must be listed parents first. Values map onto [`FieldValue`]: JSON
//! objects carrying a `pk` become related records, other objects become maps,
//! arrays of such objects become one-to-many relations.

use std::{fs, path::Path, sync::Arc};

use serde::Deserialize;
use serde_json::{Map, Value};

use super::{CatalogError, MemoryCatalog, MemoryRecord};
use crate::{
    document::{FieldValue, Record},
    fields::SearchFieldSpec,
    utils::ContentType,
};

/// Top-level fixture document.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFixture {
    /// Content type declarations.
    #[serde(default)]
    types: Vec<RawType>,
    /// Records to store.
    #[serde(default)]
    records: Vec<RawRecord>,
}

/// A content type declaration.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawType {
    /// Type label.
    content_type: ContentType,
    /// Direct parent.
    #[serde(default)]
    parent: Option<ContentType>,
    /// Whether the type has its own segment.
    #[serde(default = "default_indexed")]
    indexed: bool,
    /// Declared search fields.
    #[serde(default)]
    fields: Vec<RawField>,
}

/// Types are indexed unless stated otherwise.
fn default_indexed() -> bool {
    true
}

/// A search field declaration.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawField {
    /// Attribute name.
    name: String,
    /// One of `plain_text`, `partial_match`, `filter`, `autocomplete`, `related`.
    #[serde(default = "default_kind")]
    kind: String,
    /// Optional boost.
    #[serde(default)]
    boost: Option<f32>,
    /// Children of a related field.
    #[serde(default)]
    fields: Vec<RawField>,
}

/// Fields are plain text unless stated otherwise.
fn default_kind() -> String {
    "plain_text".to_string()
}

/// A record entry.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRecord {
    /// Concrete type.
    content_type: ContentType,
    /// Primary key; numbers are accepted.
    pk: Value,
    /// Attribute values.
    #[serde(default)]
    values: Map<String, Value>,
}

impl RawField {
    /// Converts to a field declaration.
    fn into_spec(self) -> Result<SearchFieldSpec, CatalogError> {
        let spec = match self.kind.as_str() {
            "plain_text" | "search" => SearchFieldSpec::plain_text(self.name),
            "partial_match" | "partial" => SearchFieldSpec::partial_match(self.name),
            "filter" => SearchFieldSpec::filter(self.name),
            "autocomplete" => SearchFieldSpec::autocomplete(self.name),
            "related" => {
                let children = self
                    .fields
                    .into_iter()
                    .map(Self::into_spec)
                    .collect::<Result<Vec<_>, _>>()?;
                SearchFieldSpec::related(self.name, children)
            }
            other => {
                return Err(CatalogError::Invalid(format!(
                    "unknown field kind '{other}' on '{}'",
                    self.name
                )));
            }
        };
        Ok(match self.boost {
            Some(boost) => spec.with_boost(boost),
            None => spec,
        })
    }
}

/// Reads a fixture file into a new catalog.
pub fn load_fixture(path: &Path) -> Result<MemoryCatalog, CatalogError> {
    let content = fs::read_to_string(path).map_err(|source| CatalogError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let raw: RawFixture = serde_json::from_str(&content).map_err(|source| CatalogError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    build(raw)
}

/// Parses fixture JSON into a new catalog.
pub fn parse_fixture(content: &str) -> Result<MemoryCatalog, CatalogError> {
    let raw: RawFixture = serde_json::from_str(content)
        .map_err(|e| CatalogError::Invalid(format!("malformed fixture: {e}")))?;
    build(raw)
}

/// Populates a catalog from a parsed fixture.
fn build(raw: RawFixture) -> Result<MemoryCatalog, CatalogError> {
    let catalog = MemoryCatalog::new();
    for ty in raw.types {
        let fields = ty
            .fields
            .into_iter()
            .map(RawField::into_spec)
            .collect::<Result<Vec<_>, _>>()?;
        catalog.register_type(ty.content_type, ty.parent, ty.indexed, fields)?;
    }
    for rec in raw.records {
        let mut record = MemoryRecord::new(pk_string(&rec.pk)?);
        for (name, value) in rec.values {
            record.set(name, convert(value)?);
        }
        catalog.insert(&rec.content_type, record)?;
    }
    Ok(catalog)
}

/// A primary key from a JSON string or number.
fn pk_string(value: &Value) -> Result<String, CatalogError> {
    match value {
        Value::String(s) if !s.is_empty() => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(CatalogError::Invalid(format!("invalid pk {other}"))),
    }
}

/// Converts a JSON value into a field value.
fn convert(value: Value) -> Result<FieldValue, CatalogError> {
    Ok(match value {
        Value::Null => FieldValue::Null,
        Value::Bool(b) => FieldValue::Bool(b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => FieldValue::Int(i),
            None => FieldValue::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => FieldValue::Text(s),
        Value::Object(map) if map.contains_key("pk") => FieldValue::Record(related(map)?),
        Value::Object(map) => FieldValue::Map(
            map.into_iter()
                .map(|(k, v)| Ok((k, convert(v)?)))
                .collect::<Result<_, CatalogError>>()?,
        ),
        Value::Array(items) if !items.is_empty() && items.iter().all(is_record) => {
            FieldValue::Records(
                items
                    .into_iter()
                    .filter_map(|v| match v {
                        Value::Object(map) => Some(related(map)),
                        _ => None,
                    })
                    .collect::<Result<_, _>>()?,
            )
        }
        Value::Array(items) => FieldValue::List(
            items
                .into_iter()
                .map(convert)
                .collect::<Result<_, _>>()?,
        ),
    })
}

/// Whether a JSON value describes a related record.
fn is_record(value: &Value) -> bool {
    value.as_object().is_some_and(|m| m.contains_key("pk"))
}

/// Builds a related record from a JSON object with a `pk` key.
fn related(mut map: Map<String, Value>) -> Result<Arc<dyn Record>, CatalogError> {
    let pk = map.remove("pk").unwrap_or(Value::Null);
    let mut record = MemoryRecord::new(pk_string(&pk)?);
    for (name, value) in map {
        record.set(name, convert(value)?);
    }
    Ok(Arc::new(record))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{catalog::Catalog, fields::SearchFieldKind};

    const FIXTURE: &str = r#"{
        "types": [
            {"content_type": "core.page", "fields": [
                {"name": "title", "boost": 2.0},
                {"name": "live", "kind": "filter"}
            ]},
            {"content_type": "blog.post", "parent": "core.page", "fields": [
                {"name": "title"},
                {"name": "author", "kind": "related", "fields": [{"name": "name"}]},
                {"name": "tags", "kind": "related", "fields": [{"name": "name"}]}
            ]}
        ],
        "records": [
            {"content_type": "core.page", "pk": 1, "values": {"title": "Home", "live": true}},
            {"content_type": "blog.post", "pk": "2", "values": {
                "title": "Hello",
                "author": {"pk": 7, "name": "Ada"},
                "tags": [{"pk": 1, "name": "rust"}, {"pk": 2, "name": "search"}],
                "meta": {"a": "x", "b": [1, 2]}
            }}
        ]
    }"#;

    fn ct(label: &str) -> ContentType {
        label.parse().unwrap()
    }

    #[test]
    fn parses_types_and_records() {
        let catalog = parse_fixture(FIXTURE).unwrap();
        assert_eq!(catalog.content_types(), vec![ct("core.page"), ct("blog.post")]);
        assert_eq!(catalog.ancestors(&ct("blog.post")), vec![ct("core.page")]);

        let fields = catalog.search_fields(&ct("core.page")).unwrap();
        assert_eq!(fields[0].boost, Some(2.0));
        assert!(matches!(fields[1].kind, SearchFieldKind::Filter));

        let (_, home) = catalog.get(&ct("core.page"), "1").unwrap();
        assert_eq!(home.field_value("live").coerce(), "true");
    }

    #[test]
    fn nested_values() {
        let catalog = parse_fixture(FIXTURE).unwrap();
        let (_, post) = catalog.get(&ct("blog.post"), "2").unwrap();
        assert!(matches!(post.field_value("author"), FieldValue::Record(_)));
        assert!(matches!(post.field_value("tags"), FieldValue::Records(ref rs) if rs.len() == 2));
        assert_eq!(post.field_value("meta").coerce(), "x, 1, 2");
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse_fixture("{").is_err());
        assert!(parse_fixture(r#"{"types": [{"content_type": "a.b", "fields": [{"name": "x", "kind": "weird"}]}]}"#).is_err());
        assert!(parse_fixture(r#"{"records": [{"content_type": "a.b", "pk": "1"}]}"#).is_err());
        assert!(parse_fixture(r#"{"types": [{"content_type": "a.b"}], "records": [{"content_type": "a.b", "pk": ""}]}"#).is_err());
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fixture.json");
        fs::write(&path, FIXTURE).unwrap();
        let catalog = load_fixture(&path).unwrap();
        assert_eq!(catalog.all_records().len(), 2);

        let missing = load_fixture(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(missing, CatalogError::Read { .. }));
    }
}
