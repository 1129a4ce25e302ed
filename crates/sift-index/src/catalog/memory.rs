//! An in-memory system of record.
//!
//! Types form a single-inheritance hierarchy. A record belongs to one concrete
//! type and is also visible as each of that type's ancestors, the way rows of a
//! multi-table inheritance model are.

use std::collections::HashMap;

use parking_lot::RwLock;

use super::{Catalog, CatalogError};
use crate::{
    document::{FieldValue, Record},
    fields::SearchFieldSpec,
    utils::ContentType,
};

/// A record held by [`MemoryCatalog`].
#[derive(Debug, Clone, Default)]
pub struct MemoryRecord {
    /// Primary key.
    pk: String,
    /// Attribute values in insertion order.
    values: Vec<(String, FieldValue)>,
}

impl MemoryRecord {
    /// A record with no attributes.
    pub fn new(pk: impl Into<String>) -> Self {
        Self {
            pk: pk.into(),
            values: Vec::new(),
        }
    }

    /// Sets an attribute, builder style.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.set(name, value);
        self
    }

    /// Sets or replaces an attribute.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        let name = name.into();
        let value = value.into();
        match self.values.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.values.push((name, value)),
        }
    }

    /// An attribute, if set.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Attribute names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(n, _)| n.as_str())
    }
}

impl Record for MemoryRecord {
    fn pk(&self) -> String {
        self.pk.clone()
    }

    fn field_value(&self, name: &str) -> FieldValue {
        self.get(name).cloned().unwrap_or(FieldValue::Null)
    }
}

/// A registered content type.
#[derive(Debug, Clone)]
struct TypeEntry {
    /// Direct parent type.
    parent: Option<ContentType>,
    /// Whether the type has its own segment.
    indexed: bool,
    /// Declared search fields.
    fields: Vec<SearchFieldSpec>,
}

/// Mutable catalog contents.
#[derive(Debug, Default)]
struct State {
    /// Types by label.
    types: HashMap<ContentType, TypeEntry>,
    /// Labels in registration order.
    order: Vec<ContentType>,
    /// Records with their concrete type, in insertion order.
    records: Vec<(ContentType, MemoryRecord)>,
}

impl State {
    /// The registered entry for `ct`.
    fn entry(&self, ct: &ContentType) -> Result<&TypeEntry, CatalogError> {
        self.types
            .get(ct)
            .ok_or_else(|| CatalogError::UnknownContentType(ct.to_string()))
    }

    /// Every ancestor of `ct`, nearest first.
    fn chain(&self, ct: &ContentType) -> Vec<ContentType> {
        let mut out = Vec::new();
        let mut current = self.types.get(ct).and_then(|e| e.parent.clone());
        while let Some(parent) = current {
            if out.contains(&parent) {
                break;
            }
            current = self.types.get(&parent).and_then(|e| e.parent.clone());
            out.push(parent);
        }
        out
    }

    /// The topmost ancestor of `ct`, or `ct` itself.
    fn root(&self, ct: &ContentType) -> ContentType {
        self.chain(ct).pop().unwrap_or_else(|| ct.clone())
    }

    /// Whether `ct` is `ancestor` or descends from it.
    fn is_a(&self, ct: &ContentType, ancestor: &ContentType) -> bool {
        ct == ancestor || self.chain(ct).contains(ancestor)
    }
}

/// A [`Catalog`] kept in memory.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    /// Types and records.
    state: RwLock<State>,
}

impl MemoryCatalog {
    /// An empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a content type. The parent must already be registered.
    ///
    /// Re-registering a type replaces its declaration.
    pub fn register_type(
        &self,
        ct: ContentType,
        parent: Option<ContentType>,
        indexed: bool,
        fields: Vec<SearchFieldSpec>,
    ) -> Result<(), CatalogError> {
        let mut state = self.state.write();
        if let Some(parent) = &parent {
            if parent == &ct {
                return Err(CatalogError::Invalid(format!("{ct} cannot be its own parent")));
            }
            if !state.types.contains_key(parent) {
                return Err(CatalogError::Invalid(format!(
                    "parent {parent} of {ct} is not registered"
                )));
            }
        }
        if !state.types.contains_key(&ct) {
            state.order.push(ct.clone());
        }
        state.types.insert(
            ct,
            TypeEntry {
                parent,
                indexed,
                fields,
            },
        );
        Ok(())
    }

    /// Stores a record of concrete type `ct`.
    ///
    /// A record with the same pk in the same hierarchy is replaced in place.
    pub fn insert(&self, ct: &ContentType, record: MemoryRecord) -> Result<(), CatalogError> {
        let mut state = self.state.write();
        state.entry(ct)?;
        let root = state.root(ct);
        let existing = state
            .records
            .iter()
            .position(|(t, r)| r.pk == record.pk && state.root(t) == root);
        match existing {
            Some(i) => state.records[i] = (ct.clone(), record),
            None => state.records.push((ct.clone(), record)),
        }
        Ok(())
    }

    /// Removes the record `pk` of `ct` or one of its descendants.
    pub fn remove(&self, ct: &ContentType, pk: &str) -> Option<MemoryRecord> {
        let mut state = self.state.write();
        let i = state
            .records
            .iter()
            .position(|(t, r)| r.pk == pk && state.is_a(t, ct))?;
        Some(state.records.remove(i).1)
    }

    /// Looks up one record of `ct` or its descendants, with its concrete type.
    pub fn get(&self, ct: &ContentType, pk: &str) -> Option<(ContentType, MemoryRecord)> {
        let state = self.state.read();
        state
            .records
            .iter()
            .find(|(t, r)| r.pk == pk && state.is_a(t, ct))
            .cloned()
    }

    /// Records whose concrete type is exactly `ct`.
    pub fn records_of(&self, ct: &ContentType) -> Vec<MemoryRecord> {
        self.state
            .read()
            .records
            .iter()
            .filter(|(t, _)| t == ct)
            .map(|(_, r)| r.clone())
            .collect()
    }

    /// Every record with its concrete type, in insertion order.
    pub fn all_records(&self) -> Vec<(ContentType, MemoryRecord)> {
        self.state.read().records.clone()
    }

    /// Registered types in registration order.
    pub fn content_types(&self) -> Vec<ContentType> {
        self.state.read().order.clone()
    }
}

impl Catalog for MemoryCatalog {
    type Record = MemoryRecord;

    fn search_fields(&self, ct: &ContentType) -> Result<Vec<SearchFieldSpec>, CatalogError> {
        Ok(self.state.read().entry(ct)?.fields.clone())
    }

    fn is_indexed(&self, ct: &ContentType) -> bool {
        self.state.read().types.get(ct).is_some_and(|e| e.indexed)
    }

    fn ancestors(&self, ct: &ContentType) -> Vec<ContentType> {
        let state = self.state.read();
        state
            .chain(ct)
            .into_iter()
            .filter(|a| state.types.get(a).is_some_and(|e| e.indexed))
            .collect()
    }

    fn descendants(&self, ct: &ContentType) -> Vec<ContentType> {
        let state = self.state.read();
        state
            .order
            .iter()
            .filter(|t| *t != ct && state.is_a(t, ct))
            .cloned()
            .collect()
    }

    fn fetch_by_ids(
        &self,
        ct: &ContentType,
        ids: &[String],
    ) -> Result<Vec<MemoryRecord>, CatalogError> {
        let state = self.state.read();
        state.entry(ct)?;
        Ok(state
            .records
            .iter()
            .filter(|(t, r)| ids.contains(&r.pk) && state.is_a(t, ct))
            .map(|(_, r)| r.clone())
            .collect())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn ct(label: &str) -> ContentType {
        label.parse().unwrap()
    }

    fn catalog() -> MemoryCatalog {
        let catalog = MemoryCatalog::new();
        catalog
            .register_type(
                ct("core.page"),
                None,
                true,
                vec![SearchFieldSpec::plain_text("title")],
            )
            .unwrap();
        catalog
            .register_type(
                ct("blog.post"),
                Some(ct("core.page")),
                true,
                vec![
                    SearchFieldSpec::plain_text("title"),
                    SearchFieldSpec::plain_text("body"),
                ],
            )
            .unwrap();
        catalog
            .register_type(ct("blog.draft"), Some(ct("blog.post")), false, vec![])
            .unwrap();
        catalog
    }

    #[test]
    fn hierarchy_queries() {
        let catalog = catalog();
        assert_eq!(catalog.ancestors(&ct("blog.post")), vec![ct("core.page")]);
        assert_eq!(
            catalog.ancestors(&ct("blog.draft")),
            vec![ct("blog.post"), ct("core.page")]
        );
        assert_eq!(
            catalog.descendants(&ct("core.page")),
            vec![ct("blog.post"), ct("blog.draft")]
        );
        assert!(catalog.descendants(&ct("blog.draft")).is_empty());
        assert!(!catalog.is_indexed(&ct("blog.draft")));
    }

    #[test]
    fn unindexed_ancestors_are_skipped() {
        let catalog = catalog();
        catalog
            .register_type(ct("blog.note"), Some(ct("blog.draft")), true, vec![])
            .unwrap();
        assert_eq!(
            catalog.ancestors(&ct("blog.note")),
            vec![ct("blog.post"), ct("core.page")]
        );
    }

    #[test]
    fn unknown_parent_is_rejected() {
        let catalog = MemoryCatalog::new();
        let err = catalog
            .register_type(ct("blog.post"), Some(ct("core.page")), true, vec![])
            .unwrap_err();
        assert!(matches!(err, CatalogError::Invalid(_)));
    }

    #[test]
    fn subtype_records_are_fetchable_as_ancestors() {
        let catalog = catalog();
        catalog
            .insert(&ct("core.page"), MemoryRecord::new("1").with("title", "Home"))
            .unwrap();
        catalog
            .insert(&ct("blog.post"), MemoryRecord::new("2").with("title", "Hello"))
            .unwrap();

        let ids = vec!["2".to_string(), "1".to_string(), "9".to_string()];
        let pages = catalog.fetch_by_ids(&ct("core.page"), &ids).unwrap();
        let pks: Vec<String> = pages.iter().map(Record::pk).collect();
        assert_eq!(pks, ["1", "2"]);

        let posts = catalog.fetch_by_ids(&ct("blog.post"), &ids).unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].pk(), "2");
    }

    #[test]
    fn insert_replaces_within_hierarchy() {
        let catalog = catalog();
        catalog
            .insert(&ct("core.page"), MemoryRecord::new("1").with("title", "Old"))
            .unwrap();
        catalog
            .insert(&ct("blog.post"), MemoryRecord::new("1").with("title", "New"))
            .unwrap();
        let all = catalog.all_records();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].0, ct("blog.post"));
        assert_eq!(all[0].1.field_value("title").coerce(), "New");
    }

    #[test]
    fn remove_and_unknown_type() {
        let catalog = catalog();
        catalog
            .insert(&ct("blog.post"), MemoryRecord::new("2"))
            .unwrap();
        assert!(catalog.remove(&ct("core.page"), "2").is_some());
        assert!(catalog.get(&ct("core.page"), "2").is_none());

        let err = catalog
            .fetch_by_ids(&ct("shop.item"), &["1".to_string()])
            .unwrap_err();
        assert!(matches!(err, CatalogError::UnknownContentType(_)));
        assert!(
            catalog
                .insert(&ct("shop.item"), MemoryRecord::new("1"))
                .is_err()
        );
    }

    #[test]
    fn record_attributes() {
        let mut record = MemoryRecord::new("1").with("title", "a");
        record.set("title", "b");
        record.set("body", 3i64);
        assert_eq!(record.field_value("title").coerce(), "b");
        assert_eq!(record.field_value("body").coerce(), "3");
        assert!(matches!(record.field_value("missing"), FieldValue::Null));
        assert_eq!(record.names().collect::<Vec<_>>(), ["title", "body"]);
    }
}
