//! Abstract document store
//!
//! The only shared mutable resource in the system. Engines never talk to it;
//! services read snapshots through it and commit write sets via
//! [`BatchCommitCoordinator`](crate::BatchCommitCoordinator).

use crate::error::StoreError;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;
use sheetwork_model::{CollectionPath, DocPath, Document, EntityId, Fields, Write};
use std::cmp::Ordering;

/// Document store interface
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch one document
    async fn get(&self, path: &DocPath) -> Result<Option<Document>, StoreError>;

    /// Fetch every document of a collection matching `query`
    async fn get_all(
        &self,
        collection: &CollectionPath,
        query: &Query,
    ) -> Result<Vec<Document>, StoreError>;

    /// Fresh identifier for a new document of `collection`
    fn generate_id(&self, collection: &CollectionPath) -> EntityId;

    /// Apply all writes atomically, or none
    async fn commit_batch(&self, writes: &[Write]) -> Result<(), StoreError>;

    /// Stream of collection snapshots: the current one, then one after every
    /// committed batch that touches the collection
    fn subscribe(&self, collection: &CollectionPath, query: Query) -> BoxStream<'static, Vec<Document>>;
}

/// Equality filter on a top-level field
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    /// Field name
    pub field: String,
    /// Required value
    pub value: Value,
}

/// Collection query: equality filters plus optional ordering field
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Query {
    filters: Vec<Filter>,
    order_by: Option<String>,
}

impl Query {
    /// Match everything, unordered
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `field == value`
    #[inline]
    #[must_use]
    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    /// Sort ascending by `field`
    #[inline]
    #[must_use]
    pub fn order_by(mut self, field: impl Into<String>) -> Self {
        self.order_by = Some(field.into());
        self
    }

    /// Filters
    #[inline]
    #[must_use]
    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    /// Whether `fields` passes every filter
    #[must_use]
    pub fn matches(&self, fields: &Fields) -> bool {
        self.filters
            .iter()
            .all(|f| fields.get(&f.field) == Some(&f.value))
    }

    /// Sort documents by the ordering field, then path
    pub fn sort(&self, docs: &mut [Document]) {
        match &self.order_by {
            Some(field) => docs.sort_by(|a, b| {
                compare(a.fields.get(field), b.fields.get(field)).then_with(|| a.path.cmp(&b.path))
            }),
            None => docs.sort_by(|a, b| a.path.cmp(&b.path)),
        }
    }
}

/// Missing values first, then numbers, then strings; everything else by its
/// JSON text
fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::Number(_)), Some(_)) => Ordering::Less,
        (Some(_), Some(Value::Number(_))) => Ordering::Greater,
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(path: &str, value: Value) -> Document {
        let Value::Object(fields) = value else {
            unreachable!()
        };
        Document::new(path.parse().unwrap(), fields)
    }

    #[test]
    fn filters_are_conjunctive() {
        let q = Query::new().where_eq("kind", "kpi").where_eq("order", 1);
        assert!(q.matches(&doc("a/1", json!({"kind": "kpi", "order": 1})).fields));
        assert!(!q.matches(&doc("a/1", json!({"kind": "kpi", "order": 2})).fields));
        assert!(!q.matches(&doc("a/1", json!({"order": 1})).fields));
    }

    #[test]
    fn sort_by_numeric_field_then_path() {
        let mut docs = vec![
            doc("a/c", json!({"order": 1})),
            doc("a/b", json!({"order": 1})),
            doc("a/a", json!({"order": 10})),
            doc("a/d", json!({})),
        ];
        Query::new().order_by("order").sort(&mut docs);
        let paths: Vec<String> = docs.iter().map(|d| d.path.to_string()).collect();
        assert_eq!(paths, vec!["a/d", "a/b", "a/c", "a/a"]);
    }
}
