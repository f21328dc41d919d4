//! Document and collection paths
//!
//! Provides [`DocPath`] and [`CollectionPath`] for addressing records in the
//! document store. Paths alternate collection and document segments:
//! `projects/{project}/sheets/{sheet}` is a document path,
//! `sheets/{sheet}/items` is a collection path.
//!
//! Segments are opaque: a `/` or `%` inside an identifier is written as
//! `%2F` / `%25` in the string form and decoded again on parse.

use crate::id::EntityId;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Cow;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Path of a collection (odd number of segments)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CollectionPath(Vec<String>);

impl CollectionPath {
    /// Top-level collection
    #[inline]
    #[must_use]
    pub fn root(name: impl Into<String>) -> Self {
        Self(vec![name.into()])
    }

    /// Path segments
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Collection name (last segment)
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        self.0.last().map_or("", String::as_str)
    }

    /// Document inside this collection
    #[inline]
    #[must_use]
    pub fn doc(&self, id: &EntityId) -> DocPath {
        let mut segments = self.0.clone();
        segments.push(id.as_str().to_string());
        DocPath(segments)
    }

    /// Check whether `path` is a direct member of this collection
    #[inline]
    #[must_use]
    pub fn contains(&self, path: &DocPath) -> bool {
        path.0.len() == self.0.len() + 1 && path.0[..self.0.len()] == self.0[..]
    }
}

impl Display for CollectionPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write_segments(f, &self.0)
    }
}

impl FromStr for CollectionPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let segments = split_segments(s)?;
        if segments.len() % 2 == 0 {
            return Err(PathError::NotACollection(s.to_string()));
        }
        Ok(Self(segments))
    }
}

/// Path of a single document (even number of segments)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocPath(Vec<String>);

impl DocPath {
    /// Build a document path under a collection
    #[inline]
    #[must_use]
    pub fn new(collection: &CollectionPath, id: &EntityId) -> Self {
        collection.doc(id)
    }

    /// Path segments
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Document identifier (last segment)
    #[inline]
    #[must_use]
    pub fn id(&self) -> EntityId {
        EntityId::new(self.0.last().map_or("", String::as_str))
    }

    /// Collection holding this document
    #[inline]
    #[must_use]
    pub fn collection(&self) -> CollectionPath {
        CollectionPath(self.0[..self.0.len() - 1].to_vec())
    }

    /// Sub-collection nested under this document
    #[inline]
    #[must_use]
    pub fn sub_collection(&self, name: impl Into<String>) -> CollectionPath {
        let mut segments = self.0.clone();
        segments.push(name.into());
        CollectionPath(segments)
    }
}

impl Display for DocPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write_segments(f, &self.0)
    }
}

impl FromStr for DocPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let segments = split_segments(s)?;
        if segments.len() % 2 != 0 {
            return Err(PathError::NotADocument(s.to_string()));
        }
        Ok(Self(segments))
    }
}

impl Serialize for DocPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DocPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

fn write_segments(f: &mut Formatter<'_>, segments: &[String]) -> fmt::Result {
    for (i, segment) in segments.iter().enumerate() {
        if i > 0 {
            f.write_str("/")?;
        }
        f.write_str(&escape(segment))?;
    }
    Ok(())
}

fn escape(segment: &str) -> Cow<'_, str> {
    if segment.contains(['/', '%']) {
        Cow::Owned(segment.replace('%', "%25").replace('/', "%2F"))
    } else {
        Cow::Borrowed(segment)
    }
}

fn unescape(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    let mut rest = segment;
    while let Some(at) = rest.find('%') {
        out.push_str(&rest[..at]);
        let code = rest.get(at + 1..at + 3);
        match code {
            Some("2F" | "2f") => out.push('/'),
            Some("25") => out.push('%'),
            _ => {
                out.push('%');
                rest = &rest[at + 1..];
                continue;
            }
        }
        rest = &rest[at + 3..];
    }
    out.push_str(rest);
    out
}

fn split_segments(s: &str) -> Result<Vec<String>, PathError> {
    if s.is_empty() {
        return Err(PathError::Empty);
    }
    s.split('/')
        .map(|seg| {
            if seg.is_empty() {
                Err(PathError::EmptySegment(s.to_string()))
            } else {
                Ok(unescape(seg))
            }
        })
        .collect()
}

/// Errors related to store paths
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PathError {
    /// Empty path
    #[error("path is empty")]
    Empty,

    /// Empty segment in path
    #[error("path '{0}' contains an empty segment")]
    EmptySegment(String),

    /// Expected a document path
    #[error("'{0}' is not a document path")]
    NotADocument(String),

    /// Expected a collection path
    #[error("'{0}' is not a collection path")]
    NotACollection(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doc_path_round_trips_through_display() {
        let path: DocPath = "sheets/s1/items/i1".parse().unwrap();
        assert_eq!(path.to_string(), "sheets/s1/items/i1");
        assert_eq!(path.id(), EntityId::new("i1"));
        assert_eq!(path.collection().to_string(), "sheets/s1/items");
    }

    #[test]
    fn collection_contains_direct_members_only() {
        let items: CollectionPath = "sheets/s1/items".parse().unwrap();
        let direct: DocPath = "sheets/s1/items/i1".parse().unwrap();
        let other: DocPath = "sheets/s2/items/i1".parse().unwrap();
        assert!(items.contains(&direct));
        assert!(!items.contains(&other));
    }

    #[test]
    fn parity_is_enforced() {
        assert_eq!(
            "sheets/s1".parse::<CollectionPath>(),
            Err(PathError::NotACollection("sheets/s1".into()))
        );
        assert_eq!(
            "sheets".parse::<DocPath>(),
            Err(PathError::NotADocument("sheets".into()))
        );
        assert!(matches!(
            "sheets//items".parse::<CollectionPath>(),
            Err(PathError::EmptySegment(_))
        ));
    }

    #[test]
    fn slashes_inside_ids_survive_display_and_parse() {
        let items: CollectionPath = "sheets/s1/items".parse().unwrap();
        let path = items.doc(&EntityId::new("a/b%c"));
        assert_eq!(path.to_string(), "sheets/s1/items/a%2Fb%25c");

        let parsed: DocPath = path.to_string().parse().unwrap();
        assert_eq!(parsed, path);
        assert_eq!(parsed.id(), EntityId::new("a/b%c"));
        assert!(items.contains(&parsed));

        let json = serde_json::to_string(&path).unwrap();
        assert_eq!(serde_json::from_str::<DocPath>(&json).unwrap(), path);
    }

    #[test]
    fn stray_percent_is_kept_verbatim() {
        let path: DocPath = "sheets/s1/items/50%off".parse().unwrap();
        assert_eq!(path.id(), EntityId::new("50%off"));
    }

    #[test]
    fn sub_collection_nests_under_document() {
        let sheet: DocPath = "projects/p1/sheets/s1".parse().unwrap();
        assert_eq!(sheet.sub_collection("items").to_string(), "projects/p1/sheets/s1/items");
    }
}
