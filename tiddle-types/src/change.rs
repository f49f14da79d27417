//! Change records and the batched change map delivered at each flush.

use crate::Title;
use serde::{Deserialize, Serialize};
use std::collections::btree_map;
use std::collections::BTreeMap;

/// What happened to a title since the last flush
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Added => "added",
            ChangeKind::Modified => "modified",
            ChangeKind::Deleted => "deleted",
        }
    }
}

/// One batch of changes, keyed by title
///
/// Several mutations of the same title inside one flush window coalesce into
/// a single entry: the most recent kind wins, so a deletion always replaces an
/// earlier addition or modification of the same window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeMap(BTreeMap<Title, ChangeKind>);

impl ChangeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a change, coalescing with any earlier entry for the same title
    pub fn record(&mut self, title: impl Into<Title>, kind: ChangeKind) {
        self.0.insert(title.into(), kind);
    }

    pub fn get(&self, title: &str) -> Option<ChangeKind> {
        self.0.get(title).copied()
    }

    pub fn contains(&self, title: &str) -> bool {
        self.0.contains_key(title)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn titles(&self) -> impl Iterator<Item = &Title> {
        self.0.keys()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, Title, ChangeKind> {
        self.0.iter()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

impl FromIterator<(Title, ChangeKind)> for ChangeMap {
    fn from_iter<I: IntoIterator<Item = (Title, ChangeKind)>>(iter: I) -> Self {
        let mut map = ChangeMap::new();
        for (title, kind) in iter {
            map.record(title, kind);
        }
        map
    }
}

impl<'a> IntoIterator for &'a ChangeMap {
    type Item = (&'a Title, &'a ChangeKind);
    type IntoIter = btree_map::Iter<'a, Title, ChangeKind>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl IntoIterator for ChangeMap {
    type Item = (Title, ChangeKind);
    type IntoIter = btree_map::IntoIter<Title, ChangeKind>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_kind_wins() {
        let mut changes = ChangeMap::new();
        changes.record("Foo", ChangeKind::Added);
        changes.record("Foo", ChangeKind::Modified);

        assert_eq!(changes.len(), 1);
        assert_eq!(changes.get("Foo"), Some(ChangeKind::Modified));
    }

    #[test]
    fn test_deleted_dominates() {
        let mut changes = ChangeMap::new();
        changes.record("Foo", ChangeKind::Added);
        changes.record("Foo", ChangeKind::Modified);
        changes.record("Foo", ChangeKind::Deleted);

        assert_eq!(changes.get("Foo"), Some(ChangeKind::Deleted));
    }

    #[test]
    fn test_serializes_as_map() {
        let changes: ChangeMap = [
            (Title::new("A"), ChangeKind::Added),
            (Title::new("B"), ChangeKind::Deleted),
        ]
        .into_iter()
        .collect();

        let json = serde_json::to_string(&changes).unwrap();
        assert_eq!(json, r#"{"A":"added","B":"deleted"}"#);
    }
}
