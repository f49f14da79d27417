//! Dependency sets and ancestor chains
//!
//! Every executed macro node carries a [`Dependencies`] value that the
//! refresh scheduler tests against each change batch, and the
//! [`AncestorChain`] of transclusions that were being expanded when it ran.

use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tiddle_types::{ChangeMap, Title};

/// The titles whose change requires a node to re-execute
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Dependencies {
    /// The real dependency could not be determined without executing
    All,
    Titles(BTreeSet<Title>),
}

impl Dependencies {
    pub fn none() -> Self {
        Dependencies::Titles(BTreeSet::new())
    }

    pub fn all() -> Self {
        Dependencies::All
    }

    pub fn title(title: impl Into<Title>) -> Self {
        let mut deps = Self::none();
        deps.insert(title);
        deps
    }

    pub fn insert(&mut self, title: impl Into<Title>) {
        if let Dependencies::Titles(titles) = self {
            titles.insert(title.into());
        }
    }

    /// Widen to the union of both sets
    pub fn merge(&mut self, other: Dependencies) {
        match other {
            Dependencies::All => *self = Dependencies::All,
            Dependencies::Titles(theirs) => {
                if let Dependencies::Titles(ours) = self {
                    ours.extend(theirs);
                }
            }
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Dependencies::All)
    }

    pub fn titles(&self) -> Option<&BTreeSet<Title>> {
        match self {
            Dependencies::All => None,
            Dependencies::Titles(titles) => Some(titles),
        }
    }

    /// Does this change batch require re-execution?
    pub fn has_changed(&self, changes: &ChangeMap) -> bool {
        match self {
            Dependencies::All => !changes.is_empty(),
            Dependencies::Titles(titles) => {
                // Iterate over the smaller side
                if titles.len() <= changes.len() {
                    titles.iter().any(|t| changes.contains(t.as_str()))
                } else {
                    changes.titles().any(|t| titles.contains(t))
                }
            }
        }
    }
}

impl Default for Dependencies {
    fn default() -> Self {
        Self::none()
    }
}

#[derive(Debug)]
struct Link {
    title: Title,
    parent: Option<Arc<Link>>,
}

/// Persistent list of the titles currently being transcluded
///
/// Extending a chain never mutates it: [`push`](AncestorChain::push) returns a
/// new chain sharing its tail, so sibling expansions cannot observe each
/// other's entries.
#[derive(Debug, Clone, Default)]
pub struct AncestorChain {
    head: Option<Arc<Link>>,
    len: usize,
}

impl AncestorChain {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn push(&self, title: impl Into<Title>) -> AncestorChain {
        AncestorChain {
            head: Some(Arc::new(Link {
                title: title.into(),
                parent: self.head.clone(),
            })),
            len: self.len + 1,
        }
    }

    pub fn contains(&self, title: &str) -> bool {
        self.iter().any(|t| t == title)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Most recently pushed title
    pub fn innermost(&self) -> Option<&Title> {
        self.head.as_ref().map(|link| &link.title)
    }

    /// Titles from innermost to outermost
    pub fn iter(&self) -> impl Iterator<Item = &Title> {
        let mut cursor = self.head.as_deref();
        std::iter::from_fn(move || {
            let link = cursor?;
            cursor = link.parent.as_deref();
            Some(&link.title)
        })
    }

    /// Titles from outermost to innermost
    pub fn to_vec(&self) -> Vec<Title> {
        let mut titles: Vec<Title> = self.iter().cloned().collect();
        titles.reverse();
        titles
    }
}

impl PartialEq for AncestorChain {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.iter().eq(other.iter())
    }
}

impl Eq for AncestorChain {}

#[cfg(test)]
mod tests {
    use super::*;
    use tiddle_types::ChangeKind;

    fn changes(titles: &[&str]) -> ChangeMap {
        titles
            .iter()
            .map(|t| (Title::new(*t), ChangeKind::Modified))
            .collect()
    }

    #[test]
    fn test_titles_intersection() {
        let deps = Dependencies::title("Y");

        assert!(!deps.has_changed(&changes(&["X"])));
        assert!(deps.has_changed(&changes(&["X", "Y"])));
    }

    #[test]
    fn test_all_needs_nonempty_changes() {
        let deps = Dependencies::all();

        assert!(!deps.has_changed(&ChangeMap::new()));
        assert!(deps.has_changed(&changes(&["Anything"])));
    }

    #[test]
    fn test_merge_widens_to_all() {
        let mut deps = Dependencies::title("A");
        deps.merge(Dependencies::title("B"));
        assert_eq!(deps.titles().map(|t| t.len()), Some(2));

        deps.merge(Dependencies::all());
        assert!(deps.is_all());

        deps.insert("C");
        assert!(deps.is_all());
    }

    #[test]
    fn test_chain_is_persistent() {
        let root = AncestorChain::new().push("Page");
        let left = root.push("Left");
        let right = root.push("Right");

        assert_eq!(root.len(), 1);
        assert!(left.contains("Left"));
        assert!(!left.contains("Right"));
        assert!(right.contains("Page"));
        assert_eq!(left.to_vec(), vec![Title::new("Page"), Title::new("Left")]);
        assert_eq!(right.innermost(), Some(&Title::new("Right")));
    }
}
