//! Flat extension filter derived from the selection tree.

use std::collections::BTreeMap;

use crate::app::tree::SelectionTree;
use crate::domain::errors::DomainError;
use crate::domain::model::ExtensionEntry;

/// Extension key for a file path: the text from the last `.` onwards, e.g. `.go`.
///
/// Paths without a dot, paths ending in a dot, and paths whose only dot sits in a directory
/// component (`conf.d/README`) have no extension. This departs deliberately from taking the text
/// after the last `.` of every dotted path, which would yield `.d/README`.
pub fn extension_of(path: &str) -> Option<&str> {
    let dot = path.rfind('.')?;
    let ext = &path[dot..];
    if ext.len() == 1 || ext.contains('/') {
        return None;
    }
    Some(ext)
}

/// Distinct extensions of the current tree with their checked flags, ordered by key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionSet {
    entries: BTreeMap<String, bool>,
}

impl ExtensionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from the files of `tree` with every entry checked.
    pub fn from_tree(tree: &SelectionTree) -> Self {
        let mut set = Self::new();
        set.rebuild_from(tree);
        set
    }

    /// Replace the member list with the extensions of `tree`. All entries start checked.
    pub fn rebuild_from(&mut self, tree: &SelectionTree) {
        self.entries = tree
            .files()
            .filter_map(|node| extension_of(&node.path))
            .map(|ext| (ext.to_string(), true))
            .collect();
    }

    /// Set one entry's flag.
    pub fn set_checked(&mut self, extension: &str, value: bool) -> Result<(), DomainError> {
        match self.entries.get_mut(extension) {
            Some(checked) => {
                *checked = value;
                Ok(())
            }
            None => Err(DomainError::ExtensionNotFound {
                extension: extension.to_string(),
            }),
        }
    }

    /// Mark each extension checked iff at least one checked file carries it.
    ///
    /// The member list is left as is.
    pub fn recompute_from_tree(&mut self, tree: &SelectionTree) {
        for checked in self.entries.values_mut() {
            *checked = false;
        }
        for node in tree.files().filter(|node| node.checked) {
            if let Some(ext) = extension_of(&node.path)
                && let Some(checked) = self.entries.get_mut(ext)
            {
                *checked = true;
            }
        }
    }

    pub fn set_all(&mut self, value: bool) {
        for checked in self.entries.values_mut() {
            *checked = value;
        }
    }

    /// True when every entry is checked. An empty set counts as all checked.
    pub fn all_checked(&self) -> bool {
        self.entries.values().all(|checked| *checked)
    }

    pub fn is_checked(&self, extension: &str) -> Result<bool, DomainError> {
        self.entries
            .get(extension)
            .copied()
            .ok_or_else(|| DomainError::ExtensionNotFound {
                extension: extension.to_string(),
            })
    }

    pub fn contains(&self, extension: &str) -> bool {
        self.entries.contains_key(extension)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in key order.
    pub fn entries(&self) -> Vec<ExtensionEntry> {
        self.entries
            .iter()
            .map(|(extension, checked)| ExtensionEntry {
                extension: extension.clone(),
                checked: *checked,
            })
            .collect()
    }

    /// Keys of checked entries in key order.
    pub fn checked(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, checked)| **checked)
            .map(|(extension, _)| extension.clone())
            .collect()
    }

    /// Extension at `index` in key order.
    pub fn key_at(&self, index: usize) -> Option<&str> {
        self.entries.keys().nth(index).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::domain::model::TreeNode;

    fn tree() -> SelectionTree {
        SelectionTree::build(&TreeNode::directory(
            "",
            vec![
                TreeNode::file("main.go"),
                TreeNode::file("web/app.js"),
                TreeNode::file("web/app.min.js"),
                TreeNode::file("Makefile"),
                TreeNode::file("conf.d/README"),
            ],
        ))
        .unwrap()
    }

    #[test]
    fn extension_of_uses_last_dot() {
        assert_eq!(extension_of("a/b/foo.min.js"), Some(".js"));
        assert_eq!(extension_of("Makefile"), None);
        assert_eq!(extension_of("trailing."), None);
        assert_eq!(extension_of("conf.d/README"), None);
    }

    #[test]
    fn rebuild_collects_distinct_extensions() {
        let set = ExtensionSet::from_tree(&tree());
        let keys: Vec<_> = set.entries().into_iter().map(|e| e.extension).collect();
        assert_eq!(keys, vec![".go".to_string(), ".js".to_string()]);
        assert!(set.all_checked());
    }

    #[test]
    fn set_checked_rejects_unknown_extension() {
        let mut set = ExtensionSet::from_tree(&tree());
        assert_eq!(
            set.set_checked(".rs", false),
            Err(DomainError::ExtensionNotFound {
                extension: ".rs".into()
            })
        );
    }

    #[test]
    fn recompute_is_any_checked_file() {
        let mut tree = tree();
        let mut set = ExtensionSet::from_tree(&tree);

        tree.toggle("web/app.js", false).unwrap();
        set.recompute_from_tree(&tree);
        assert!(set.is_checked(".js").unwrap());

        tree.toggle("web/app.min.js", false).unwrap();
        set.recompute_from_tree(&tree);
        assert!(!set.is_checked(".js").unwrap());
        assert!(!set.all_checked());

        let before = set.clone();
        set.recompute_from_tree(&tree);
        assert_eq!(before, set);
    }

    #[test]
    fn key_at_follows_sorted_order() {
        let set = ExtensionSet::from_tree(&tree());
        assert_eq!(set.key_at(0), Some(".go"));
        assert_eq!(set.key_at(1), Some(".js"));
        assert_eq!(set.key_at(2), None);
    }
}
