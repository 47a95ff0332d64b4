//! Hierarchical selection over the analyzed repository tree.

use std::collections::HashMap;

use crate::domain::errors::DomainError;
use crate::domain::model::{NodeKind, TreeNode};

/// One node of the flattened tree.
///
/// Nodes are stored in pre-order, so the descendants of the node at `index` occupy exactly
/// `index + 1..subtree_end`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionNode {
    pub path: String,
    pub name: String,
    pub kind: NodeKind,
    pub checked: bool,
    pub depth: usize,
    pub parent: Option<usize>,
    subtree_end: usize,
}

impl SelectionNode {
    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    pub fn is_file(&self) -> bool {
        self.kind == NodeKind::File
    }

    /// Whether the node has at least one descendant.
    pub fn has_children(&self, index: usize) -> bool {
        self.subtree_end > index + 1
    }
}

/// Checkable tree of directories and files built from one analysis result.
#[derive(Debug, Clone, Default)]
pub struct SelectionTree {
    nodes: Vec<SelectionNode>,
    index: HashMap<String, usize>,
}

impl SelectionTree {
    /// Build a fresh tree with every node checked.
    ///
    /// Validation runs over the whole input before the tree is returned, so a malformed
    /// result never leaves a partially built tree behind.
    pub fn build(root: &TreeNode) -> Result<Self, DomainError> {
        let mut tree = SelectionTree::default();
        tree.push_node(root, 0, None)?;
        tracing::debug!(nodes = tree.nodes.len(), "built selection tree");
        Ok(tree)
    }

    /// Replace the whole tree. On error the current tree is left untouched.
    pub fn rebuild(&mut self, root: &TreeNode) -> Result<(), DomainError> {
        *self = Self::build(root)?;
        Ok(())
    }

    fn push_node(
        &mut self,
        node: &TreeNode,
        depth: usize,
        parent: Option<usize>,
    ) -> Result<(), DomainError> {
        let kind = match node.kind.as_deref() {
            Some(raw) => NodeKind::parse(raw).ok_or_else(|| {
                DomainError::malformed(format!("node '{}' has unknown type '{raw}'", node.path))
            })?,
            None => {
                return Err(DomainError::malformed(format!(
                    "node '{}' is missing its type",
                    node.path
                )));
            }
        };

        let children = node.children.as_deref().unwrap_or_default();
        if kind == NodeKind::File && !children.is_empty() {
            return Err(DomainError::malformed(format!(
                "file '{}' cannot have children",
                node.path
            )));
        }

        let position = self.nodes.len();
        if self.index.insert(node.path.clone(), position).is_some() {
            return Err(DomainError::malformed(format!(
                "duplicate path '{}'",
                node.path
            )));
        }

        self.nodes.push(SelectionNode {
            path: node.path.clone(),
            name: if node.name.is_empty() {
                node.path.clone()
            } else {
                node.name.clone()
            },
            kind,
            checked: true,
            depth,
            parent,
            subtree_end: position + 1,
        });

        for child in children {
            self.push_node(child, depth + 1, Some(position))?;
        }

        self.nodes[position].subtree_end = self.nodes.len();
        Ok(())
    }

    /// Number of nodes, directories included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes in pre-order.
    pub fn nodes(&self) -> &[SelectionNode] {
        &self.nodes
    }

    /// Look up a node by path.
    pub fn node(&self, path: &str) -> Option<&SelectionNode> {
        self.index.get(path).map(|idx| &self.nodes[*idx])
    }

    /// Position of a node in [`Self::nodes`].
    pub fn position(&self, path: &str) -> Option<usize> {
        self.index.get(path).copied()
    }

    /// Checked state of the node at `path`.
    pub fn is_checked(&self, path: &str) -> Result<bool, DomainError> {
        self.node(path)
            .map(|node| node.checked)
            .ok_or_else(|| DomainError::NodeNotFound {
                path: path.to_string(),
            })
    }

    /// Set the node at `path` and every descendant to `value`.
    ///
    /// Returns the number of nodes written, the toggled node included.
    pub fn toggle(&mut self, path: &str, value: bool) -> Result<usize, DomainError> {
        let start = self
            .position(path)
            .ok_or_else(|| DomainError::NodeNotFound {
                path: path.to_string(),
            })?;
        let end = self.nodes[start].subtree_end;
        for node in &mut self.nodes[start..end] {
            node.checked = value;
        }
        Ok(end - start)
    }

    /// Overwrite every node, directories included.
    pub fn set_all(&mut self, value: bool) {
        for node in &mut self.nodes {
            node.checked = value;
        }
    }

    /// Set every file whose path ends with `suffix` to `value`. Directories are never touched.
    pub fn mask_files_with_suffix(&mut self, suffix: &str, value: bool) -> usize {
        let mut touched = 0;
        for node in self
            .nodes
            .iter_mut()
            .filter(|node| node.is_file() && node.path.ends_with(suffix))
        {
            node.checked = value;
            touched += 1;
        }
        touched
    }

    /// True when every file is checked. Directories do not participate.
    pub fn is_all_checked(&self) -> bool {
        self.files().all(|node| node.checked)
    }

    /// Iterate over file nodes.
    pub fn files(&self) -> impl Iterator<Item = &SelectionNode> {
        self.nodes.iter().filter(|node| node.is_file())
    }

    /// Paths of directories that are currently checked, in tree order.
    pub fn checked_dirs(&self) -> Vec<String> {
        self.nodes
            .iter()
            .filter(|node| node.is_dir() && node.checked)
            .map(|node| node.path.clone())
            .collect()
    }

    /// Number of checked files.
    pub fn checked_file_count(&self) -> usize {
        self.files().filter(|node| node.checked).count()
    }

    /// Render the tree as an indented checkbox outline.
    pub fn outline(&self) -> String {
        let mut lines = Vec::with_capacity(self.nodes.len());
        for node in &self.nodes {
            let mark = if node.checked { "[x]" } else { "[ ]" };
            let suffix = if node.is_dir() { "/" } else { "" };
            let name = node.name.trim_end_matches('/');
            lines.push(format!(
                "{}{mark} {name}{suffix}",
                "  ".repeat(node.depth)
            ));
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_root() -> TreeNode {
        TreeNode::directory(
            "/",
            vec![
                TreeNode::file("/a.go"),
                TreeNode::file("/b.js"),
                TreeNode::directory("/sub", vec![TreeNode::file("/sub/c.go")]),
            ],
        )
    }

    #[test]
    fn build_checks_every_node() {
        let tree = SelectionTree::build(&sample_root()).unwrap();
        assert_eq!(tree.len(), 5);
        assert!(tree.nodes().iter().all(|node| node.checked));
        assert!(tree.is_all_checked());
    }

    #[test]
    fn toggle_directory_cascades_to_descendants() {
        let mut tree = SelectionTree::build(&sample_root()).unwrap();
        let written = tree.toggle("/sub", false).unwrap();
        assert_eq!(written, 2);
        assert!(!tree.is_checked("/sub").unwrap());
        assert!(!tree.is_checked("/sub/c.go").unwrap());
        assert!(tree.is_checked("/a.go").unwrap());
        assert!(!tree.is_all_checked());
    }

    #[test]
    fn toggle_root_reaches_whole_tree() {
        let mut tree = SelectionTree::build(&sample_root()).unwrap();
        tree.toggle("/", false).unwrap();
        assert!(tree.nodes().iter().all(|node| !node.checked));
    }

    #[test]
    fn toggle_empty_directory_only_touches_itself() {
        let root = TreeNode::directory(
            "",
            vec![TreeNode::directory("empty", vec![]), TreeNode::file("x.rs")],
        );
        let mut tree = SelectionTree::build(&root).unwrap();
        assert_eq!(tree.toggle("empty", false).unwrap(), 1);
        assert!(tree.is_checked("").unwrap());
        assert!(tree.is_all_checked());
    }

    #[test]
    fn toggle_unknown_path_fails() {
        let mut tree = SelectionTree::build(&sample_root()).unwrap();
        let err = tree.toggle("/missing", true).unwrap_err();
        assert_eq!(
            err,
            DomainError::NodeNotFound {
                path: "/missing".into()
            }
        );
    }

    #[test]
    fn missing_type_is_malformed() {
        let mut node = TreeNode::file("/a.go");
        node.kind = None;
        let root = TreeNode::directory("/", vec![node]);
        let err = SelectionTree::build(&root).unwrap_err();
        assert!(matches!(err, DomainError::MalformedTree { .. }));
    }

    #[test]
    fn duplicate_paths_are_malformed() {
        let root = TreeNode::directory("/", vec![TreeNode::file("/a"), TreeNode::file("/a")]);
        assert!(matches!(
            SelectionTree::build(&root),
            Err(DomainError::MalformedTree { .. })
        ));
    }

    #[test]
    fn failed_rebuild_keeps_previous_tree() {
        let mut tree = SelectionTree::build(&sample_root()).unwrap();
        tree.toggle("/b.js", false).unwrap();

        let mut broken = TreeNode::file("/x");
        broken.children = Some(vec![TreeNode::file("/x/y")]);
        assert!(tree.rebuild(&broken).is_err());

        assert_eq!(tree.len(), 5);
        assert!(!tree.is_checked("/b.js").unwrap());
    }

    #[test]
    fn mask_leaves_directories_alone() {
        let mut tree = SelectionTree::build(&sample_root()).unwrap();
        assert_eq!(tree.mask_files_with_suffix(".go", false), 2);
        assert!(tree.is_checked("/sub").unwrap());
        assert!(tree.is_checked("/").unwrap());
        assert!(!tree.is_checked("/sub/c.go").unwrap());
    }

    #[test]
    fn checked_dirs_lists_directories_only() {
        let mut tree = SelectionTree::build(&sample_root()).unwrap();
        assert_eq!(tree.checked_dirs(), vec!["/".to_string(), "/sub".to_string()]);
        tree.toggle("/sub", false).unwrap();
        assert_eq!(tree.checked_dirs(), vec!["/".to_string()]);
    }
}
