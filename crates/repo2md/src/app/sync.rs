//! Two-way reconciliation between the selection tree and the extension filter.
//!
//! Tree edits cascade to descendants and then recompute every extension as "some checked file
//! still carries it". Extension edits mask every file ending with that extension and leave
//! directories alone. Neither direction triggers the other.

use crate::app::extensions::ExtensionSet;
use crate::app::tree::SelectionTree;
use crate::domain::errors::DomainError;
use crate::domain::model::TreeNode;

/// Result of a single reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Tree nodes whose flag was written.
    pub nodes_written: usize,
    /// Value of the select-all indicator after the pass.
    pub select_all: bool,
}

/// Owns both views of the selection and keeps them consistent.
#[derive(Debug, Clone, Default)]
pub struct SyncEngine {
    tree: SelectionTree,
    extensions: ExtensionSet,
    select_all: bool,
}

impl SyncEngine {
    /// Build both views from a fresh analysis tree. Everything starts checked.
    pub fn from_root(root: &TreeNode) -> Result<Self, DomainError> {
        let tree = SelectionTree::build(root)?;
        let extensions = ExtensionSet::from_tree(&tree);
        let select_all = extensions.all_checked();
        Ok(Self {
            tree,
            extensions,
            select_all,
        })
    }

    /// Replace both views. Stale extension state never survives a rebuild; on error the
    /// engine is unchanged.
    pub fn rebuild(&mut self, root: &TreeNode) -> Result<(), DomainError> {
        *self = Self::from_root(root)?;
        Ok(())
    }

    pub fn tree(&self) -> &SelectionTree {
        &self.tree
    }

    pub fn extensions(&self) -> &ExtensionSet {
        &self.extensions
    }

    /// Current value of the select-all indicator.
    pub fn select_all(&self) -> bool {
        self.select_all
    }

    /// Tree-driven reconciliation for a toggle on a directory or file.
    pub fn toggle_node(&mut self, path: &str, value: bool) -> Result<SyncOutcome, DomainError> {
        let nodes_written = self.tree.toggle(path, value)?;
        self.extensions.recompute_from_tree(&self.tree);
        self.select_all = self.extensions.all_checked();
        tracing::debug!(
            path,
            value,
            nodes_written,
            select_all = self.select_all,
            "tree toggle reconciled"
        );
        Ok(SyncOutcome {
            nodes_written,
            select_all: self.select_all,
        })
    }

    /// Extension-driven reconciliation: mask every file ending with `extension`.
    pub fn toggle_extension(
        &mut self,
        extension: &str,
        value: bool,
    ) -> Result<SyncOutcome, DomainError> {
        self.extensions.set_checked(extension, value)?;
        let nodes_written = self.tree.mask_files_with_suffix(extension, value);
        self.select_all = self.extensions.all_checked();
        tracing::debug!(
            extension,
            value,
            nodes_written,
            select_all = self.select_all,
            "extension toggle reconciled"
        );
        Ok(SyncOutcome {
            nodes_written,
            select_all: self.select_all,
        })
    }

    /// Select-all control: every extension, file, and directory takes `value`.
    pub fn toggle_all(&mut self, value: bool) -> SyncOutcome {
        self.extensions.set_all(value);
        self.tree.set_all(value);
        self.select_all = value;
        SyncOutcome {
            nodes_written: self.tree.len(),
            select_all: value,
        }
    }

    /// Flip the node at `path`.
    pub fn flip_node(&mut self, path: &str) -> Result<SyncOutcome, DomainError> {
        let current = self.tree.is_checked(path)?;
        self.toggle_node(path, !current)
    }

    /// Flip the extension `extension`.
    pub fn flip_extension(&mut self, extension: &str) -> Result<SyncOutcome, DomainError> {
        let current = self.extensions.is_checked(extension)?;
        self.toggle_extension(extension, !current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> SyncEngine {
        SyncEngine::from_root(&TreeNode::directory(
            "/",
            vec![
                TreeNode::file("/a.go"),
                TreeNode::file("/b.js"),
                TreeNode::directory("/sub", vec![TreeNode::file("/sub/c.go")]),
            ],
        ))
        .unwrap()
    }

    #[test]
    fn initial_build_checks_everything() {
        let engine = engine();
        assert_eq!(engine.extensions().checked(), vec![".go", ".js"]);
        assert!(engine.select_all());
    }

    #[test]
    fn unchecking_last_file_of_extension_clears_it() {
        let mut engine = engine();
        let outcome = engine.toggle_node("/b.js", false).unwrap();
        assert!(!outcome.select_all);
        assert!(!engine.extensions().is_checked(".js").unwrap());
        assert!(engine.extensions().is_checked(".go").unwrap());
    }

    #[test]
    fn extension_toggle_masks_files_not_directories() {
        let mut engine = engine();
        engine.toggle_node("/b.js", false).unwrap();
        let outcome = engine.toggle_extension(".go", false).unwrap();

        assert_eq!(outcome.nodes_written, 2);
        assert!(engine.tree().files().all(|node| !node.checked));
        assert!(engine.tree().is_checked("/").unwrap());
        assert!(engine.tree().is_checked("/sub").unwrap());
    }

    #[test]
    fn directory_toggle_restores_extension() {
        let mut engine = engine();
        engine.toggle_extension(".go", false).unwrap();
        engine.toggle_node("/sub", true).unwrap();

        assert!(engine.tree().is_checked("/sub/c.go").unwrap());
        assert!(engine.extensions().is_checked(".go").unwrap());
    }

    #[test]
    fn suffix_match_is_exact() {
        let mut engine = SyncEngine::from_root(&TreeNode::directory(
            "",
            vec![TreeNode::file("a.js"), TreeNode::file("b.jsx")],
        ))
        .unwrap();
        engine.toggle_extension(".js", false).unwrap();
        assert!(!engine.tree().is_checked("a.js").unwrap());
        assert!(engine.tree().is_checked("b.jsx").unwrap());
    }

    #[test]
    fn toggle_all_sets_directories_too() {
        let mut engine = engine();
        engine.toggle_all(false);
        assert!(engine.tree().nodes().iter().all(|node| !node.checked));
        assert!(engine.extensions().checked().is_empty());
        assert!(!engine.select_all());

        engine.toggle_all(true);
        assert!(engine.tree().is_all_checked());
        assert!(engine.select_all());
    }

    #[test]
    fn unknown_targets_leave_state_untouched() {
        let mut engine = engine();
        assert!(engine.toggle_node("/nope", false).is_err());
        assert!(engine.toggle_extension(".rs", false).is_err());
        assert!(engine.tree().is_all_checked());
        assert!(engine.select_all());
    }

    #[test]
    fn rebuild_discards_previous_extensions() {
        let mut engine = engine();
        engine.toggle_node("/b.js", false).unwrap();
        engine
            .rebuild(&TreeNode::directory("", vec![TreeNode::file("lib.rs")]))
            .unwrap();
        assert_eq!(engine.extensions().checked(), vec![".rs"]);
        assert!(!engine.extensions().contains(".js"));
        assert!(engine.select_all());
    }
}
