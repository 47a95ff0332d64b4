//! Domain models for repository trees, extensions, and export selections.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Kind of a node in the analyzed repository tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Directory,
    File,
}

impl NodeKind {
    /// Parse the wire representation used by the analysis service.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "directory" | "dir" => Some(NodeKind::Directory),
            "file" => Some(NodeKind::File),
            _ => None,
        }
    }
}

/// Tree node exactly as shipped by the analysis service.
///
/// The `kind` is kept as a raw string so that a missing or unknown type can be reported as a
/// malformed tree instead of a generic decoding failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    #[serde(default)]
    pub name: String,
    pub path: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub children: Option<Vec<TreeNode>>,
}

impl TreeNode {
    /// Convenience constructor for a directory node.
    pub fn directory(path: impl Into<String>, children: Vec<TreeNode>) -> Self {
        let path = path.into();
        Self {
            name: display_name(&path),
            path,
            kind: Some("directory".into()),
            children: Some(children),
        }
    }

    /// Convenience constructor for a file node.
    pub fn file(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            name: display_name(&path),
            path,
            kind: Some("file".into()),
            children: None,
        }
    }
}

fn display_name(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rsplit_once('/') {
        Some((_, name)) if !name.is_empty() => name.to_string(),
        _ if trimmed.is_empty() => path.to_string(),
        _ => trimmed.to_string(),
    }
}

/// Response of the analysis service for a repository URL or archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub repo_name: String,
    #[serde(default)]
    pub extensions: Vec<String>,
    pub dirs_tree: TreeNode,
}

/// A single extension and whether it participates in the selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionEntry {
    pub extension: String,
    pub checked: bool,
}

/// Immutable read of the selection used to build one export request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionSnapshot {
    pub repo_name: String,
    pub selected_extensions: BTreeSet<String>,
    pub selected_dirs: BTreeSet<String>,
}

impl SelectionSnapshot {
    /// Wire representation accepted by both export endpoints.
    pub fn to_request(&self) -> ExportRequest {
        ExportRequest {
            repo_name: self.repo_name.clone(),
            exts: self.selected_extensions.iter().cloned().collect(),
            dirs: self.selected_dirs.iter().cloned().collect(),
        }
    }
}

/// Export request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRequest {
    pub repo_name: String,
    pub exts: Vec<String>,
    pub dirs: Vec<String>,
}

/// Inline export rendered by the export service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineExport {
    pub content: String,
    #[serde(default)]
    pub export_file: Option<String>,
}

/// Downloadable export: raw bytes plus the file name to store them under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadExport {
    pub bytes: Vec<u8>,
    pub filename: String,
}
