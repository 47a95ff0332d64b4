//! Domain-specific errors.

use thiserror::Error;

/// Violations of the selection model.
///
/// `MalformedTree` rejects an analysis result before any state is touched. The not-found
/// variants indicate the caller and the model disagree about which nodes exist.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("malformed tree: {reason}")]
    MalformedTree { reason: String },
    #[error("no tree node with path '{path}'")]
    NodeNotFound { path: String },
    #[error("unknown extension '{extension}'")]
    ExtensionNotFound { extension: String },
}

impl DomainError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        DomainError::MalformedTree {
            reason: reason.into(),
        }
    }
}

/// An export the collaborator rejected or could not produce.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("export failed: {reason}")]
pub struct ExportError {
    pub reason: String,
}

impl ExportError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}
