//! Session-scoped state: the session token and the currently installed analysis.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use time::OffsetDateTime;
use uuid::Uuid;

use crate::app::extensions::ExtensionSet;
use crate::app::sync::SyncEngine;
use crate::domain::errors::DomainError;
use crate::domain::model::{AnalysisResult, SelectionSnapshot};

/// Identifier the backend uses to scope temporary repository state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionToken(String);

impl SessionToken {
    /// Generate a random token for a new session.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionToken {
    fn default() -> Self {
        Self::generate()
    }
}

impl From<&str> for SessionToken {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for SessionToken {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Selection state for the repository analyzed last.
#[derive(Debug, Clone)]
pub struct ActiveAnalysis {
    pub repo_name: String,
    pub engine: SyncEngine,
    pub analyzed_at: OffsetDateTime,
}

impl ActiveAnalysis {
    /// Snapshot of the current selection for an export request.
    pub fn snapshot(&self) -> SelectionSnapshot {
        crate::app::export::snapshot(
            self.engine.tree(),
            self.engine.extensions(),
            &self.repo_name,
        )
    }
}

/// Everything owned by one session. Replaced wholesale on every successful analysis.
#[derive(Debug, Default)]
pub struct SessionContext {
    token: SessionToken,
    active: Option<ActiveAnalysis>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: SessionToken) -> Self {
        Self {
            token,
            active: None,
        }
    }

    pub fn token(&self) -> &SessionToken {
        &self.token
    }

    pub fn active(&self) -> Option<&ActiveAnalysis> {
        self.active.as_ref()
    }

    pub fn active_mut(&mut self) -> Option<&mut ActiveAnalysis> {
        self.active.as_mut()
    }

    /// Install a fresh analysis result.
    ///
    /// The new selection is fully built before the previous one is dropped; a malformed tree
    /// leaves the session as it was.
    pub fn install(&mut self, result: AnalysisResult) -> Result<&ActiveAnalysis, DomainError> {
        let engine = SyncEngine::from_root(&result.dirs_tree)?;
        report_extension_drift(&result.extensions, engine.extensions());

        tracing::info!(
            repo = %result.repo_name,
            nodes = engine.tree().len(),
            extensions = engine.extensions().len(),
            "installed analysis"
        );
        let active = self.active.insert(ActiveAnalysis {
            repo_name: result.repo_name,
            engine,
            analyzed_at: OffsetDateTime::now_utc(),
        });
        Ok(&*active)
    }

    /// Drop the installed analysis.
    pub fn clear(&mut self) {
        self.active = None;
    }
}

fn report_extension_drift(reported: &[String], derived: &ExtensionSet) {
    let reported: BTreeSet<&str> = reported.iter().map(String::as_str).collect();
    let derived_keys = derived.entries();
    let derived: BTreeSet<&str> = derived_keys
        .iter()
        .map(|entry| entry.extension.as_str())
        .collect();
    if reported != derived {
        let only_reported: Vec<_> = reported.difference(&derived).collect();
        let only_derived: Vec<_> = derived.difference(&reported).collect();
        tracing::debug!(
            ?only_reported,
            ?only_derived,
            "service extension list differs from tree; using tree"
        );
    }
}

/// Refuses a second run of the same operation while one is pending.
#[derive(Debug, Default)]
pub struct Flight {
    busy: AtomicBool,
}

impl Flight {
    /// Claim the operation. Returns `None` when it is already running.
    pub fn try_begin(&self) -> Option<FlightGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlightGuard { flight: self })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Releases the claimed operation on drop, whether it succeeded or failed.
#[derive(Debug)]
pub struct FlightGuard<'a> {
    flight: &'a Flight,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.flight.busy.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::domain::model::TreeNode;

    fn result(name: &str, files: &[&str]) -> AnalysisResult {
        AnalysisResult {
            repo_name: name.into(),
            extensions: vec![],
            dirs_tree: TreeNode::directory(
                "",
                files.iter().map(|path| TreeNode::file(*path)).collect(),
            ),
        }
    }

    #[test]
    fn tokens_are_unique_per_session() {
        let a = SessionContext::new();
        let b = SessionContext::new();
        assert_ne!(a.token(), b.token());
        assert_eq!(a.token().as_str().len(), 36);
    }

    #[test]
    fn install_replaces_previous_analysis() {
        let mut session = SessionContext::new();
        session.install(result("first", &["a.go"])).unwrap();
        session
            .active_mut()
            .unwrap()
            .engine
            .toggle_node("a.go", false)
            .unwrap();

        let active = session.install(result("second", &["b.rs"])).unwrap();
        assert_eq!(active.repo_name, "second");
        assert_eq!(active.engine.extensions().checked(), vec![".rs"]);
    }

    #[test]
    fn malformed_result_keeps_previous_analysis() {
        let mut session = SessionContext::new();
        session.install(result("first", &["a.go"])).unwrap();

        let mut broken = result("broken", &["x.py"]);
        broken.dirs_tree.kind = None;
        assert!(session.install(broken).is_err());
        assert_eq!(session.active().unwrap().repo_name, "first");
    }

    #[test]
    fn flight_refuses_reentry_until_released() {
        let flight = Flight::default();
        let guard = flight.try_begin().expect("first claim succeeds");
        assert!(flight.try_begin().is_none());
        drop(guard);
        assert!(!flight.is_busy());
        assert!(flight.try_begin().is_some());
    }
}
