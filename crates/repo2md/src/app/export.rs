//! Export requests built from the current selection.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::ValueEnum;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::app::extensions::ExtensionSet;
use crate::app::session::{Flight, SessionToken};
use crate::app::tree::SelectionTree;
use crate::domain::errors::ExportError;
use crate::domain::model::{DownloadExport, InlineExport, SelectionSnapshot};
use crate::infra::backend::ExportService;
use crate::infra::config::Config;

static UNSAFE_FILENAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w.\-]+").expect("filename pattern is valid"));

/// How the export service should render a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
#[value(rename_all = "kebab-case")]
pub enum ExportMode {
    /// Text returned in the response body, shown as a preview.
    Inline,
    /// Markdown file saved to disk.
    Download,
}

impl ExportMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportMode::Inline => "inline",
            ExportMode::Download => "download",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ExportMode::Inline => "an inline",
            ExportMode::Download => "a download",
        }
    }
}

impl FromStr for ExportMode {
    type Err = ExportModeParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "inline" | "text" | "preview" | "json" => Ok(ExportMode::Inline),
            "download" | "file" => Ok(ExportMode::Download),
            other => Err(ExportModeParseError::UnknownMode(other.to_string())),
        }
    }
}

/// Error returned when parsing an [`ExportMode`] fails.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ExportModeParseError {
    #[error("unknown export mode '{0}'")]
    UnknownMode(String),
}

/// Runtime options controlling what happens with an export once it arrives.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub mode: ExportMode,
    pub output_dir: PathBuf,
    pub copy_to_clipboard: bool,
}

impl ExportOptions {
    /// Build options from configuration defaults.
    pub fn from_config(config: &Config) -> Self {
        let mode = config
            .export
            .mode()
            .parse::<ExportMode>()
            .unwrap_or(ExportMode::Inline);
        Self {
            mode,
            output_dir: config.export.output_dir(),
            copy_to_clipboard: config.export.copy_to_clipboard(),
        }
    }
}

/// Read the selection into an export snapshot. Never mutates either view.
pub fn snapshot(
    tree: &SelectionTree,
    extensions: &ExtensionSet,
    repo_name: &str,
) -> SelectionSnapshot {
    SelectionSnapshot {
        repo_name: repo_name.to_string(),
        selected_extensions: extensions.checked().into_iter().collect(),
        selected_dirs: tree.checked_dirs().into_iter().collect(),
    }
}

/// File name used when the service does not suggest one.
pub fn fallback_filename(repo_name: &str) -> String {
    format!("{repo_name}_export.md")
}

/// Replace characters that are unsafe in file names.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned = UNSAFE_FILENAME_CHARS.replace_all(name.trim(), "_");
    cleaned.into_owned()
}

/// Submits snapshots to the export service. Each mode runs at most once at a time.
pub struct ExportCoordinator<S> {
    service: S,
    inline_flight: Flight,
    download_flight: Flight,
}

impl<S: ExportService> ExportCoordinator<S> {
    pub fn new(service: S) -> Self {
        Self {
            service,
            inline_flight: Flight::default(),
            download_flight: Flight::default(),
        }
    }

    pub fn is_busy(&self, mode: ExportMode) -> bool {
        match mode {
            ExportMode::Inline => self.inline_flight.is_busy(),
            ExportMode::Download => self.download_flight.is_busy(),
        }
    }

    /// Request the text rendering of `snapshot`.
    pub async fn export_inline(
        &self,
        snapshot: &SelectionSnapshot,
        session: &SessionToken,
    ) -> Result<InlineExport, ExportError> {
        let _guard = self
            .inline_flight
            .try_begin()
            .ok_or_else(|| already_running(ExportMode::Inline))?;
        tracing::info!(
            repo = %snapshot.repo_name,
            extensions = snapshot.selected_extensions.len(),
            dirs = snapshot.selected_dirs.len(),
            "requesting inline export"
        );
        self.service
            .export_inline(&snapshot.to_request(), session)
            .await
            .map_err(|err| ExportError::new(err.user_message()))
    }

    /// Request the file rendering of `snapshot`.
    pub async fn export_download(
        &self,
        snapshot: &SelectionSnapshot,
        session: &SessionToken,
    ) -> Result<DownloadExport, ExportError> {
        let _guard = self
            .download_flight
            .try_begin()
            .ok_or_else(|| already_running(ExportMode::Download))?;
        tracing::info!(
            repo = %snapshot.repo_name,
            extensions = snapshot.selected_extensions.len(),
            dirs = snapshot.selected_dirs.len(),
            "requesting download export"
        );
        let body = self
            .service
            .export_download(&snapshot.to_request(), session)
            .await
            .map_err(|err| ExportError::new(err.user_message()))?;

        let filename = body
            .suggested_name
            .as_deref()
            .map(sanitize_filename)
            .filter(|name| !name.is_empty() && name != "." && name != "..")
            .unwrap_or_else(|| fallback_filename(&snapshot.repo_name));
        Ok(DownloadExport {
            bytes: body.bytes,
            filename,
        })
    }
}

/// Refusal for a second export of `mode` while one is pending.
pub fn already_running(mode: ExportMode) -> ExportError {
    ExportError::new(format!("{} export is already running", mode.label()))
}

/// Write a downloaded export into `dir`, creating it when needed.
pub fn save_download(download: &DownloadExport, dir: &Path) -> Result<PathBuf> {
    if !dir.as_os_str().is_empty() {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create export directory: {}", dir.display()))?;
    }
    let path = dir.join(&download.filename);
    fs::write(&path, &download.bytes)
        .with_context(|| format!("failed to write export output to {}", path.display()))?;
    tracing::info!(path = %path.display(), bytes = download.bytes.len(), "saved export");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::app::sync::SyncEngine;
    use crate::domain::model::TreeNode;
    use crate::infra::backend::{DownloadBody, MockExportService, ServiceError};

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
    fn parses_mode_aliases() {
        assert_eq!("file".parse::<ExportMode>(), Ok(ExportMode::Download));
        assert_eq!("Preview".parse::<ExportMode>(), Ok(ExportMode::Inline));
        assert!("pdf".parse::<ExportMode>().is_err());
    }

    #[test]
    fn options_read_mode_from_config() {
        let config: Config = toml::from_str("[export]\nmode = \"file\"\n").unwrap();
        assert_eq!(ExportOptions::from_config(&config).mode, ExportMode::Download);

        let config: Config = toml::from_str("[export]\nmode = \"pdf\"\n").unwrap();
        assert_eq!(ExportOptions::from_config(&config).mode, ExportMode::Inline);
    }

    #[test]
    fn snapshot_reads_checked_dirs_and_extensions() {
        let mut engine = engine();
        engine.toggle_node("/b.js", false).unwrap();
        let snap = snapshot(engine.tree(), engine.extensions(), "demo");

        assert_eq!(snap.repo_name, "demo");
        assert_eq!(snap.selected_extensions.into_iter().collect::<Vec<_>>(), vec![".go"]);
        assert_eq!(
            snap.selected_dirs.into_iter().collect::<Vec<_>>(),
            vec!["/", "/sub"]
        );
    }

    #[test]
    fn sanitize_replaces_unsafe_runs() {
        assert_eq!(sanitize_filename("my repo/../x.md"), "my_repo_.._x.md");
        assert_eq!(sanitize_filename("demo_export.md"), "demo_export.md");
    }

    #[tokio::test]
    async fn inline_export_with_nothing_selected_still_submits() {
        let mut engine = engine();
        engine.toggle_all(false);
        let snap = snapshot(engine.tree(), engine.extensions(), "demo");

        let mut service = MockExportService::new();
        service
            .expect_export_inline()
            .withf(|request, _| request.exts.is_empty() && request.dirs.is_empty())
            .times(1)
            .returning(|_, _| {
                Ok(InlineExport {
                    content: "# demo\n".into(),
                    export_file: None,
                })
            });

        let coordinator = ExportCoordinator::new(service);
        let export = coordinator
            .export_inline(&snap, &SessionToken::from("s"))
            .await
            .unwrap();
        assert_eq!(export.content, "# demo\n");
    }

    #[tokio::test]
    async fn download_falls_back_to_repo_filename() {
        let mut service = MockExportService::new();
        service.expect_export_download().returning(|_, _| {
            Ok(DownloadBody {
                bytes: b"# demo".to_vec(),
                suggested_name: None,
            })
        });

        let coordinator = ExportCoordinator::new(service);
        let snap = snapshot(engine().tree(), engine().extensions(), "demo");
        let export = coordinator
            .export_download(&snap, &SessionToken::from("s"))
            .await
            .unwrap();
        assert_eq!(export.filename, "demo_export.md");
        assert_eq!(export.bytes, b"# demo");
    }

    #[tokio::test]
    async fn download_uses_suggested_filename() {
        let mut service = MockExportService::new();
        service.expect_export_download().returning(|_, _| {
            Ok(DownloadBody {
                bytes: vec![],
                suggested_name: Some("other.md".into()),
            })
        });

        let coordinator = ExportCoordinator::new(service);
        let snap = snapshot(engine().tree(), engine().extensions(), "demo");
        let export = coordinator
            .export_download(&snap, &SessionToken::from("s"))
            .await
            .unwrap();
        assert_eq!(export.filename, "other.md");
    }

    #[tokio::test]
    async fn service_failure_becomes_export_error() {
        let mut service = MockExportService::new();
        service.expect_export_inline().returning(|_, _| {
            Err(ServiceError::Rejected {
                status: 404,
                detail: "repo not found or no files selected".into(),
            })
        });

        let coordinator = ExportCoordinator::new(service);
        let snap = snapshot(engine().tree(), engine().extensions(), "demo");
        let err = coordinator
            .export_inline(&snap, &SessionToken::from("s"))
            .await
            .unwrap_err();
        assert_eq!(err.reason, "repo not found or no files selected");
        assert!(!coordinator.is_busy(ExportMode::Inline));
    }

    #[test]
    fn save_download_creates_directory() {
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().join("exports");
        let download = DownloadExport {
            bytes: b"hello".to_vec(),
            filename: "demo_export.md".into(),
        };
        let path = save_download(&download, &dir).unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "hello");
    }
}
