use std::fs;
use std::sync::Mutex;

use async_trait::async_trait;
use repo2md::app::export::{ExportCoordinator, save_download, snapshot};
use repo2md::app::session::SessionToken;
use repo2md::app::sync::SyncEngine;
use repo2md::domain::model::{ExportRequest, InlineExport, TreeNode};
use repo2md::infra::backend::{DownloadBody, ExportService, ServiceError, ServiceResult};

/// Records requests and renders a tiny markdown document from them.
#[derive(Default)]
struct RecordingService {
    requests: Mutex<Vec<(ExportRequest, String)>>,
    reject: bool,
}

impl RecordingService {
    fn render(request: &ExportRequest) -> String {
        format!(
            "# {}\nexts: {}\ndirs: {}\n",
            request.repo_name,
            request.exts.join(","),
            request.dirs.join(",")
        )
    }

    fn record(&self, request: &ExportRequest, session: &SessionToken) -> ServiceResult<()> {
        self.requests
            .lock()
            .unwrap()
            .push((request.clone(), session.to_string()));
        if self.reject {
            return Err(ServiceError::Rejected {
                status: 404,
                detail: "Repository not found".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ExportService for RecordingService {
    async fn export_inline(
        &self,
        request: &ExportRequest,
        session: &SessionToken,
    ) -> ServiceResult<InlineExport> {
        self.record(request, session)?;
        Ok(InlineExport {
            content: Self::render(request),
            export_file: Some(format!("{}_export.md", request.repo_name)),
        })
    }

    async fn export_download(
        &self,
        request: &ExportRequest,
        session: &SessionToken,
    ) -> ServiceResult<DownloadBody> {
        self.record(request, session)?;
        Ok(DownloadBody {
            bytes: Self::render(request).into_bytes(),
            suggested_name: Some(format!("{} export.md", request.repo_name)),
        })
    }
}

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

#[tokio::test]
async fn inline_export_sends_current_selection() {
    let mut engine = engine();
    engine.toggle_node("/b.js", false).unwrap();
    let snap = snapshot(engine.tree(), engine.extensions(), "demo");

    let coordinator = ExportCoordinator::new(RecordingService::default());
    let token = SessionToken::from("session-1");
    let export = coordinator.export_inline(&snap, &token).await.unwrap();

    assert_eq!(export.content, "# demo\nexts: .go\ndirs: /,/sub\n");
    assert_eq!(export.export_file.as_deref(), Some("demo_export.md"));
}

#[tokio::test]
async fn empty_selection_is_not_an_error() {
    let mut engine = engine();
    engine.toggle_all(false);
    let snap = snapshot(engine.tree(), engine.extensions(), "demo");

    let coordinator = ExportCoordinator::new(RecordingService::default());
    let export = coordinator
        .export_inline(&snap, &SessionToken::from("s"))
        .await
        .unwrap();
    assert_eq!(export.content, "# demo\nexts: \ndirs: \n");
}

#[tokio::test]
async fn export_does_not_mutate_selection() {
    let engine = engine();
    let before = engine.tree().outline();
    let snap = snapshot(engine.tree(), engine.extensions(), "demo");

    let service = RecordingService {
        reject: true,
        ..RecordingService::default()
    };
    let coordinator = ExportCoordinator::new(service);
    let err = coordinator
        .export_inline(&snap, &SessionToken::from("s"))
        .await
        .unwrap_err();

    assert_eq!(err.reason, "Repository not found");
    assert_eq!(engine.tree().outline(), before);
    assert!(engine.select_all());
}

#[tokio::test]
async fn download_is_sanitized_and_saved() {
    let snap = snapshot(engine().tree(), engine().extensions(), "demo");
    let coordinator = ExportCoordinator::new(RecordingService::default());
    let download = coordinator
        .export_download(&snap, &SessionToken::from("s"))
        .await
        .unwrap();
    assert_eq!(download.filename, "demo_export.md");

    let temp = tempfile::tempdir().unwrap();
    let path = save_download(&download, &temp.path().join("out")).unwrap();
    assert_eq!(path, temp.path().join("out/demo_export.md"));
    assert!(fs::read_to_string(path).unwrap().starts_with("# demo"));
}
