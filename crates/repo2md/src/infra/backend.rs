//! HTTP client for the analysis, export, and configuration services.
//!
//! Every analysis and export request is tagged with the session token in `X-Session-Id` so the
//! backend can scope temporary clones per session.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use thiserror::Error;

use crate::app::session::SessionToken;
use crate::domain::model::{AnalysisResult, ExportRequest, InlineExport};
use crate::infra::config::Config;

#[cfg(test)]
use mockall::automock;

pub const SESSION_HEADER: &str = "X-Session-Id";
pub const FALLBACK_API_URL: &str = "http://127.0.0.1:8000";

static CONTENT_DISPOSITION_FILENAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"filename="?([^"]+)"?"#).expect("content-disposition pattern is valid")
});

/// Failure talking to a collaborator service.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{detail}")]
    Rejected { status: u16, detail: String },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error("failed to read archive {path}: {source}")]
    Archive {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl ServiceError {
    /// Message suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            ServiceError::Rejected { detail, .. } => detail.clone(),
            other => other.to_string(),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Raw download body plus the filename suggested by the service, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadBody {
    pub bytes: Vec<u8>,
    pub suggested_name: Option<String>,
}

/// Analyzes a repository into a tree and extension list.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AnalysisService: Send + Sync {
    async fn analyze_url(
        &self,
        repo_url: &str,
        session: &SessionToken,
    ) -> ServiceResult<AnalysisResult>;

    async fn analyze_archive(
        &self,
        archive: &Path,
        session: &SessionToken,
    ) -> ServiceResult<AnalysisResult>;
}

/// Renders a selection as text or as a downloadable file.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ExportService: Send + Sync {
    async fn export_inline(
        &self,
        request: &ExportRequest,
        session: &SessionToken,
    ) -> ServiceResult<InlineExport>;

    async fn export_download(
        &self,
        request: &ExportRequest,
        session: &SessionToken,
    ) -> ServiceResult<DownloadBody>;
}

/// Serves the API base URL to clients.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ConfigService: Send + Sync {
    async fn api_base_url(&self) -> ServiceResult<String>;
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: Option<String>,
}

#[derive(Deserialize)]
struct ConfigBody {
    #[serde(rename = "API_URL")]
    api_url: String,
}

#[derive(serde::Serialize)]
struct AnalyzeBody<'a> {
    repo_url: &'a str,
}

/// reqwest-backed implementation of every collaborator.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> ServiceResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: normalize_base(base_url.into()),
        })
    }

    /// Client for the API named by `config`, asking the origin for it when discovery is on.
    pub async fn from_config(config: &Config) -> ServiceResult<Self> {
        let timeout = config.backend.timeout();
        let origin = Self::new(config.backend.origin.as_str(), timeout)?;
        let base_url = config.resolve_api_base_url(&origin).await;
        tracing::debug!(%base_url, "using API base URL");
        Self::new(base_url, timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn post(&self, path: &str, session: &SessionToken) -> RequestBuilder {
        self.client
            .post(self.endpoint(path))
            .header(SESSION_HEADER, session.as_str())
    }
}

fn normalize_base(base: String) -> String {
    base.trim().trim_end_matches('/').to_string()
}

#[async_trait]
impl AnalysisService for HttpBackend {
    async fn analyze_url(
        &self,
        repo_url: &str,
        session: &SessionToken,
    ) -> ServiceResult<AnalysisResult> {
        tracing::info!(repo_url, "requesting analysis");
        let response = self
            .post("analyze", session)
            .json(&AnalyzeBody { repo_url })
            .send()
            .await?;
        let response = ensure_success(response, "analysis failed").await?;
        response
            .json::<AnalysisResult>()
            .await
            .map_err(|err| ServiceError::Decode(err.to_string()))
    }

    async fn analyze_archive(
        &self,
        archive: &Path,
        session: &SessionToken,
    ) -> ServiceResult<AnalysisResult> {
        let bytes = tokio::fs::read(archive)
            .await
            .map_err(|source| ServiceError::Archive {
                path: archive.display().to_string(),
                source,
            })?;
        let file_name = archive
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| "upload.zip".into());
        tracing::info!(archive = %archive.display(), size = bytes.len(), "uploading archive");

        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name);
        let form = reqwest::multipart::Form::new().part("file", part);
        let response = self
            .post("analyze/upload", session)
            .multipart(form)
            .send()
            .await?;
        let response = ensure_success(response, "analysis failed").await?;
        response
            .json::<AnalysisResult>()
            .await
            .map_err(|err| ServiceError::Decode(err.to_string()))
    }
}

#[async_trait]
impl ExportService for HttpBackend {
    async fn export_inline(
        &self,
        request: &ExportRequest,
        session: &SessionToken,
    ) -> ServiceResult<InlineExport> {
        let response = self
            .post("export/text", session)
            .json(request)
            .send()
            .await?;
        let response = ensure_success(response, "export failed").await?;
        response
            .json::<InlineExport>()
            .await
            .map_err(|err| ServiceError::Decode(err.to_string()))
    }

    async fn export_download(
        &self,
        request: &ExportRequest,
        session: &SessionToken,
    ) -> ServiceResult<DownloadBody> {
        let response = self
            .post("export/file", session)
            .json(request)
            .send()
            .await?;
        let response = ensure_success(response, "export failed").await?;
        let suggested_name = response
            .headers()
            .get(reqwest::header::CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .and_then(filename_from_disposition);
        let bytes = response.bytes().await?.to_vec();
        Ok(DownloadBody {
            bytes,
            suggested_name,
        })
    }
}

#[async_trait]
impl ConfigService for HttpBackend {
    async fn api_base_url(&self) -> ServiceResult<String> {
        let response = self.client.get(self.endpoint("config")).send().await?;
        let response = ensure_success(response, "config fetch failed").await?;
        let body = response
            .json::<ConfigBody>()
            .await
            .map_err(|err| ServiceError::Decode(err.to_string()))?;
        Ok(body.api_url)
    }
}

async fn ensure_success(response: Response, fallback: &str) -> ServiceResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(rejection(status, &body, fallback))
}

fn rejection(status: StatusCode, body: &str, fallback: &str) -> ServiceError {
    let detail = error_detail(body).unwrap_or_else(|| fallback.to_string());
    tracing::warn!(status = status.as_u16(), %detail, "service rejected request");
    ServiceError::Rejected {
        status: status.as_u16(),
        detail,
    }
}

/// Extract `detail` from an error body of the form `{"detail": "..."}`.
pub fn error_detail(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|parsed| parsed.detail)
        .map(|detail| detail.trim().to_string())
        .filter(|detail| !detail.is_empty())
}

/// Parse the filename out of a `Content-Disposition` header value.
pub fn filename_from_disposition(header: &str) -> Option<String> {
    CONTENT_DISPOSITION_FILENAME
        .captures(header)
        .and_then(|captures| captures.get(1))
        .map(|name| name.as_str().trim().to_string())
        .filter(|name| !name.is_empty())
}

/// Liveness URL for the session: `ws(s)://host/ws/{session}`.
pub fn liveness_url(base_url: &str, session: &SessionToken) -> String {
    let base = base_url.trim().trim_end_matches('/');
    let rest = base
        .strip_prefix("https://")
        .map(|rest| format!("wss://{rest}"))
        .or_else(|| base.strip_prefix("http://").map(|rest| format!("ws://{rest}")))
        .unwrap_or_else(|| format!("ws://{base}"));
    format!("{rest}/ws/{}", session.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_is_read_from_error_body() {
        assert_eq!(
            error_detail(r#"{"detail": "git clone failed"}"#),
            Some("git clone failed".into())
        );
        assert_eq!(error_detail(r#"{"message": "nope"}"#), None);
        assert_eq!(error_detail("<html>502</html>"), None);
        assert_eq!(error_detail(r#"{"detail": "  "}"#), None);
    }

    #[test]
    fn rejection_falls_back_to_generic_message() {
        let err = rejection(StatusCode::BAD_GATEWAY, "", "export failed");
        assert_eq!(err.user_message(), "export failed");
        assert!(matches!(err, ServiceError::Rejected { status: 502, .. }));
    }

    #[test]
    fn filename_parsing_handles_quotes() {
        assert_eq!(
            filename_from_disposition("attachment; filename=demo_export.md"),
            Some("demo_export.md".into())
        );
        assert_eq!(
            filename_from_disposition(r#"attachment; filename="repo export.md""#),
            Some("repo export.md".into())
        );
        assert_eq!(filename_from_disposition("inline"), None);
    }

    #[test]
    fn liveness_url_switches_scheme() {
        let token = SessionToken::from("abc");
        assert_eq!(
            liveness_url("http://127.0.0.1:8000/", &token),
            "ws://127.0.0.1:8000/ws/abc"
        );
        assert_eq!(
            liveness_url("https://repo2md.example", &token),
            "wss://repo2md.example/ws/abc"
        );
    }

    #[test]
    fn endpoints_join_without_double_slash() {
        let backend = HttpBackend::new("http://localhost:8000/", Duration::from_secs(1)).unwrap();
        assert_eq!(backend.base_url(), "http://localhost:8000");
        assert_eq!(backend.endpoint("/export/text"), "http://localhost:8000/export/text");
    }
}
