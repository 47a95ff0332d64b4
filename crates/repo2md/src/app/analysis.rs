//! Running repository analyses and installing their results into the session.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::app::session::{Flight, SessionContext, SessionToken};
use crate::domain::errors::DomainError;
use crate::domain::model::AnalysisResult;
use crate::infra::backend::{AnalysisService, ServiceError};

/// Where the repository to analyze comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoSource {
    Url(String),
    Archive(PathBuf),
}

impl RepoSource {
    /// Interpret user input: an existing `.zip` file is an archive, anything else a URL.
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        let path = Path::new(trimmed);
        let is_zip = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("zip"))
            .unwrap_or(false);
        if is_zip && path.is_file() {
            RepoSource::Archive(path.to_path_buf())
        } else {
            RepoSource::Url(trimmed.to_string())
        }
    }

    fn validate(&self) -> Result<(), AnalysisError> {
        match self {
            RepoSource::Url(url) if url.trim().is_empty() => Err(AnalysisError::InvalidSource(
                "repository URL is empty".into(),
            )),
            RepoSource::Url(_) => Ok(()),
            RepoSource::Archive(path) => {
                let metadata = fs::metadata(path).map_err(|_| {
                    AnalysisError::InvalidSource(format!("archive not found: {}", path.display()))
                })?;
                if metadata.len() == 0 {
                    return Err(AnalysisError::InvalidSource(format!(
                        "archive is empty: {}",
                        path.display()
                    )));
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for RepoSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepoSource::Url(url) => f.write_str(url),
            RepoSource::Archive(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Why an analysis attempt produced no new selection.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("{0}")]
    InvalidSource(String),
    #[error("{}", .0.user_message())]
    Service(#[from] ServiceError),
    #[error(transparent)]
    Malformed(#[from] DomainError),
    #[error("an analysis is already running")]
    Busy,
}

/// Sends sources to the analysis service, one at a time.
pub struct Analyzer<S> {
    service: S,
    flight: Flight,
}

impl<S: AnalysisService> Analyzer<S> {
    pub fn new(service: S) -> Self {
        Self {
            service,
            flight: Flight::default(),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.flight.is_busy()
    }

    /// Analyze `source` and install the result. Returns the repository name.
    ///
    /// The session keeps its previous analysis when the service fails or the tree is
    /// malformed.
    pub async fn analyze(
        &self,
        source: &RepoSource,
        session: &mut SessionContext,
    ) -> Result<String, AnalysisError> {
        let result = self.fetch(source, session.token()).await?;
        let active = session.install(result)?;
        Ok(active.repo_name.clone())
    }

    /// Ask the service for the tree of `source` without touching any session state.
    ///
    /// Fails with [`AnalysisError::Busy`] while another fetch is in flight.
    pub async fn fetch(
        &self,
        source: &RepoSource,
        session: &SessionToken,
    ) -> Result<AnalysisResult, AnalysisError> {
        let _guard = self.flight.try_begin().ok_or(AnalysisError::Busy)?;
        source.validate()?;

        let result = match source {
            RepoSource::Url(url) => self.service.analyze_url(url.trim(), session).await,
            RepoSource::Archive(path) => self.service.analyze_archive(path, session).await,
        }
        .inspect_err(|err| tracing::warn!(%source, error = %err, "analysis failed"))?;
        Ok(result)
    }
}
