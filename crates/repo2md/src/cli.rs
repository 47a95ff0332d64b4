//! Command-line entry point.

use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use crate::app::analysis::{Analyzer, RepoSource};
use crate::app::export::{ExportCoordinator, ExportMode, ExportOptions, save_download};
use crate::app::session::{SessionContext, SessionToken};
use crate::app::sync::SyncEngine;
use crate::infra::backend::HttpBackend;
use crate::infra::clipboard::PreviewClipboard;
use crate::infra::config::Config;
use crate::ui::app::UiApp;

/// Pick files from a remote repository by directory and extension and export them as Markdown.
#[derive(Debug, Parser)]
#[command(name = "repo2md", version, about)]
pub struct Cli {
    /// API base URL; skips discovery through the origin's /config.
    #[arg(long, global = true, value_name = "URL")]
    pub api_url: Option<String>,

    /// Reuse an existing session identifier instead of generating one.
    #[arg(long, global = true, value_name = "ID")]
    pub session_id: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Open the interactive selector (default).
    Tui {
        /// Repository URL or .zip archive to analyze on start.
        source: Option<String>,
    },
    /// Analyze a repository and print its tree and extensions.
    Analyze {
        /// Repository URL or .zip archive.
        source: String,
        /// Print a JSON summary instead of the outline.
        #[arg(long)]
        json: bool,
    },
    /// Analyze a repository, narrow the selection, and export it.
    Export(ExportArgs),
    /// Print shell completions.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    /// Repository URL or .zip archive.
    pub source: String,
    /// Keep only files with these extensions (repeatable).
    #[arg(long = "ext", value_name = "EXT")]
    pub only_extensions: Vec<String>,
    /// Drop files with these extensions (repeatable).
    #[arg(long = "exclude-ext", value_name = "EXT")]
    pub exclude_extensions: Vec<String>,
    /// Drop a directory or file and everything below it (repeatable).
    #[arg(long = "exclude-dir", value_name = "PATH")]
    pub exclude_paths: Vec<String>,
    /// Inline prints the text; download saves the Markdown file.
    #[arg(long, value_enum)]
    pub mode: Option<ExportMode>,
    /// Directory for downloaded exports.
    #[arg(long, value_name = "DIR")]
    pub output: Option<PathBuf>,
    /// Copy inline output to the clipboard as well.
    #[arg(long)]
    pub copy: bool,
}

/// Parse arguments and dispatch.
pub fn run() -> Result<()> {
    execute(Cli::parse())
}

pub fn execute(cli: Cli) -> Result<()> {
    let mut config = Config::load()?;
    if let Some(url) = cli.api_url.filter(|url| !url.trim().is_empty()) {
        config.backend.api_base_url = Some(url);
    }
    let token = cli.session_id.map(SessionToken::from);

    match cli.command.unwrap_or(Command::Tui { source: None }) {
        Command::Tui { source } => UiApp::new(config, token)?.run(source),
        Command::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "repo2md", &mut io::stdout());
            Ok(())
        }
        Command::Analyze { source, json } => block_on(analyze(config, token, source, json)),
        Command::Export(args) => block_on(export(config, token, args)),
    }
}

fn block_on<F: std::future::Future<Output = Result<()>>>(future: F) -> Result<()> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?
        .block_on(future)
}

async fn analyze_into(
    config: &Config,
    token: Option<SessionToken>,
    source: &str,
) -> Result<(HttpBackend, SessionContext)> {
    let backend = HttpBackend::from_config(config).await?;
    let mut session = SessionContext::with_token(token.unwrap_or_default());
    Analyzer::new(backend.clone())
        .analyze(&RepoSource::parse(source), &mut session)
        .await?;
    Ok((backend, session))
}

async fn analyze(
    config: Config,
    token: Option<SessionToken>,
    source: String,
    json: bool,
) -> Result<()> {
    let (_, session) = analyze_into(&config, token, &source).await?;
    let active = session.active().context("analysis produced no selection")?;
    let engine = &active.engine;

    if json {
        let summary = serde_json::json!({
            "repo_name": active.repo_name,
            "session_id": session.token().as_str(),
            "extensions": engine.extensions().checked(),
            "dirs": engine.tree().checked_dirs(),
            "files": engine.tree().files().map(|node| node.path.as_str()).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("repo: {}", active.repo_name);
        println!("extensions: {}", engine.extensions().checked().join(", "));
        println!("{}", engine.tree().outline());
    }
    Ok(())
}

async fn export(config: Config, token: Option<SessionToken>, args: ExportArgs) -> Result<()> {
    let mut options = ExportOptions::from_config(&config);
    if let Some(mode) = args.mode {
        options.mode = mode;
    }
    if let Some(dir) = &args.output {
        options.output_dir = dir.clone();
    }
    options.copy_to_clipboard |= args.copy;

    let (backend, mut session) = analyze_into(&config, token, &args.source).await?;
    let token = session.token().clone();
    let active = session
        .active_mut()
        .context("analysis produced no selection")?;
    apply_filters(&mut active.engine, &args)?;
    let snapshot = active.snapshot();

    let coordinator = ExportCoordinator::new(backend);
    match options.mode {
        ExportMode::Inline => {
            let export = coordinator.export_inline(&snapshot, &token).await?;
            println!("{}", export.content);
            if options.copy_to_clipboard {
                let via = PreviewClipboard::new().copy_preview(&export.content)?;
                eprintln!("copied via {via}");
            }
        }
        ExportMode::Download => {
            let download = coordinator.export_download(&snapshot, &token).await?;
            let path = save_download(&download, &options.output_dir)?;
            println!("{}", path.display());
        }
    }
    Ok(())
}

/// Narrow a fresh selection: keep-list first, then exclusions.
pub fn apply_filters(engine: &mut SyncEngine, args: &ExportArgs) -> Result<()> {
    if !args.only_extensions.is_empty() {
        let wanted: Vec<String> = args
            .only_extensions
            .iter()
            .map(|ext| normalize_extension(ext))
            .collect();
        if let Some(missing) = wanted
            .iter()
            .find(|ext| !engine.extensions().contains(ext.as_str()))
        {
            bail!("extension {missing} does not occur in the repository");
        }
        let dropped: Vec<String> = engine
            .extensions()
            .entries()
            .into_iter()
            .map(|entry| entry.extension)
            .filter(|ext| !wanted.contains(ext))
            .collect();
        for ext in &dropped {
            engine.toggle_extension(ext, false)?;
        }
    }
    for ext in &args.exclude_extensions {
        let ext = normalize_extension(ext);
        engine
            .toggle_extension(&ext, false)
            .with_context(|| format!("cannot exclude {ext}"))?;
    }
    for path in &args.exclude_paths {
        engine
            .toggle_node(path, false)
            .with_context(|| format!("cannot exclude {path}"))?;
    }
    Ok(())
}

/// `rs` and `.rs` both name the `.rs` extension.
pub fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim();
    if ext.starts_with('.') {
        ext.to_string()
    } else {
        format!(".{ext}")
    }
}
