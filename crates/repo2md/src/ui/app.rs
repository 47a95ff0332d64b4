//! Application loop for the TUI.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::{Frame, Terminal};
use tokio::runtime::Runtime;
use tokio::task::{JoinError, JoinHandle};

use crate::app::analysis::{AnalysisError, Analyzer, RepoSource};
use crate::app::export::{
    ExportCoordinator, ExportMode, ExportOptions, already_running, save_download,
};
use crate::app::session::{ActiveAnalysis, SessionContext, SessionToken};
use crate::domain::errors::ExportError;
use crate::domain::model::{AnalysisResult, InlineExport};
use crate::infra::backend::{HttpBackend, liveness_url};
use crate::infra::clipboard::PreviewClipboard;
use crate::infra::config::{Config, Keybindings};
use crate::infra::liveness::{Heartbeat, WebSocketTransport};
use crate::ui::components::command_palette::{
    CommandPalette, CommandPaletteState, HELP, PaletteCommand,
};
use crate::ui::components::extensions::{ExtensionList, ExtensionListState, ExtensionRow};
use crate::ui::components::file_tree::{FileTree, FileTreeState};
use crate::ui::components::preview::{Preview, PreviewState};
use crate::ui::components::summary::{SelectionSummary, Summary};

const TICK_RATE: Duration = Duration::from_millis(120);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Key codes resolved from the configured keybindings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyMap {
    pub up: KeyCode,
    pub down: KeyCode,
    pub toggle: KeyCode,
    pub select_all: KeyCode,
    pub preview: KeyCode,
    pub download: KeyCode,
    pub switch_pane: KeyCode,
}

impl KeyMap {
    /// Unparseable bindings fall back to the built-in key for that action.
    pub fn from_config(bindings: &Keybindings) -> Self {
        let defaults = Keybindings::default();
        let resolve = |configured: &str, default: &str| {
            parse_key(configured).unwrap_or_else(|| {
                tracing::warn!(binding = configured, "unrecognized keybinding; using default");
                parse_key(default).unwrap_or(KeyCode::Null)
            })
        };
        Self {
            up: resolve(&bindings.up, &defaults.up),
            down: resolve(&bindings.down, &defaults.down),
            toggle: resolve(&bindings.toggle, &defaults.toggle),
            select_all: resolve(&bindings.select_all, &defaults.select_all),
            preview: resolve(&bindings.preview, &defaults.preview),
            download: resolve(&bindings.download, &defaults.download),
            switch_pane: resolve(&bindings.switch_pane, &defaults.switch_pane),
        }
    }
}

/// Parse a keybinding such as `j`, `space`, `tab`, or `enter`.
pub fn parse_key(binding: &str) -> Option<KeyCode> {
    let binding = binding.trim();
    let mut chars = binding.chars();
    if let (Some(ch), None) = (chars.next(), chars.next()) {
        return Some(KeyCode::Char(ch));
    }
    match binding.to_ascii_lowercase().as_str() {
        "space" => Some(KeyCode::Char(' ')),
        "tab" => Some(KeyCode::Tab),
        "enter" | "return" => Some(KeyCode::Enter),
        "up" => Some(KeyCode::Up),
        "down" => Some(KeyCode::Down),
        "left" => Some(KeyCode::Left),
        "right" => Some(KeyCode::Right),
        _ => None,
    }
}

/// Liveness channel address. The channel lives on the origin, not on the discovered API host.
pub fn heartbeat_url(config: &Config, session: &SessionToken) -> String {
    liveness_url(&config.backend.origin, session)
}

/// Take the output of a background request once it has finished. Pending tasks stay in `slot`.
fn take_finished<T>(
    runtime: &Runtime,
    slot: &mut Option<JoinHandle<T>>,
) -> Option<Result<T, JoinError>> {
    if !slot.as_ref().is_some_and(JoinHandle::is_finished) {
        return None;
    }
    let handle = slot.take()?;
    Some(runtime.block_on(handle))
}

type AnalysisTask = JoinHandle<Result<AnalysisResult, AnalysisError>>;
type InlineTask = JoinHandle<Result<(String, InlineExport), ExportError>>;
type DownloadTask = JoinHandle<Result<PathBuf>>;

/// Primary entry point for running the interactive TUI.
pub struct UiApp {
    runtime: Runtime,
    config: Config,
    keys: KeyMap,
    options: ExportOptions,
    session: SessionContext,
    analyzer: Arc<Analyzer<HttpBackend>>,
    exporter: Arc<ExportCoordinator<HttpBackend>>,
    analysis_task: Option<AnalysisTask>,
    inline_task: Option<InlineTask>,
    download_task: Option<DownloadTask>,
    heartbeat: Option<Heartbeat>,
    clipboard: PreviewClipboard,
    tree: FileTreeState,
    extensions: ExtensionListState,
    preview: PreviewState,
    palette: CommandPaletteState,
    status: Option<StatusMessage>,
    focus: FocusTarget,
    should_quit: bool,
}

impl UiApp {
    /// Resolve the backend and prepare a session. Nothing is drawn yet.
    pub fn new(config: Config, token: Option<SessionToken>) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("failed to start async runtime")?;
        let backend = runtime
            .block_on(HttpBackend::from_config(&config))
            .context("failed to create HTTP client")?;
        let session = SessionContext::with_token(token.unwrap_or_default());

        Ok(Self {
            keys: KeyMap::from_config(&config.keybindings),
            options: ExportOptions::from_config(&config),
            analyzer: Arc::new(Analyzer::new(backend.clone())),
            exporter: Arc::new(ExportCoordinator::new(backend)),
            analysis_task: None,
            inline_task: None,
            download_task: None,
            runtime,
            config,
            session,
            heartbeat: None,
            clipboard: PreviewClipboard::new(),
            tree: FileTreeState::default(),
            extensions: ExtensionListState::default(),
            preview: PreviewState::default(),
            palette: CommandPaletteState::default(),
            status: None,
            focus: FocusTarget::Tree,
            should_quit: false,
        })
    }

    /// Launch the terminal UI, optionally analyzing `source` first.
    pub fn run(&mut self, source: Option<String>) -> Result<()> {
        self.start_heartbeat();
        if let Some(source) = source {
            self.start_analysis(&source);
        }

        enable_raw_mode().context("failed to enable raw mode")?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;

        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).context("failed to initialize terminal")?;
        terminal.hide_cursor().ok();

        let result = self.event_loop(&mut terminal);
        self.abort_background();

        disable_raw_mode().ok();
        let _ = execute!(terminal.backend_mut(), LeaveAlternateScreen);
        let _ = terminal.show_cursor();

        if let Some(heartbeat) = self.heartbeat.take() {
            self.runtime.block_on(heartbeat.disconnect());
        }
        result
    }

    fn start_heartbeat(&mut self) {
        if !self.config.heartbeat.enabled {
            return;
        }
        let url = heartbeat_url(&self.config, self.session.token());
        let connected = self.runtime.block_on(async {
            tokio::time::timeout(CONNECT_TIMEOUT, WebSocketTransport::connect(&url)).await
        });
        match connected {
            Ok(Ok(transport)) => {
                self.heartbeat = Some(Heartbeat::start(
                    self.runtime.handle(),
                    transport,
                    self.config.heartbeat.interval(),
                ));
            }
            Ok(Err(err)) => {
                tracing::warn!(%url, error = %err, "liveness channel unavailable");
            }
            Err(_) => {
                tracing::warn!(%url, "liveness channel connect timed out");
            }
        }
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
        loop {
            terminal.draw(|frame| self.render(frame))?;
            self.tick();

            if self.should_quit {
                break;
            }

            if event::poll(TICK_RATE)? {
                if let Event::Key(key) = event::read()?
                    && key.kind != KeyEventKind::Release
                {
                    self.handle_key(key);
                }
            }
        }
        Ok(())
    }

    fn render(&self, frame: &mut Frame<'_>) {
        let size = frame.size();
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(3), Constraint::Length(2)])
            .split(size);
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(40), Constraint::Length(32)])
            .split(rows[0]);
        let side = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(6), Constraint::Length(8)])
            .split(columns[1]);

        let active = self.session.active();
        FileTree.render(
            frame,
            columns[0],
            active.map(|active| (active.repo_name.as_str(), active.engine.tree())),
            &self.tree,
            self.focus == FocusTarget::Tree,
        );
        ExtensionList.render(
            frame,
            side[0],
            active.map(|active| (active.engine.extensions(), active.engine.select_all())),
            &self.extensions,
            self.focus == FocusTarget::Extensions,
        );
        let summary = active.map(SelectionSummary::from_analysis);
        Summary.render(frame, side[1], summary.as_ref());

        self.render_status(frame, rows[1]);
        Preview.render(&self.preview, size, frame.buffer_mut());
        CommandPalette.render(frame, size, &self.palette);
    }

    fn render_status(&self, frame: &mut Frame<'_>, area: Rect) {
        let block = Block::default().borders(Borders::TOP);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let line = match &self.status {
            Some(status) => {
                let color = match status.level {
                    StatusLevel::Info => Color::Gray,
                    StatusLevel::Success => Color::Green,
                    StatusLevel::Error => Color::Red,
                };
                Line::styled(status.text.clone(), Style::default().fg(color))
            }
            None => Line::from(vec![
                Span::styled("space", Style::default().fg(Color::Cyan)),
                Span::raw(" toggle · "),
                Span::styled("tab", Style::default().fg(Color::Cyan)),
                Span::raw(" pane · "),
                Span::styled("p", Style::default().fg(Color::Cyan)),
                Span::raw(" preview · "),
                Span::styled("d", Style::default().fg(Color::Cyan)),
                Span::raw(" download · "),
                Span::styled(":", Style::default().fg(Color::Cyan)),
                Span::raw(" commands · "),
                Span::styled("q", Style::default().fg(Color::Cyan)),
                Span::raw(" quit"),
            ])
            .style(Style::default().fg(Color::DarkGray)),
        };
        frame.render_widget(Paragraph::new(line), inner);
    }

    fn tick(&mut self) {
        if let Some(status) = &self.status
            && status.is_expired()
            && !self.is_waiting()
        {
            self.status = None;
        }
        if let Some(result) = take_finished(&self.runtime, &mut self.analysis_task) {
            self.finish_analysis(result);
        }
        if let Some(result) = take_finished(&self.runtime, &mut self.inline_task) {
            self.finish_inline(result);
        }
        if let Some(result) = take_finished(&self.runtime, &mut self.download_task) {
            self.finish_download(result);
        }
    }

    fn is_waiting(&self) -> bool {
        self.analysis_task.is_some() || self.inline_task.is_some() || self.download_task.is_some()
    }

    fn abort_background(&mut self) {
        if let Some(task) = self.analysis_task.take() {
            task.abort();
        }
        if let Some(task) = self.inline_task.take() {
            task.abort();
        }
        if let Some(task) = self.download_task.take() {
            task.abort();
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }
        if self.palette.is_open() {
            self.handle_palette_key(key);
        } else if self.preview.is_open() {
            self.handle_preview_key(key);
        } else {
            self.handle_pane_key(key);
        }
    }

    fn handle_palette_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => self.palette.close(),
            KeyCode::Enter => {
                let input = self.palette.submit();
                match PaletteCommand::parse(&input) {
                    Some(Ok(command)) => self.execute(command),
                    Some(Err(err)) => self.set_status(StatusLevel::Error, err.to_string()),
                    None => {}
                }
            }
            KeyCode::Backspace => self.palette.pop_char(),
            KeyCode::Char(ch)
                if !key
                    .modifiers
                    .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) =>
            {
                self.palette.push_char(ch)
            }
            _ => {}
        }
    }

    fn handle_preview_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => self.preview.close(),
            KeyCode::Char('y') => self.copy_preview(),
            KeyCode::PageDown => self.preview.scroll_by(10),
            KeyCode::PageUp => self.preview.scroll_by(-10),
            code if code == self.keys.down || code == KeyCode::Down => self.preview.scroll_by(1),
            code if code == self.keys.up || code == KeyCode::Up => self.preview.scroll_by(-1),
            code if code == self.keys.download => self.start_export(ExportMode::Download, None),
            _ => {}
        }
    }

    fn handle_pane_key(&mut self, key: KeyEvent) {
        let keys = self.keys.clone();
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Char(':') => self.palette.open(),
            code if code == keys.switch_pane => {
                self.focus = match self.focus {
                    FocusTarget::Tree => FocusTarget::Extensions,
                    FocusTarget::Extensions => FocusTarget::Tree,
                };
            }
            code if code == keys.select_all => self.flip_select_all(),
            code if code == keys.preview => self.start_export(ExportMode::Inline, None),
            code if code == keys.download => self.start_export(ExportMode::Download, None),
            code if code == keys.up || code == KeyCode::Up => self.move_cursor(false),
            code if code == keys.down || code == KeyCode::Down => self.move_cursor(true),
            code if code == keys.toggle => self.toggle_under_cursor(),
            KeyCode::Char('h') | KeyCode::Left if self.focus == FocusTarget::Tree => {
                if let Some(active) = self.session.active() {
                    self.tree.collapse_or_parent(active.engine.tree());
                }
            }
            KeyCode::Char('l') | KeyCode::Right if self.focus == FocusTarget::Tree => {
                if let Some(active) = self.session.active() {
                    self.tree.expand(active.engine.tree());
                }
            }
            _ => {}
        }
    }

    fn move_cursor(&mut self, down: bool) {
        let Some(active) = self.session.active() else {
            return;
        };
        match (self.focus, down) {
            (FocusTarget::Tree, true) => self.tree.select_next(),
            (FocusTarget::Tree, false) => self.tree.select_previous(),
            (FocusTarget::Extensions, true) => {
                self.extensions.select_next(active.engine.extensions())
            }
            (FocusTarget::Extensions, false) => self.extensions.select_previous(),
        }
    }

    fn toggle_under_cursor(&mut self) {
        let Some(active) = self.session.active_mut() else {
            return;
        };
        let outcome = match self.focus {
            FocusTarget::Tree => {
                let Some(path) = self
                    .tree
                    .selected_path(active.engine.tree())
                    .map(str::to_owned)
                else {
                    return;
                };
                active.engine.flip_node(&path)
            }
            FocusTarget::Extensions => {
                let row = self
                    .extensions
                    .selected_row(active.engine.extensions())
                    .map(|row| match row {
                        ExtensionRow::SelectAll => None,
                        ExtensionRow::Extension(extension) => Some(extension.to_owned()),
                    });
                match row {
                    Some(None) => {
                        let value = !active.engine.select_all();
                        Ok(active.engine.toggle_all(value))
                    }
                    Some(Some(extension)) => active.engine.flip_extension(&extension),
                    None => return,
                }
            }
        };
        if let Err(err) = outcome {
            self.set_status(StatusLevel::Error, err.to_string());
        }
    }

    fn flip_select_all(&mut self) {
        if let Some(active) = self.session.active_mut() {
            let value = !active.engine.select_all();
            active.engine.toggle_all(value);
        }
    }

    fn execute(&mut self, command: PaletteCommand) {
        match command {
            PaletteCommand::Analyze(source) => self.start_analysis(&source),
            PaletteCommand::Export { mode, dir } => {
                self.start_export(mode.unwrap_or(self.options.mode), dir)
            }
            PaletteCommand::Copy => self.copy_preview(),
            PaletteCommand::SelectAll(value) => {
                if let Some(active) = self.session.active_mut() {
                    active.engine.toggle_all(value);
                }
            }
            PaletteCommand::Help => self.set_status(StatusLevel::Info, HELP),
            PaletteCommand::Quit => self.should_quit = true,
        }
    }

    fn start_analysis(&mut self, input: &str) {
        if self.analysis_task.is_some() || self.analyzer.is_busy() {
            self.set_status(StatusLevel::Error, AnalysisError::Busy.to_string());
            return;
        }
        let source = RepoSource::parse(input);
        self.set_status(StatusLevel::Info, format!("Analyzing {source}…"));

        let analyzer = Arc::clone(&self.analyzer);
        let token = self.session.token().clone();
        self.analysis_task = Some(
            self.runtime
                .spawn(async move { analyzer.fetch(&source, &token).await }),
        );
    }

    fn finish_analysis(&mut self, result: Result<Result<AnalysisResult, AnalysisError>, JoinError>) {
        let result = match result {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => return self.set_status(StatusLevel::Error, err.to_string()),
            Err(err) => return self.set_status(StatusLevel::Error, err.to_string()),
        };
        if let Err(err) = self.session.install(result) {
            return self.set_status(StatusLevel::Error, err.to_string());
        }
        let Some(active) = self.session.active() else {
            return;
        };
        self.tree.reset(active.engine.tree());
        let repo_name = active.repo_name.clone();
        let files = active.engine.tree().files().count();
        self.extensions.reset();
        self.set_status(
            StatusLevel::Success,
            format!("Analyzed {repo_name} · {files} files"),
        );
        self.preview.close();
        self.focus = FocusTarget::Tree;
    }

    fn start_export(&mut self, mode: ExportMode, dir: Option<PathBuf>) {
        if self.session.active().is_none() {
            self.set_status(StatusLevel::Error, "Analyze a repository first");
            return;
        }
        let in_flight = match mode {
            ExportMode::Inline => self.inline_task.is_some(),
            ExportMode::Download => self.download_task.is_some(),
        };
        if in_flight || self.exporter.is_busy(mode) {
            self.set_status(StatusLevel::Error, already_running(mode).to_string());
            return;
        }
        let Some(snapshot) = self.session.active().map(ActiveAnalysis::snapshot) else {
            return;
        };
        let token = self.session.token().clone();
        let exporter = Arc::clone(&self.exporter);

        match mode {
            ExportMode::Inline => {
                self.set_status(StatusLevel::Info, "Generating preview…");
                let repo_name = snapshot.repo_name.clone();
                self.inline_task = Some(self.runtime.spawn(async move {
                    exporter
                        .export_inline(&snapshot, &token)
                        .await
                        .map(|export| (repo_name, export))
                }));
            }
            ExportMode::Download => {
                self.set_status(StatusLevel::Info, "Generating download…");
                let dir = dir.unwrap_or_else(|| self.options.output_dir.clone());
                self.download_task = Some(self.runtime.spawn(async move {
                    match exporter.export_download(&snapshot, &token).await {
                        Ok(download) => save_download(&download, &dir),
                        Err(err) => Err(err.into()),
                    }
                }));
            }
        }
    }

    fn finish_inline(
        &mut self,
        result: Result<Result<(String, InlineExport), ExportError>, JoinError>,
    ) {
        match result {
            Ok(Ok((repo_name, export))) => {
                self.preview.show(&repo_name, export);
                self.status = None;
                if self.options.copy_to_clipboard {
                    self.copy_preview();
                }
            }
            Ok(Err(err)) => self.set_status(StatusLevel::Error, err.to_string()),
            Err(err) => self.set_status(StatusLevel::Error, err.to_string()),
        }
    }

    fn finish_download(&mut self, result: Result<Result<PathBuf>, JoinError>) {
        match result {
            Ok(Ok(path)) => {
                self.set_status(StatusLevel::Success, format!("Saved {}", path.display()))
            }
            Ok(Err(err)) => self.set_status(StatusLevel::Error, format!("{err:#}")),
            Err(err) => self.set_status(StatusLevel::Error, err.to_string()),
        }
    }

    fn copy_preview(&mut self) {
        let Some(content) = self.preview.content() else {
            self.set_status(StatusLevel::Error, "Open a preview first");
            return;
        };
        match self.clipboard.copy_preview(content) {
            Ok(via) => self.set_status(StatusLevel::Success, format!("Copied via {via}")),
            Err(err) => self.set_status(StatusLevel::Error, err.to_string()),
        }
    }

    fn set_status<S: Into<String>>(&mut self, level: StatusLevel, message: S) {
        self.status = Some(StatusMessage::new(level, message.into()));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FocusTarget {
    Tree,
    Extensions,
}

#[derive(Debug)]
struct StatusMessage {
    level: StatusLevel,
    text: String,
    expires_at: Instant,
}

impl StatusMessage {
    fn new(level: StatusLevel, text: String) -> Self {
        Self {
            level,
            text,
            expires_at: Instant::now() + Duration::from_secs(6),
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

#[derive(Debug, Clone, Copy)]
enum StatusLevel {
    Info,
    Success,
    Error,
}
