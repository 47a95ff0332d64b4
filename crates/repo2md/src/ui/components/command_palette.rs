//! Command palette: a one-line prompt for actions that take an argument.

use std::path::PathBuf;

use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use thiserror::Error;

use crate::app::export::ExportMode;

pub const HELP: &str =
    "analyze <url|zip> · export [inline|download] [dir] · copy · all on|off · help · quit";

/// Parsed palette command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaletteCommand {
    Analyze(String),
    Export {
        mode: Option<ExportMode>,
        dir: Option<PathBuf>,
    },
    Copy,
    SelectAll(bool),
    Help,
    Quit,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PaletteError {
    #[error("analyze needs a repository URL or .zip path")]
    MissingSource,
    #[error("expected 'all on' or 'all off'")]
    BadSelectAll,
    #[error("unknown command '{0}'; try help")]
    Unknown(String),
}

impl PaletteCommand {
    /// Parse palette input. Blank input yields `None`.
    pub fn parse(input: &str) -> Option<Result<Self, PaletteError>> {
        let input = input.trim();
        if input.is_empty() {
            return None;
        }
        let (verb, rest) = match input.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (input, ""),
        };
        let command = match verb {
            "analyze" | "a" => {
                if rest.is_empty() {
                    Err(PaletteError::MissingSource)
                } else {
                    Ok(PaletteCommand::Analyze(rest.to_string()))
                }
            }
            "export" | "e" => {
                let mut words = rest.split_whitespace();
                let first = words.next();
                match first.map(str::parse::<ExportMode>) {
                    Some(Ok(mode)) => Ok(PaletteCommand::Export {
                        mode: Some(mode),
                        dir: words.next().map(PathBuf::from),
                    }),
                    Some(Err(_)) => Ok(PaletteCommand::Export {
                        mode: Some(ExportMode::Download),
                        dir: first.map(PathBuf::from),
                    }),
                    None => Ok(PaletteCommand::Export {
                        mode: None,
                        dir: None,
                    }),
                }
            }
            "copy" | "y" => Ok(PaletteCommand::Copy),
            "all" => match rest {
                "on" | "" => Ok(PaletteCommand::SelectAll(true)),
                "off" | "none" => Ok(PaletteCommand::SelectAll(false)),
                _ => Err(PaletteError::BadSelectAll),
            },
            "help" | "?" => Ok(PaletteCommand::Help),
            "quit" | "q" => Ok(PaletteCommand::Quit),
            other => Err(PaletteError::Unknown(other.to_string())),
        };
        Some(command)
    }
}

#[derive(Debug, Default, Clone)]
pub struct CommandPaletteState {
    visible: bool,
    input: String,
}

impl CommandPaletteState {
    pub fn open(&mut self) {
        self.visible = true;
        self.input.clear();
    }

    pub fn close(&mut self) {
        self.visible = false;
    }

    pub fn is_open(&self) -> bool {
        self.visible
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    /// Close the palette and hand back what was typed.
    pub fn submit(&mut self) -> String {
        self.visible = false;
        std::mem::take(&mut self.input)
    }

    pub fn push_char(&mut self, ch: char) {
        self.input.push(ch);
    }

    pub fn pop_char(&mut self) {
        self.input.pop();
    }
}

#[derive(Debug, Default)]
pub struct CommandPalette;

impl CommandPalette {
    pub fn render(&self, frame: &mut Frame<'_>, area: Rect, state: &CommandPaletteState) {
        if !state.is_open() {
            return;
        }

        let width = area.width.saturating_sub(10).min(90);
        let popup = Rect {
            x: area.x + (area.width - width) / 2,
            y: area.y + area.height.saturating_sub(5),
            width,
            height: 4.min(area.height),
        };
        frame.render_widget(Clear, popup);

        let block = Block::default()
            .title("Command")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan));
        let lines = vec![
            Line::from(vec![
                Span::styled(":", Style::default().fg(Color::Cyan)),
                Span::raw(state.input().to_string()),
            ]),
            Line::styled(HELP, Style::default().fg(Color::DarkGray)),
        ];
        frame.render_widget(Paragraph::new(lines).block(block), popup);
    }
}
