//! Selection summary pane.

use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use time::macros::format_description;

use crate::app::session::ActiveAnalysis;

/// Counts shown in the summary pane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionSummary {
    pub repo_name: String,
    pub analyzed_at: String,
    pub files_checked: usize,
    pub files_total: usize,
    pub extensions_checked: usize,
    pub extensions_total: usize,
    pub dirs_checked: usize,
    pub select_all: bool,
}

impl SelectionSummary {
    pub fn from_analysis(active: &ActiveAnalysis) -> Self {
        let tree = active.engine.tree();
        let extensions = active.engine.extensions();
        let analyzed_at = active
            .analyzed_at
            .format(format_description!("[hour]:[minute]:[second] UTC"))
            .unwrap_or_default();
        Self {
            repo_name: active.repo_name.clone(),
            analyzed_at,
            files_checked: tree.checked_file_count(),
            files_total: tree.files().count(),
            extensions_checked: extensions.checked().len(),
            extensions_total: extensions.len(),
            dirs_checked: tree.checked_dirs().len(),
            select_all: active.engine.select_all(),
        }
    }
}

#[derive(Debug, Default)]
pub struct Summary;

impl Summary {
    pub fn render(&self, frame: &mut Frame<'_>, area: Rect, summary: Option<&SelectionSummary>) {
        let block = Block::default().title("Selection").borders(Borders::ALL);
        let Some(summary) = summary else {
            let placeholder = Paragraph::new("Nothing analyzed yet")
                .style(Style::default().fg(Color::DarkGray))
                .block(block);
            frame.render_widget(placeholder, area);
            return;
        };

        let files_color = if summary.files_checked == 0 {
            Color::Yellow
        } else {
            Color::Green
        };
        let lines = vec![
            field("Repository", Span::styled(summary.repo_name.clone(), Style::default().fg(Color::Cyan))),
            field("Analyzed", Span::raw(summary.analyzed_at.clone())),
            field(
                "Files",
                Span::styled(
                    format!("{} / {}", summary.files_checked, summary.files_total),
                    Style::default().fg(files_color),
                ),
            ),
            field(
                "Extensions",
                Span::raw(format!(
                    "{} / {}",
                    summary.extensions_checked, summary.extensions_total
                )),
            ),
            field("Directories", Span::raw(summary.dirs_checked.to_string())),
            field(
                "Select all",
                Span::raw(if summary.select_all { "on" } else { "off" }),
            ),
        ];
        frame.render_widget(
            Paragraph::new(lines).block(block).wrap(Wrap { trim: true }),
            area,
        );
    }
}

fn field(label: &'static str, value: Span<'static>) -> Line<'static> {
    Line::from(vec![
        Span::styled(label, Style::default().fg(Color::Gray)),
        Span::raw(": "),
        value,
    ])
}
