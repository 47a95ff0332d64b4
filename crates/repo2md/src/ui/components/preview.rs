//! Overlay showing the text returned by an inline export.

use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};

use crate::domain::model::InlineExport;

#[derive(Debug, Default, Clone)]
pub struct PreviewState {
    export: Option<(String, InlineExport)>,
    scroll: u16,
}

impl PreviewState {
    pub fn show(&mut self, repo_name: &str, export: InlineExport) {
        self.export = Some((repo_name.to_string(), export));
        self.scroll = 0;
    }

    pub fn close(&mut self) {
        self.export = None;
    }

    pub fn is_open(&self) -> bool {
        self.export.is_some()
    }

    pub fn content(&self) -> Option<&str> {
        self.export
            .as_ref()
            .map(|(_, export)| export.content.as_str())
    }

    pub fn scroll_by(&mut self, delta: i32) {
        let lines = self
            .content()
            .map(|content| content.lines().count())
            .unwrap_or(0);
        let max = u16::try_from(lines.saturating_sub(1)).unwrap_or(u16::MAX);
        let next = i32::from(self.scroll).saturating_add(delta).clamp(0, i32::from(max));
        self.scroll = u16::try_from(next).unwrap_or(max);
    }
}

/// Renders the preview as a centered popup.
#[derive(Debug, Default)]
pub struct Preview;

impl Preview {
    pub fn render(&self, state: &PreviewState, area: Rect, buf: &mut Buffer) {
        let Some((repo, export)) = &state.export else {
            return;
        };

        let popup = centered(area, 90, 85);
        Clear.render(popup, buf);

        let mut title = format!("Preview · {repo}");
        if let Some(file) = &export.export_file {
            title.push_str(&format!(" · {file}"));
        }
        let block = Block::default()
            .title(title)
            .title_bottom(Line::from(" esc close · j/k scroll · y copy · d download ").right_aligned())
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan));

        let body = if export.content.is_empty() {
            Text::styled("(empty export)", Style::default().fg(Color::DarkGray))
        } else {
            Text::raw(export.content.as_str())
        };
        Paragraph::new(body)
            .block(block)
            .wrap(Wrap { trim: false })
            .scroll((state.scroll, 0))
            .render(popup, buf);
    }
}

fn centered(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let scale = |length: u16, percent: u16| (u32::from(length) * u32::from(percent) / 100) as u16;
    let width = scale(area.width, percent_x);
    let height = scale(area.height, percent_y);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}
