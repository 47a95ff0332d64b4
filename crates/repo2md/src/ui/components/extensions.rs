//! Extension filter pane. Row zero is the select-all control.

use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState};

use crate::app::extensions::ExtensionSet;

/// What the cursor of the extension pane points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionRow<'a> {
    SelectAll,
    Extension(&'a str),
}

#[derive(Debug, Default, Clone)]
pub struct ExtensionListState {
    selected: usize,
}

impl ExtensionListState {
    pub fn reset(&mut self) {
        self.selected = 0;
    }

    pub fn select_next(&mut self, extensions: &ExtensionSet) {
        if self.selected < extensions.len() {
            self.selected += 1;
        }
    }

    pub fn select_previous(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn selected_row<'a>(&self, extensions: &'a ExtensionSet) -> Option<ExtensionRow<'a>> {
        match self.selected {
            0 => Some(ExtensionRow::SelectAll),
            n => extensions.key_at(n - 1).map(ExtensionRow::Extension),
        }
    }
}

#[derive(Debug, Default)]
pub struct ExtensionList;

impl ExtensionList {
    pub fn render(
        &self,
        frame: &mut Frame<'_>,
        area: Rect,
        extensions: Option<(&ExtensionSet, bool)>,
        state: &ExtensionListState,
        has_focus: bool,
    ) {
        let block = Block::default()
            .borders(Borders::ALL)
            .title("Extensions")
            .border_style(Style::default().fg(if has_focus {
                Color::Cyan
            } else {
                Color::DarkGray
            }));

        let mut items = Vec::new();
        if let Some((extensions, select_all)) = extensions {
            items.push(row("Select all", select_all, true));
            for entry in extensions.entries() {
                items.push(row(&entry.extension, entry.checked, false));
            }
        }

        let mut list_state = ListState::default();
        if !items.is_empty() {
            list_state.select(Some(state.selected.min(items.len() - 1)));
        }
        let list = List::new(items).block(block).highlight_style(if has_focus {
            Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().add_modifier(Modifier::BOLD)
        });
        frame.render_stateful_widget(list, area, &mut list_state);
    }
}

fn row(label: &str, checked: bool, emphasized: bool) -> ListItem<'static> {
    let mark = if checked { "[x] " } else { "[ ] " };
    let mut label_style = Style::default();
    if emphasized {
        label_style = label_style.add_modifier(Modifier::ITALIC);
    }
    ListItem::new(Line::from(vec![
        Span::styled(
            mark,
            Style::default().fg(if checked { Color::Green } else { Color::DarkGray }),
        ),
        Span::styled(label.to_string(), label_style),
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;

    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    use crate::app::sync::SyncEngine;
    use crate::domain::model::TreeNode;
    use crate::ui::components::buffer_text;

    fn engine() -> SyncEngine {
        SyncEngine::from_root(&TreeNode::directory(
            "/",
            vec![TreeNode::file("/a.go"), TreeNode::file("/b.js")],
        ))
        .unwrap()
    }

    #[test]
    fn cursor_walks_select_all_then_extensions() {
        let engine = engine();
        let mut state = ExtensionListState::default();
        assert_eq!(
            state.selected_row(engine.extensions()),
            Some(ExtensionRow::SelectAll)
        );
        state.select_next(engine.extensions());
        assert_eq!(
            state.selected_row(engine.extensions()),
            Some(ExtensionRow::Extension(".go"))
        );
        state.select_next(engine.extensions());
        state.select_next(engine.extensions());
        assert_eq!(
            state.selected_row(engine.extensions()),
            Some(ExtensionRow::Extension(".js"))
        );
    }

    #[test]
    fn renders_select_all_and_entries() {
        let mut engine = engine();
        engine.toggle_extension(".js", false).unwrap();

        let mut terminal = Terminal::new(TestBackend::new(30, 6)).unwrap();
        terminal
            .draw(|frame| {
                let area = frame.size();
                ExtensionList.render(
                    frame,
                    area,
                    Some((engine.extensions(), engine.select_all())),
                    &ExtensionListState::default(),
                    false,
                );
            })
            .unwrap();

        let text = buffer_text(terminal.backend().buffer());
        assert!(text.contains("[ ] Select all"));
        assert!(text.contains("[x] .go"));
        assert!(text.contains("[ ] .js"));
    }
}
