//! Checkbox tree pane over the analyzed repository.

use std::collections::HashSet;

use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

use crate::app::tree::SelectionTree;

/// Cursor and collapse state for the tree pane.
///
/// Indices refer to positions in [`SelectionTree::nodes`], which stay stable until the next
/// analysis replaces the tree.
#[derive(Debug, Default, Clone)]
pub struct FileTreeState {
    visible: Vec<usize>,
    selected: usize,
    collapsed: HashSet<usize>,
}

impl FileTreeState {
    /// Forget cursor and collapse state after a new analysis.
    pub fn reset(&mut self, tree: &SelectionTree) {
        self.collapsed.clear();
        self.selected = 0;
        self.refresh(tree);
    }

    /// Recompute which nodes are reachable through expanded directories.
    pub fn refresh(&mut self, tree: &SelectionTree) {
        let nodes = tree.nodes();
        self.visible.clear();
        for (idx, node) in nodes.iter().enumerate() {
            let mut parent = node.parent;
            let mut hidden = false;
            while let Some(p) = parent {
                if self.collapsed.contains(&p) {
                    hidden = true;
                    break;
                }
                parent = nodes[p].parent;
            }
            if !hidden {
                self.visible.push(idx);
            }
        }
        if self.selected >= self.visible.len() {
            self.selected = self.visible.len().saturating_sub(1);
        }
    }

    pub fn select_next(&mut self) {
        if self.selected + 1 < self.visible.len() {
            self.selected += 1;
        }
    }

    pub fn select_previous(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    /// Node index under the cursor.
    pub fn selected_node(&self) -> Option<usize> {
        self.visible.get(self.selected).copied()
    }

    /// Path of the node under the cursor.
    pub fn selected_path<'a>(&self, tree: &'a SelectionTree) -> Option<&'a str> {
        self.selected_node()
            .and_then(|idx| tree.nodes().get(idx))
            .map(|node| node.path.as_str())
    }

    /// Expand a collapsed directory, or step into its first child.
    pub fn expand(&mut self, tree: &SelectionTree) {
        let Some(idx) = self.selected_node() else {
            return;
        };
        if self.collapsed.remove(&idx) {
            self.refresh(tree);
        } else if tree.nodes()[idx].has_children(idx) {
            self.select_next();
        }
    }

    /// Collapse the directory under the cursor, or move to its parent.
    pub fn collapse_or_parent(&mut self, tree: &SelectionTree) {
        let Some(idx) = self.selected_node() else {
            return;
        };
        let node = &tree.nodes()[idx];
        if node.is_dir() && node.has_children(idx) && self.collapsed.insert(idx) {
            self.refresh(tree);
        } else if let Some(parent) = node.parent
            && let Some(pos) = self.visible.iter().position(|visible| *visible == parent)
        {
            self.selected = pos;
        }
    }

    pub fn is_collapsed(&self, idx: usize) -> bool {
        self.collapsed.contains(&idx)
    }

    fn selected_index(&self) -> Option<usize> {
        (!self.visible.is_empty()).then_some(self.selected)
    }
}

/// Renders the tree pane.
#[derive(Debug, Default)]
pub struct FileTree;

impl FileTree {
    pub fn render(
        &self,
        frame: &mut Frame<'_>,
        area: Rect,
        tree: Option<(&str, &SelectionTree)>,
        state: &FileTreeState,
        has_focus: bool,
    ) {
        let title = match tree {
            Some((repo, _)) => format!("Tree · {repo}"),
            None => "Tree".to_string(),
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .title(title)
            .border_style(Style::default().fg(if has_focus {
                Color::Cyan
            } else {
                Color::DarkGray
            }));

        let Some((_, tree)) = tree else {
            let placeholder = Paragraph::new("No repository analyzed · press : then analyze <url>")
                .style(
                    Style::default()
                        .fg(Color::DarkGray)
                        .add_modifier(Modifier::ITALIC),
                )
                .block(block);
            frame.render_widget(placeholder, area);
            return;
        };

        let nodes = tree.nodes();
        let items: Vec<ListItem> = state
            .visible
            .iter()
            .map(|&idx| {
                let node = &nodes[idx];
                let mut spans = vec![Span::raw("  ".repeat(node.depth))];
                if node.is_dir() {
                    let symbol = if !node.has_children(idx) {
                        "·"
                    } else if state.is_collapsed(idx) {
                        "▸"
                    } else {
                        "▾"
                    };
                    spans.push(Span::styled(
                        format!("{symbol} "),
                        Style::default().fg(Color::Yellow),
                    ));
                }
                let (mark, mark_style) = if node.checked {
                    ("[x] ", Style::default().fg(Color::Green))
                } else {
                    ("[ ] ", Style::default().fg(Color::DarkGray))
                };
                spans.push(Span::styled(mark, mark_style));

                let name = node.name.trim_end_matches('/');
                let label = if node.is_dir() {
                    format!("{name}/")
                } else {
                    name.to_string()
                };
                let name_style = if node.checked {
                    Style::default()
                } else {
                    Style::default().fg(Color::DarkGray)
                };
                spans.push(Span::styled(label, name_style));
                ListItem::new(Line::from(spans))
            })
            .collect();

        let mut list_state = ListState::default();
        list_state.select(state.selected_index());

        let highlight_style = if has_focus {
            Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().add_modifier(Modifier::BOLD)
        };
        let list = List::new(items)
            .block(block)
            .highlight_style(highlight_style);
        frame.render_stateful_widget(list, area, &mut list_state);
    }
}
