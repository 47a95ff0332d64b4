//! Panes and overlays drawn by the TUI.

pub mod command_palette;
pub mod extensions;
pub mod file_tree;
pub mod preview;
pub mod summary;

#[cfg(test)]
pub(crate) fn buffer_text(buffer: &ratatui::buffer::Buffer) -> String {
    let width = usize::from(buffer.area.width.max(1));
    buffer
        .content()
        .chunks(width)
        .map(|row| row.iter().map(|cell| cell.symbol()).collect::<String>())
        .collect::<Vec<_>>()
        .join("\n")
}
