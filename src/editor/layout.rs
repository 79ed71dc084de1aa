use std::ops::Range;

use unicode_segmentation::UnicodeSegmentation;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use super::gutter::{BlockGeometry, CursorRect, VisibleLayout};

/// Glyph advance widths of the active rendering font.
pub trait FontMetrics {
    fn advance(&self, ch: char) -> u16;
}

/// Terminal cell grid: every glyph advances by its display width in cells.
#[derive(Debug, Clone, Copy, Default)]
pub struct CellMetrics;

impl FontMetrics for CellMetrics {
    fn advance(&self, ch: char) -> u16 {
        ch.width().unwrap_or(0) as u16
    }
}

/// Size of the text area in cells, excluding the gutter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewport {
    pub width: u16,
    pub height: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisualRow {
    /// Row inside the viewport, 0 at the top edge.
    pub y: i32,
    pub text: String,
}

#[derive(Debug, Clone)]
struct Block {
    range: Range<usize>,
    row_starts: Vec<usize>,
}

impl Block {
    fn row_end(&self, row: usize) -> usize {
        self.row_starts
            .get(row + 1)
            .copied()
            .unwrap_or(self.range.end)
    }
}

/// Block layout of a plain-text buffer: one block per logical line, each
/// one or more rows tall when soft wrap is on. Holds no text of its own.
#[derive(Debug, Clone, Default)]
pub struct TextLayout {
    blocks: Vec<Block>,
    geometry: Vec<BlockGeometry>,
    viewport: Viewport,
    wrap: bool,
    tab_stop: u16,
    scroll_top: i32,
    scroll_left: usize,
}

impl TextLayout {
    pub fn rebuild(&mut self, text: &str, viewport: Viewport, wrap: bool, tab_stop: u16) {
        self.viewport = viewport;
        self.wrap = wrap;
        self.tab_stop = tab_stop.max(1);
        self.blocks.clear();
        self.geometry.clear();
        if wrap {
            self.scroll_left = 0;
        }

        let mut top = 0i32;
        let mut start = 0usize;
        for line in text.split('\n') {
            let end = start + line.len();
            let row_starts = self.wrap_rows(line, start);
            let height = row_starts.len() as i32;
            self.blocks.push(Block {
                range: start..end,
                row_starts,
            });
            self.geometry.push(BlockGeometry { top, height });
            top += height;
            start = end + 1;
        }
        self.clamp_scroll();
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn total_rows(&self) -> i32 {
        self.geometry
            .last()
            .map(|block| block.top + block.height)
            .unwrap_or(0)
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn scroll_top(&self) -> i32 {
        self.scroll_top
    }

    /// Scrolls the minimum amount needed to bring the cursor's row (and,
    /// without wrap, its column) into view.
    pub fn ensure_visible(&mut self, text: &str, cursor: usize) {
        let Some((block_idx, row_idx)) = self.locate(cursor) else {
            return;
        };
        let height = i32::from(self.viewport.height);
        if height > 0 {
            let row = self.geometry[block_idx].top + row_idx as i32;
            if row < self.scroll_top {
                self.scroll_top = row;
            } else if row >= self.scroll_top + height {
                self.scroll_top = row - height + 1;
            }
        }
        if !self.wrap {
            let width = usize::from(self.viewport.width);
            let row_start = self.blocks[block_idx].row_starts[row_idx];
            let column = self.columns(&text[row_start..cursor]);
            if column < self.scroll_left {
                self.scroll_left = column;
            } else if width > 0 && column >= self.scroll_left + width {
                self.scroll_left = column + 1 - width;
            }
        }
        self.clamp_scroll();
    }

    pub fn scroll_by(&mut self, rows: i32) {
        self.scroll_top += rows;
        self.clamp_scroll();
    }

    /// Cursor cell in viewport coordinates.
    pub fn cursor_rect(&self, text: &str, cursor: usize) -> Option<CursorRect> {
        let (block_idx, row_idx) = self.locate(cursor)?;
        let row_start = self.blocks[block_idx].row_starts[row_idx];
        let column = self.columns(&text[row_start..cursor]) as i32;
        Some(CursorRect {
            top: self.geometry[block_idx].top + row_idx as i32 - self.scroll_top,
            left: column - self.scroll_left as i32,
            height: 1,
        })
    }

    pub fn visible(&self, cursor: Option<CursorRect>) -> Option<VisibleLayout<'_>> {
        if self.blocks.is_empty() || self.viewport.height == 0 {
            return None;
        }
        let first = self
            .geometry
            .iter()
            .position(|block| block.top + block.height > self.scroll_top)
            .unwrap_or(self.geometry.len() - 1);
        Some(VisibleLayout {
            first_block_number: first,
            blocks: &self.geometry[first..],
            content_offset: -self.scroll_top,
            viewport_height: i32::from(self.viewport.height),
            viewport_width: i32::from(self.viewport.width),
            cursor,
        })
    }

    /// Rows currently on screen with tabs expanded and control characters
    /// dropped, ready to draw.
    pub fn visible_rows(&self, text: &str) -> Vec<VisualRow> {
        let height = i32::from(self.viewport.height);
        let mut rows = Vec::new();
        for (block, geometry) in self.blocks.iter().zip(&self.geometry) {
            if geometry.top + geometry.height <= self.scroll_top {
                continue;
            }
            if geometry.top - self.scroll_top >= height {
                break;
            }
            for row in 0..block.row_starts.len() {
                let y = geometry.top + row as i32 - self.scroll_top;
                if y < 0 {
                    continue;
                }
                if y >= height {
                    break;
                }
                let slice = &text[block.row_starts[row]..block.row_end(row)];
                rows.push(VisualRow {
                    y,
                    text: self.render_row(slice),
                });
            }
        }
        rows
    }

    /// Buffer offset under a viewport cell; clicks below the last line land
    /// at the end of the document.
    pub fn hit_test(&self, text: &str, row: u16, col: u16) -> Option<usize> {
        let last = self.blocks.last()?;
        let doc_row = self.scroll_top + i32::from(row);
        if doc_row >= self.total_rows() {
            return Some(last.range.end);
        }
        let block_idx = self
            .geometry
            .iter()
            .position(|block| doc_row >= block.top && doc_row < block.top + block.height)?;
        let block = &self.blocks[block_idx];
        let row_idx = (doc_row - self.geometry[block_idx].top) as usize;
        let row_start = block.row_starts[row_idx];
        let row_end = block.row_end(row_idx);
        let target = usize::from(col) + self.scroll_left;
        let mut column = 0usize;
        for (idx, grapheme) in text[row_start..row_end].grapheme_indices(true) {
            let width = self.grapheme_width(grapheme, column);
            if column + width > target {
                return Some(row_start + idx);
            }
            column += width;
        }
        Some(row_end)
    }

    fn locate(&self, cursor: usize) -> Option<(usize, usize)> {
        let block_idx = self
            .blocks
            .iter()
            .position(|block| cursor >= block.range.start && cursor <= block.range.end)?;
        let row_idx = self.blocks[block_idx]
            .row_starts
            .iter()
            .rposition(|start| *start <= cursor)
            .unwrap_or(0);
        Some((block_idx, row_idx))
    }

    fn wrap_rows(&self, line: &str, base: usize) -> Vec<usize> {
        let mut starts = vec![base];
        let width = usize::from(self.viewport.width);
        if !self.wrap || width == 0 {
            return starts;
        }
        let mut column = 0usize;
        for (idx, grapheme) in line.grapheme_indices(true) {
            let mut advance = self.grapheme_width(grapheme, column);
            if column > 0 && column + advance > width {
                starts.push(base + idx);
                column = 0;
                advance = self.grapheme_width(grapheme, column);
            }
            column += advance;
        }
        starts
    }

    fn grapheme_width(&self, grapheme: &str, column: usize) -> usize {
        if grapheme == "\t" {
            let tab = usize::from(self.tab_stop);
            tab - column % tab
        } else {
            grapheme.width()
        }
    }

    fn columns(&self, slice: &str) -> usize {
        slice
            .graphemes(true)
            .fold(0, |column, grapheme| column + self.grapheme_width(grapheme, column))
    }

    fn render_row(&self, slice: &str) -> String {
        let mut out = String::with_capacity(slice.len());
        let mut column = 0usize;
        for grapheme in slice.graphemes(true) {
            let width = self.grapheme_width(grapheme, column);
            let start = column;
            column += width;
            if column <= self.scroll_left {
                continue;
            }
            if start < self.scroll_left || grapheme == "\t" {
                let visible = column - start.max(self.scroll_left);
                out.extend(std::iter::repeat(' ').take(visible));
            } else if grapheme.chars().all(char::is_control) {
                continue;
            } else {
                out.push_str(grapheme);
            }
        }
        out
    }

    fn clamp_scroll(&mut self) {
        let max_top = (self.total_rows() - 1).max(0);
        self.scroll_top = self.scroll_top.clamp(0, max_top);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(text: &str, width: u16, height: u16, wrap: bool) -> TextLayout {
        let mut layout = TextLayout::default();
        layout.rebuild(text, Viewport { width, height }, wrap, 2);
        layout
    }

    #[test]
    fn one_block_per_line_including_trailing_empty_line() {
        assert_eq!(layout("", 10, 5, true).block_count(), 1);
        assert_eq!(layout("a\nb\n", 10, 5, true).block_count(), 3);
    }

    #[test]
    fn soft_wrap_makes_taller_blocks() {
        let layout = layout("abcdefghij\nx", 4, 10, true);
        assert_eq!(layout.total_rows(), 4);
        let visible = layout.visible(None).expect("layout");
        assert_eq!(visible.blocks[0].height, 3);
        assert_eq!(visible.blocks[1].top, 3);
    }

    #[test]
    fn tabs_expand_to_tab_stop() {
        let layout = layout("a\tb", 20, 2, true);
        let rows = layout.visible_rows("a\tb");
        assert_eq!(rows[0].text, "a b");
        let rect = layout.cursor_rect("a\tb", 2).expect("cursor");
        assert_eq!(rect.left, 2);
    }

    #[test]
    fn ensure_visible_scrolls_to_cursor_row() {
        let text = (1..=20).map(|n| n.to_string()).collect::<Vec<_>>().join("\n");
        let mut layout = layout(&text, 10, 5, true);
        let cursor = text.len();
        layout.ensure_visible(&text, cursor);
        assert_eq!(layout.scroll_top(), 15);
        let rect = layout.cursor_rect(&text, cursor).expect("cursor");
        assert_eq!(rect.top, 4);
        layout.ensure_visible(&text, 0);
        assert_eq!(layout.scroll_top(), 0);
    }

    #[test]
    fn hit_test_maps_cells_to_offsets() {
        let text = "hello\nworld";
        let layout = layout(text, 10, 5, true);
        assert_eq!(layout.hit_test(text, 1, 2), Some(8));
        assert_eq!(layout.hit_test(text, 0, 9), Some(5));
        assert_eq!(layout.hit_test(text, 4, 0), Some(text.len()));
    }

    #[test]
    fn no_wrap_scrolls_horizontally() {
        let text = "0123456789abcdef";
        let mut layout = layout(text, 4, 1, false);
        layout.ensure_visible(text, 10);
        let rows = layout.visible_rows(text);
        assert_eq!(rows[0].text, "789abcdef");
        let rect = layout.cursor_rect(text, 10).expect("cursor");
        assert_eq!(rect.left, 3);
    }

    #[test]
    fn cell_metrics_measure_wide_glyphs() {
        assert_eq!(CellMetrics.advance('9'), 1);
        assert_eq!(CellMetrics.advance('日'), 2);
    }
}
