use bitflags::bitflags;
use once_cell::sync::Lazy;
use regex::Regex;
use unicode_segmentation::UnicodeSegmentation;

pub mod gutter;
pub mod layout;

pub use gutter::{GutterLine, GutterPaint, MarkerLine};
pub use layout::{CellMetrics, FontMetrics, TextLayout, Viewport, VisualRow};

/// Digits the gutter is sized for; larger line numbers are truncated.
pub const GUTTER_DIGITS: u16 = 4;
const TAB_STOP_SPACES: u16 = 2;
const MAX_HISTORY: usize = 200;

static LEADING_WHITESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s+").expect("leading whitespace pattern"));

bitflags! {
    /// Outstanding repaint work raised by edits and cursor moves. The
    /// surface only records requests; the host coalesces them per frame.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Repaint: u8 {
        const TEXT = 1;
        const CURRENT_LINE = 1 << 1;
        const GUTTER = 1 << 2;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditKey {
    Char(char),
    Enter,
    Tab,
    Backspace,
    Delete,
    Left,
    Right,
    Up,
    Down,
    Home,
    End,
    WordLeft,
    WordRight,
    PageUp,
    PageDown,
    Undo,
    Redo,
}

/// The diary text area: buffer, cursor, auto-indent and the layout that the
/// line-number gutter is drawn from.
#[derive(Debug, Clone)]
pub struct EditingSurface {
    buffer: String,
    cursor: usize,
    dirty: bool,
    preferred_column: Option<usize>,
    history: Vec<String>,
    history_index: usize,
    /// History slot matching the text on disk, if it is still held.
    clean_index: Option<usize>,
    gutter_width: u16,
    tab_stop: u16,
    soft_wrap: bool,
    layout: TextLayout,
    layout_stale: bool,
    repaint: Repaint,
}

impl Default for EditingSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl EditingSurface {
    pub fn new() -> Self {
        let mut surface = Self {
            buffer: String::new(),
            cursor: 0,
            dirty: false,
            preferred_column: None,
            history: Vec::with_capacity(128),
            history_index: 0,
            clean_index: Some(0),
            gutter_width: 0,
            tab_stop: TAB_STOP_SPACES,
            soft_wrap: true,
            layout: TextLayout::default(),
            layout_stale: true,
            repaint: Repaint::all(),
        };
        surface.set_font(&CellMetrics);
        surface.history.push(String::new());
        surface
    }

    pub fn text(&self) -> &str {
        &self.buffer
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn gutter_width(&self) -> u16 {
        self.gutter_width
    }

    pub fn tab_stop(&self) -> u16 {
        self.tab_stop
    }

    pub fn soft_wrap(&self) -> bool {
        self.soft_wrap
    }

    pub fn set_soft_wrap(&mut self, enabled: bool) {
        if self.soft_wrap != enabled {
            self.soft_wrap = enabled;
            self.invalidate_layout();
        }
    }

    /// Replaces the whole buffer, as when a different day is opened.
    pub fn set_text(&mut self, text: String) {
        self.buffer = text;
        self.cursor = 0;
        self.preferred_column = None;
        self.mark_clean();
        self.invalidate_layout();
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
        self.history.clear();
        self.history.push(self.buffer.clone());
        self.history_index = 0;
        self.clean_index = Some(0);
    }

    /// Re-derives gutter width and tab stop from the active font.
    pub fn set_font(&mut self, metrics: &dyn FontMetrics) {
        self.gutter_width = metrics.advance('9') * GUTTER_DIGITS;
        self.tab_stop = (metrics.advance(' ') * TAB_STOP_SPACES).max(1);
        self.invalidate_layout();
    }

    pub fn take_repaint(&mut self) -> Repaint {
        std::mem::take(&mut self.repaint)
    }

    pub fn handle_key(&mut self, key: EditKey) -> bool {
        let changed = match key {
            EditKey::Char(ch) => self.insert_char(ch),
            EditKey::Enter => self.insert_newline(),
            EditKey::Tab => self.insert_char('\t'),
            EditKey::Backspace => self.backspace(),
            EditKey::Delete => self.delete(),
            EditKey::Left => self.move_left(),
            EditKey::Right => self.move_right(),
            EditKey::Up => self.move_up(),
            EditKey::Down => self.move_down(),
            EditKey::Home => self.move_home(),
            EditKey::End => self.move_end(),
            EditKey::WordLeft => self.move_word_left(),
            EditKey::WordRight => self.move_word_right(),
            EditKey::PageUp => self.move_page(-1),
            EditKey::PageDown => self.move_page(1),
            EditKey::Undo => self.undo(),
            EditKey::Redo => self.redo(),
        };
        self.request_cursor_repaint();
        changed
    }

    /// Places the cursor under a text-area cell.
    pub fn click(&mut self, row: u16, col: u16) -> bool {
        self.refresh_layout();
        let target = self.layout.hit_test(&self.buffer, row, col);
        self.request_cursor_repaint();
        match target {
            Some(offset) if offset != self.cursor => {
                self.cursor = offset;
                self.preferred_column = None;
                true
            }
            _ => false,
        }
    }

    /// Lays the buffer out for `viewport` and scrolls the cursor into view.
    pub fn prepare(&mut self, viewport: Viewport) {
        if self.layout.viewport() != viewport {
            self.layout_stale = true;
        }
        self.relayout(viewport);
        self.layout.ensure_visible(&self.buffer, self.cursor);
    }

    fn refresh_layout(&mut self) {
        let viewport = self.layout.viewport();
        self.relayout(viewport);
    }

    fn relayout(&mut self, viewport: Viewport) {
        if self.layout_stale {
            self.layout
                .rebuild(&self.buffer, viewport, self.soft_wrap, self.tab_stop);
            self.layout_stale = false;
        }
    }

    pub fn cursor_rect(&self) -> Option<gutter::CursorRect> {
        if self.layout_stale {
            return None;
        }
        self.layout.cursor_rect(&self.buffer, self.cursor)
    }

    pub fn gutter_paint(&self) -> GutterPaint {
        if self.layout_stale {
            return GutterPaint::default();
        }
        gutter::render(self.layout.visible(self.cursor_rect()).as_ref())
    }

    pub fn visible_rows(&self) -> Vec<VisualRow> {
        if self.layout_stale {
            return Vec::new();
        }
        self.layout.visible_rows(&self.buffer)
    }

    /// One-based line and column of the cursor.
    pub fn cursor_position(&self) -> (usize, usize) {
        let start = line_start(&self.buffer, self.cursor);
        let line = self.buffer[..start].matches('\n').count() + 1;
        (line, column_at(&self.buffer, start, self.cursor) + 1)
    }

    pub fn line_count(&self) -> usize {
        self.buffer.matches('\n').count() + 1
    }

    fn insert_char(&mut self, ch: char) -> bool {
        let mut scratch = [0u8; 4];
        let encoded = ch.encode_utf8(&mut scratch);
        self.buffer.insert_str(self.cursor, encoded);
        self.cursor += encoded.len();
        self.preferred_column = None;
        self.after_edit();
        true
    }

    /// Breaks the line and repeats the leading whitespace of the line the
    /// cursor was on.
    fn insert_newline(&mut self) -> bool {
        let start = line_start(&self.buffer, self.cursor);
        let end = line_end(&self.buffer, self.cursor);
        let indent = LEADING_WHITESPACE
            .find(&self.buffer[start..end])
            .map(|found| found.as_str().to_string())
            .unwrap_or_default();
        let inserted = format!("\n{indent}");
        self.buffer.insert_str(self.cursor, &inserted);
        self.cursor += inserted.len();
        self.preferred_column = None;
        self.after_edit();
        true
    }

    fn backspace(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        let prev = prev_grapheme_boundary(&self.buffer, self.cursor);
        self.buffer.drain(prev..self.cursor);
        self.cursor = prev;
        self.preferred_column = None;
        self.after_edit();
        true
    }

    fn delete(&mut self) -> bool {
        if self.cursor >= self.buffer.len() {
            return false;
        }
        let next = next_grapheme_boundary(&self.buffer, self.cursor);
        if next == self.cursor {
            return false;
        }
        self.buffer.drain(self.cursor..next);
        self.preferred_column = None;
        self.after_edit();
        true
    }

    fn move_left(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor = prev_grapheme_boundary(&self.buffer, self.cursor);
        self.preferred_column = None;
        true
    }

    fn move_right(&mut self) -> bool {
        if self.cursor >= self.buffer.len() {
            return false;
        }
        let next = next_grapheme_boundary(&self.buffer, self.cursor);
        if next == self.cursor {
            return false;
        }
        self.cursor = next;
        self.preferred_column = None;
        true
    }

    fn move_home(&mut self) -> bool {
        let start = line_start(&self.buffer, self.cursor);
        if self.cursor == start {
            return false;
        }
        self.cursor = start;
        self.preferred_column = Some(0);
        true
    }

    fn move_end(&mut self) -> bool {
        let end = line_end(&self.buffer, self.cursor);
        if self.cursor == end {
            return false;
        }
        self.cursor = end;
        self.preferred_column = Some(column_at(
            &self.buffer,
            line_start(&self.buffer, self.cursor),
            self.cursor,
        ));
        true
    }

    fn move_up(&mut self) -> bool {
        let current_start = line_start(&self.buffer, self.cursor);
        let column = self
            .preferred_column
            .unwrap_or_else(|| column_at(&self.buffer, current_start, self.cursor));
        if current_start == 0 {
            if self.cursor == 0 {
                return false;
            }
            self.cursor = 0;
            self.preferred_column = Some(column);
            return true;
        }
        let prev_start = line_start(&self.buffer, current_start - 1);
        let target = position_for_column(&self.buffer, prev_start, column);
        self.cursor = target;
        self.preferred_column = Some(column);
        true
    }

    fn move_down(&mut self) -> bool {
        let current_start = line_start(&self.buffer, self.cursor);
        let column = self
            .preferred_column
            .unwrap_or_else(|| column_at(&self.buffer, current_start, self.cursor));
        let current_end = line_end(&self.buffer, self.cursor);
        if current_end == self.buffer.len() {
            if self.cursor == self.buffer.len() {
                return false;
            }
            self.cursor = self.buffer.len();
            self.preferred_column = Some(column);
            return true;
        }
        let target = position_for_column(&self.buffer, current_end + 1, column);
        self.cursor = target;
        self.preferred_column = Some(column);
        true
    }

    fn move_page(&mut self, direction: i32) -> bool {
        let rows = self.layout.viewport().height.max(1);
        let mut moved = false;
        for _ in 0..rows {
            let step = if direction < 0 {
                self.move_up()
            } else {
                self.move_down()
            };
            if !step {
                break;
            }
            moved = true;
        }
        if moved {
            self.layout.scroll_by(direction * i32::from(rows));
        }
        moved
    }

    fn move_word_left(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        let mut idx = self.cursor;
        while idx > 0 {
            let prev = prev_grapheme_boundary(&self.buffer, idx);
            if self.buffer[prev..idx].trim().is_empty() {
                idx = prev;
            } else {
                break;
            }
        }
        while idx > 0 {
            let prev = prev_grapheme_boundary(&self.buffer, idx);
            if self.buffer[prev..idx].trim().is_empty() {
                break;
            }
            idx = prev;
        }
        self.cursor = idx;
        self.preferred_column = None;
        true
    }

    fn move_word_right(&mut self) -> bool {
        let len = self.buffer.len();
        if self.cursor >= len {
            return false;
        }
        let mut idx = self.cursor;
        while idx < len {
            let next = next_grapheme_boundary(&self.buffer, idx);
            if self.buffer[idx..next].trim().is_empty() {
                break;
            }
            idx = next;
        }
        while idx < len {
            let next = next_grapheme_boundary(&self.buffer, idx);
            if self.buffer[idx..next].trim().is_empty() {
                idx = next;
            } else {
                break;
            }
        }
        if idx == self.cursor {
            return false;
        }
        self.cursor = idx;
        self.preferred_column = None;
        true
    }

    fn undo(&mut self) -> bool {
        if self.history_index == 0 {
            return false;
        }
        self.history_index -= 1;
        self.restore_history_snapshot();
        true
    }

    fn redo(&mut self) -> bool {
        if self.history_index + 1 >= self.history.len() {
            return false;
        }
        self.history_index += 1;
        self.restore_history_snapshot();
        true
    }

    fn after_edit(&mut self) {
        self.dirty = true;
        self.record_history();
        self.invalidate_layout();
    }

    fn invalidate_layout(&mut self) {
        self.layout_stale = true;
        self.repaint |= Repaint::all();
    }

    fn request_cursor_repaint(&mut self) {
        self.repaint |= Repaint::CURRENT_LINE | Repaint::GUTTER;
    }

    fn record_history(&mut self) {
        if let Some(current) = self.history.get(self.history_index) {
            if current.as_str() == self.buffer {
                return;
            }
        }
        self.history.truncate(self.history_index + 1);
        if self.clean_index.is_some_and(|clean| clean > self.history_index) {
            self.clean_index = None;
        }
        self.history.push(self.buffer.clone());
        if self.history.len() > MAX_HISTORY {
            let overflow = self.history.len() - MAX_HISTORY;
            self.history.drain(0..overflow);
            self.clean_index = self
                .clean_index
                .and_then(|clean| clean.checked_sub(overflow));
        }
        self.history_index = self.history.len() - 1;
    }

    fn restore_history_snapshot(&mut self) {
        if let Some(snapshot) = self.history.get(self.history_index).cloned() {
            self.buffer = snapshot;
            self.cursor = clamp_to_boundary(&self.buffer, self.cursor);
            self.dirty = self.clean_index != Some(self.history_index);
            self.preferred_column = None;
            self.invalidate_layout();
        }
    }
}

fn clamp_to_boundary(text: &str, cursor: usize) -> usize {
    let mut cursor = cursor.min(text.len());
    while !text.is_char_boundary(cursor) {
        cursor -= 1;
    }
    cursor
}

fn prev_grapheme_boundary(text: &str, cursor: usize) -> usize {
    text[..cursor]
        .grapheme_indices(true)
        .next_back()
        .map(|(idx, _)| idx)
        .unwrap_or(0)
}

fn next_grapheme_boundary(text: &str, cursor: usize) -> usize {
    text[cursor..]
        .graphemes(true)
        .next()
        .map(|grapheme| cursor + grapheme.len())
        .unwrap_or(text.len())
}

fn line_start(text: &str, cursor: usize) -> usize {
    text[..cursor].rfind('\n').map(|idx| idx + 1).unwrap_or(0)
}

fn line_end(text: &str, cursor: usize) -> usize {
    text[cursor..]
        .find('\n')
        .map(|idx| cursor + idx)
        .unwrap_or(text.len())
}

fn column_at(text: &str, line_start: usize, cursor: usize) -> usize {
    text[line_start..cursor].graphemes(true).count()
}

fn position_for_column(text: &str, line_start: usize, column: usize) -> usize {
    let line_end = line_end(text, line_start);
    text[line_start..line_end]
        .grapheme_indices(true)
        .nth(column)
        .map(|(idx, _)| line_start + idx)
        .unwrap_or(line_end)
}
