use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;
use time::Month;

use crate::app::calendar::CalendarPane;
use crate::calendar::{CalendarDate, MonthPage};
use crate::config::themes::Palette;
use crate::diary::DayStyle;
use crate::editor::{gutter, EditingSurface};

const CALENDAR_WIDTH: u16 = 23;
const CALENDAR_HEIGHT: u16 = 9;
const DAY_CELL_WIDTH: u16 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    Calendar,
    Editor,
}

/// Screen regions for one frame. Computed before drawing so the editor can
/// be laid out for the exact text area it will be painted into.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScreenAreas {
    pub calendar: Rect,
    pub navigation: Rect,
    pub editor: Rect,
    pub gutter: Rect,
    pub text: Rect,
    pub status: Rect,
}

pub struct DiaryView<'a> {
    pub surface: &'a EditingSurface,
    pub calendar: &'a CalendarPane,
    pub open_date: CalendarDate,
    pub focus: FocusPane,
    pub status: Option<&'a str>,
    pub palette: Palette,
    pub show_marker: bool,
}

pub fn screen_areas(size: Rect, gutter_width: u16) -> ScreenAreas {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1)])
        .split(size);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(CALENDAR_WIDTH), Constraint::Min(10)])
        .split(vertical[0]);

    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(CALENDAR_HEIGHT),
            Constraint::Length(3),
            Constraint::Min(0),
        ])
        .split(columns[0]);

    let editor = columns[1];
    let inner = Block::default().borders(Borders::ALL).inner(editor);
    let gutter_span = (gutter_width + 1).min(inner.width);
    let gutter = Rect {
        width: gutter_span,
        ..inner
    };
    let text = Rect {
        x: inner.x + gutter_span,
        width: inner.width - gutter_span,
        ..inner
    };

    ScreenAreas {
        calendar: left[0],
        navigation: left[1],
        editor,
        gutter,
        text,
        status: vertical[1],
    }
}

pub fn draw_app(frame: &mut Frame, view: &DiaryView<'_>, areas: &ScreenAreas) {
    draw_calendar(frame, view, areas.calendar);
    draw_navigation(frame, view, areas.navigation);
    draw_editor(frame, view, areas);
    draw_status(frame, view, areas.status);
}

/// Single banner shown while the window is hidden.
pub fn draw_hidden(frame: &mut Frame, palette: &Palette) {
    let area = frame.size();
    let banner = Paragraph::new(Line::from(vec![
        Span::styled("WorkDiary", Style::default().fg(palette.accent)),
        Span::raw(" hidden · F12 show · Ctrl-Q quit"),
    ]));
    frame.render_widget(
        banner,
        Rect {
            height: area.height.min(1),
            ..area
        },
    );
}

/// Clickable day cells of the calendar grid.
pub fn calendar_cells(area: Rect, pane: &CalendarPane) -> Vec<(Rect, CalendarDate)> {
    let inner = Block::default().borders(Borders::ALL).inner(area);
    let mut cells = Vec::new();
    for (row, week) in pane.weeks().iter().enumerate() {
        let y = inner.y + 1 + row as u16;
        if y >= inner.y + inner.height {
            break;
        }
        for (column, day) in week.iter().enumerate() {
            let Some(date) = day else {
                continue;
            };
            let x = inner.x + column as u16 * DAY_CELL_WIDTH;
            if x + DAY_CELL_WIDTH > inner.x + inner.width + 1 {
                continue;
            }
            cells.push((
                Rect {
                    x,
                    y,
                    width: DAY_CELL_WIDTH,
                    height: 1,
                },
                *date,
            ));
        }
    }
    cells
}

fn draw_calendar(frame: &mut Frame, view: &DiaryView<'_>, area: Rect) {
    let pane = view.calendar;
    let palette = &view.palette;
    let page = pane.page();
    let title = calendar_title(page);
    let border_style = if view.focus == FocusPane::Calendar {
        Style::default().fg(palette.accent)
    } else {
        Style::default()
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style)
        .title(title);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let header = pane
        .weekday_labels()
        .iter()
        .map(|label| Span::styled(format!("{label:>2} "), Style::default().fg(palette.gutter_fg)))
        .collect::<Vec<_>>();
    let mut lines = vec![Line::from(header)];
    for week in pane.weeks() {
        let spans = week
            .iter()
            .map(|day| match day {
                Some(date) => Span::styled(format!("{:>2} ", date.day()), day_style(view, *date)),
                None => Span::raw("   "),
            })
            .collect::<Vec<_>>();
        lines.push(Line::from(spans));
    }
    frame.render_widget(Paragraph::new(lines), inner);
}

fn calendar_title(page: MonthPage) -> String {
    match Month::try_from(page.month) {
        Ok(month) => format!(" {month} {} ", page.year),
        Err(_) => format!(" {page} "),
    }
}

fn day_style(view: &DiaryView<'_>, date: CalendarDate) -> Style {
    let palette = &view.palette;
    let annotation = view.calendar.style(date);
    let mut style = Style::default();
    if annotation.contains(DayStyle::HAS_ENTRY) {
        style = style.add_modifier(Modifier::BOLD);
    }
    if annotation.contains(DayStyle::TODAY) {
        style = style.bg(palette.today_bg).fg(palette.today_fg);
    }
    if date == view.calendar.selected() {
        style = style
            .bg(palette.selected_bg)
            .fg(palette.selected_fg)
            .add_modifier(Modifier::UNDERLINED);
    }
    style
}

fn draw_navigation(frame: &mut Frame, view: &DiaryView<'_>, area: Rect) {
    let hint = Style::default().fg(view.palette.gutter_fg);
    let lines = vec![
        Line::from(vec![
            Span::raw(" ◀ "),
            Span::styled("Alt-←", hint),
            Span::raw("  ■ "),
            Span::styled("Ctrl-T", hint),
        ]),
        Line::from(vec![Span::raw(" ▶ "), Span::styled("Alt-→", hint)]),
        Line::from(vec![
            Span::raw(" ⇅ "),
            Span::styled("Alt-PgUp/PgDn", hint),
        ]),
    ];
    frame.render_widget(Paragraph::new(lines), area);
}

fn draw_editor(frame: &mut Frame, view: &DiaryView<'_>, areas: &ScreenAreas) {
    let palette = &view.palette;
    let surface = view.surface;
    let dirty = if surface.is_dirty() { " *" } else { "" };
    let border_style = if view.focus == FocusPane::Editor {
        Style::default().fg(palette.accent)
    } else {
        Style::default()
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style)
        .title(format!(" {}{dirty} ", view.open_date));
    frame.render_widget(block, areas.editor);

    let paint = surface.gutter_paint();
    draw_gutter(frame, &paint, areas.gutter, surface.gutter_width(), palette);

    let text_style = Style::default().fg(palette.text).bg(palette.background);
    let lines_area = areas.text;
    let mut lines = vec![Line::default(); usize::from(lines_area.height)];
    for row in surface.visible_rows() {
        if let Some(slot) = usize::try_from(row.y).ok().and_then(|y| lines.get_mut(y)) {
            *slot = Line::from(Span::styled(row.text, text_style));
        }
    }
    if view.show_marker {
        if let Some(marker) = paint.marker {
            let marker_style = Style::default().add_modifier(Modifier::UNDERLINED);
            if let Some(slot) = usize::try_from(marker.y).ok().and_then(|y| lines.get_mut(y)) {
                let width = usize::try_from(marker.x_end - marker.x_start).unwrap_or(0);
                let text: String = slot
                    .spans
                    .iter()
                    .map(|span| span.content.as_ref())
                    .collect();
                let padded = format!("{text:<width$}");
                *slot = Line::from(Span::styled(padded, text_style.patch(marker_style)));
            }
        }
    }
    frame.render_widget(Paragraph::new(lines), lines_area);

    if view.focus == FocusPane::Editor {
        if let Some(rect) = surface.cursor_rect() {
            let inside = rect.top >= 0
                && rect.left >= 0
                && rect.top < i32::from(lines_area.height)
                && rect.left <= i32::from(lines_area.width);
            if inside {
                frame.set_cursor(
                    lines_area.x + rect.left as u16,
                    lines_area.y + rect.top as u16,
                );
            }
        }
    }
}

fn draw_gutter(
    frame: &mut Frame,
    paint: &gutter::GutterPaint,
    area: Rect,
    digits_width: u16,
    palette: &Palette,
) {
    if area.width == 0 || area.height == 0 {
        return;
    }
    let background = Style::default().bg(palette.gutter_bg).fg(palette.gutter_fg);
    let buffer = frame.buffer_mut();
    buffer.set_style(area, background);
    for y in area.top()..area.bottom() {
        for x in area.left()..area.right() {
            buffer.get_mut(x, y).set_symbol(" ");
        }
    }
    let separator_x = area.right() - 1;
    for y in area.top()..area.bottom() {
        buffer.get_mut(separator_x, y).set_symbol("│");
    }
    let width = usize::from(digits_width.min(area.width.saturating_sub(1)));
    if width == 0 {
        return;
    }
    let marker_row = paint.marker.map(|marker| marker.y);
    for line in &paint.lines {
        if line.top < 0 || line.top >= i32::from(area.height) {
            continue;
        }
        let current = marker_row
            .is_some_and(|row| row >= line.top && row < line.top + line.height);
        let style = if current {
            background.fg(palette.current_line)
        } else {
            background
        };
        let y = area.y + line.top as u16;
        buffer.set_string(area.x, y, gutter::label(line.line_number, width), style);
    }
}

fn draw_status(frame: &mut Frame, view: &DiaryView<'_>, area: Rect) {
    let surface = view.surface;
    let (line, column) = surface.cursor_position();
    let mut spans = vec![
        Span::styled(
            format!(" {} ", view.open_date),
            Style::default()
                .fg(view.palette.selected_fg)
                .bg(view.palette.selected_bg),
        ),
        Span::raw(format!(" Ln {line}, Col {column} · {} lines", surface.line_count())),
    ];
    if surface.is_dirty() {
        spans.push(Span::styled(" · modified", Style::default().fg(view.palette.accent)));
    }
    if let Some(message) = view.status {
        spans.push(Span::raw(" · "));
        spans.push(Span::styled(
            message.to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        ));
    } else {
        spans.push(Span::styled(
            " · F2 focus · Ctrl-S save · Ctrl-W wrap · F12 hide · Ctrl-Q quit",
            Style::default().fg(view.palette.gutter_fg),
        ));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

pub fn contains(area: Rect, column: u16, row: u16) -> bool {
    column >= area.left() && column < area.right() && row >= area.top() && row < area.bottom()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u8, d: u8) -> CalendarDate {
        CalendarDate::new(y, m, d).expect("valid date")
    }

    #[test]
    fn text_area_excludes_gutter_and_borders() {
        let areas = screen_areas(Rect::new(0, 0, 80, 24), 4);
        assert_eq!(areas.editor.x, CALENDAR_WIDTH);
        assert_eq!(areas.gutter.width, 5);
        assert_eq!(areas.text.x, areas.gutter.x + 5);
        assert_eq!(areas.text.width, 80 - CALENDAR_WIDTH - 2 - 5);
        assert_eq!(areas.text.height, 24 - 1 - 2);
        assert_eq!(areas.status.y, 23);
    }

    #[test]
    fn calendar_cells_map_to_days() {
        let pane = CalendarPane::new(date(2024, 2, 10), false);
        let areas = screen_areas(Rect::new(0, 0, 80, 24), 4);
        let cells = calendar_cells(areas.calendar, &pane);
        assert_eq!(cells.len(), 29);
        let (rect, first) = cells[0];
        assert_eq!(first, date(2024, 2, 1));
        assert_eq!(rect.x, 1 + 4 * DAY_CELL_WIDTH);
        assert_eq!(rect.y, 2);
    }

    #[test]
    fn calendar_title_names_the_month() {
        let page = MonthPage::new(2024, 2).expect("page");
        assert_eq!(calendar_title(page), " February 2024 ");
    }
}
