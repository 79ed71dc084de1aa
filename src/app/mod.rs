use std::io::Stdout;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::Rect;
use ratatui::Terminal;

use crate::calendar::CalendarDate;
use crate::config::themes::{Palette, ThemeRegistry};
use crate::config::{AppConfig, Settings, WindowGeometry};
use crate::diary::{DiaryController, DiaryEvent};
use crate::editor::{CellMetrics, EditKey, Viewport};
use crate::storage::{DiaryStore, StorageError};
use crate::ui::{self, DiaryView, FocusPane, ScreenAreas};

pub mod calendar;

pub use calendar::CalendarPane;

const STATUS_TTL: Duration = Duration::from_secs(4);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Quit,
    ToggleHidden,
    Save,
    ToggleWrap,
    ToggleFocus,
    PreviousDay,
    NextDay,
    Today,
    PreviousPage,
    NextPage,
}

struct StatusMessage {
    text: String,
    expires_at: Instant,
}

pub struct App {
    pub config: Arc<AppConfig>,
    controller: DiaryController,
    calendar: CalendarPane,
    settings: Settings,
    palette: Palette,
    focus: FocusPane,
    hidden: bool,
    status: Option<StatusMessage>,
    areas: ScreenAreas,
    should_quit: bool,
    quit_pending: bool,
    needs_draw: bool,
    tick_rate: Duration,
}

impl App {
    pub fn new(config: Arc<AppConfig>, store: DiaryStore, settings: Settings) -> Result<Self> {
        let today = CalendarDate::today();
        let mut calendar = CalendarPane::new(today, config.calendar.week_starts_monday);
        let mut controller = DiaryController::open(store, today, &mut calendar)
            .with_context(|| format!("opening diary entry for {today}"))?;
        controller.surface_mut().set_soft_wrap(config.editor.soft_wrap);
        controller
            .handle(DiaryEvent::FontChanged(&CellMetrics), &mut calendar)
            .context("applying terminal font metrics")?;
        let palette = ThemeRegistry::default().palette(&config.theme);
        Ok(Self {
            config,
            controller,
            calendar,
            settings,
            palette,
            focus: FocusPane::Editor,
            hidden: false,
            status: None,
            areas: ScreenAreas::default(),
            should_quit: false,
            quit_pending: false,
            needs_draw: true,
            tick_rate: Duration::from_millis(250),
        })
    }

    pub fn run(&mut self) -> Result<()> {
        let mut terminal = setup_terminal()?;
        let result = self.event_loop(&mut terminal);
        let size = terminal.size().ok();
        let restored = restore_terminal(&mut terminal);
        if let Err(err) = &restored {
            tracing::error!(?err, "failed to restore terminal");
        }
        self.finish(size);
        result.and(restored)
    }

    /// Runs once the loop has ended. A loop that broke off on an error never
    /// went through quit, so the open day is saved here.
    fn finish(&mut self, size: Option<Rect>) {
        if !self.should_quit {
            match self.controller.shutdown() {
                Ok(()) => tracing::info!("saved open entry after event loop ended"),
                Err(err) => tracing::error!(?err, "open entry could not be saved on exit"),
            }
        }
        if let Some(size) = size {
            self.persist_geometry(size);
        }
    }

    pub fn controller(&self) -> &DiaryController {
        &self.controller
    }

    pub fn calendar(&self) -> &CalendarPane {
        &self.calendar
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn status_message(&self) -> Option<&str> {
        self.status.as_ref().map(|status| status.text.as_str())
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let mut last_tick = Instant::now();
        loop {
            let size = terminal.size().context("querying terminal size")?;
            self.layout_frame(size);
            let repaint = self.controller.surface_mut().take_repaint();
            if self.needs_draw || !repaint.is_empty() {
                terminal
                    .draw(|frame| self.draw(frame))
                    .context("rendering frame")?;
                self.needs_draw = false;
            }

            if self.should_quit {
                break;
            }

            let timeout = self
                .tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_millis(0));

            if event::poll(timeout).context("polling for terminal events")? {
                match event::read().context("reading terminal event")? {
                    Event::Key(key) => self.handle_key(key),
                    Event::Mouse(mouse) => self.handle_mouse(mouse),
                    Event::Resize(_, _) => self.needs_draw = true,
                    _ => {}
                }
            }

            if last_tick.elapsed() >= self.tick_rate {
                self.on_tick();
                last_tick = Instant::now();
            }
        }
        Ok(())
    }

    /// Sizes the editor for the text area of the coming frame.
    fn layout_frame(&mut self, size: Rect) {
        let areas = ui::screen_areas(size, self.controller.surface().gutter_width());
        if areas.text != self.areas.text {
            self.needs_draw = true;
        }
        self.areas = areas;
        let viewport = Viewport {
            width: areas.text.width,
            height: areas.text.height,
        };
        if let Err(err) = self
            .controller
            .handle(DiaryEvent::PaintRequested(viewport), &mut self.calendar)
        {
            self.report_storage_error("preparing layout", err);
        }
    }

    fn draw(&self, frame: &mut ratatui::Frame) {
        if self.hidden {
            ui::draw_hidden(frame, &self.palette);
            return;
        }
        let view = DiaryView {
            surface: self.controller.surface(),
            calendar: &self.calendar,
            open_date: self.controller.current_date(),
            focus: self.focus,
            status: self.status_message(),
            palette: self.palette,
            show_marker: self.config.editor.current_line_marker,
        };
        ui::draw_app(frame, &view, &self.areas);
    }

    fn on_tick(&mut self) {
        let expired = self
            .status
            .as_ref()
            .is_some_and(|status| status.expires_at <= Instant::now());
        if expired {
            self.status = None;
            self.needs_draw = true;
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        self.needs_draw = true;

        if let Some(action) = global_action(&key) {
            if self.hidden && !matches!(action, Action::Quit | Action::ToggleHidden) {
                return;
            }
            self.handle_action(action);
            return;
        }
        if self.hidden {
            return;
        }

        match self.focus {
            FocusPane::Calendar => self.handle_calendar_key(key),
            FocusPane::Editor => {
                if let Some(edit) = edit_key(&key) {
                    self.dispatch(DiaryEvent::KeyTyped(edit), "editing");
                }
            }
        }
    }

    fn handle_action(&mut self, action: Action) {
        if action != Action::Quit {
            self.quit_pending = false;
        }
        match action {
            Action::Quit => self.quit(),
            Action::ToggleHidden => self.hidden = !self.hidden,
            Action::Save => {
                if self.dispatch(DiaryEvent::SaveRequested, "saving entry") {
                    let entry = self.controller.current_entry();
                    self.set_status(if entry.is_empty() {
                        format!("Cleared {}", entry.date)
                    } else {
                        format!("Saved {}", entry.date)
                    });
                }
            }
            Action::ToggleWrap => {
                let surface = self.controller.surface_mut();
                let enabled = !surface.soft_wrap();
                surface.set_soft_wrap(enabled);
                self.set_status(if enabled {
                    "Soft wrap on"
                } else {
                    "Soft wrap off"
                });
            }
            Action::ToggleFocus => {
                self.focus = match self.focus {
                    FocusPane::Calendar => FocusPane::Editor,
                    FocusPane::Editor => FocusPane::Calendar,
                };
            }
            Action::PreviousDay => {
                if let Some(date) = self.controller.current_date().pred() {
                    self.select_date(date);
                }
            }
            Action::NextDay => {
                if let Some(date) = self.controller.current_date().succ() {
                    self.select_date(date);
                }
            }
            Action::Today => self.select_date(CalendarDate::today()),
            Action::PreviousPage => self.shift_page(-1),
            Action::NextPage => self.shift_page(1),
        }
    }

    fn handle_calendar_key(&mut self, key: KeyEvent) {
        let delta = match key.code {
            KeyCode::Left => -1,
            KeyCode::Right => 1,
            KeyCode::Up => -7,
            KeyCode::Down => 7,
            KeyCode::PageUp => return self.shift_page(-1),
            KeyCode::PageDown => return self.shift_page(1),
            KeyCode::Char('[') | KeyCode::Char(']') => {
                let months = if key.code == KeyCode::Char('[') { -1 } else { 1 };
                if let Some(date) = self.calendar.selected().shift_months(months) {
                    self.select_date(date);
                }
                return;
            }
            KeyCode::Enter | KeyCode::Esc => {
                self.focus = FocusPane::Editor;
                return;
            }
            _ => return,
        };
        if let Some(date) = self.calendar.offset_selection(delta) {
            self.select_date(date);
        }
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) {
        if self.hidden {
            return;
        }
        let (column, row) = (mouse.column, mouse.row);
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                self.needs_draw = true;
                if ui::contains(self.areas.text, column, row) {
                    self.focus = FocusPane::Editor;
                    let click = DiaryEvent::Click {
                        row: row - self.areas.text.y,
                        col: column - self.areas.text.x,
                    };
                    self.dispatch(click, "placing cursor");
                    return;
                }
                let hit = ui::calendar_cells(self.areas.calendar, &self.calendar)
                    .into_iter()
                    .find(|(cell, _)| ui::contains(*cell, column, row));
                if let Some((_, date)) = hit {
                    self.focus = FocusPane::Calendar;
                    self.select_date(date);
                }
            }
            MouseEventKind::ScrollUp if ui::contains(self.areas.text, column, row) => {
                self.dispatch(DiaryEvent::KeyTyped(EditKey::Up), "scrolling");
            }
            MouseEventKind::ScrollDown if ui::contains(self.areas.text, column, row) => {
                self.dispatch(DiaryEvent::KeyTyped(EditKey::Down), "scrolling");
            }
            _ => {}
        }
    }

    /// Moves the selection; the calendar follows the open day, so a failed
    /// switch leaves it on the day still being edited.
    fn select_date(&mut self, date: CalendarDate) {
        self.dispatch(DiaryEvent::DateChanged(date), "switching day");
        let current = self.controller.current_date();
        self.calendar.select(current);
    }

    fn shift_page(&mut self, delta: i32) {
        let Some(page) = self.calendar.page().shift(delta) else {
            return;
        };
        self.calendar.show_page(page);
        self.dispatch(DiaryEvent::PageChanged(page), "annotating month");
    }

    /// Saves the open day before leaving. A failed save keeps the app
    /// running with the error shown; asking again quits regardless.
    fn quit(&mut self) {
        match self.controller.shutdown() {
            Ok(()) => self.should_quit = true,
            Err(err) if self.quit_pending => {
                tracing::error!(?err, "quitting with unsaved diary entry");
                self.should_quit = true;
            }
            Err(err) => {
                self.report_storage_error("saving before quit", err);
                self.set_status("Save failed; press Ctrl-Q again to quit without saving");
                self.quit_pending = true;
            }
        }
    }

    fn dispatch(&mut self, event: DiaryEvent<'_>, what: &str) -> bool {
        match self.controller.handle(event, &mut self.calendar) {
            Ok(()) => true,
            Err(err) => {
                self.report_storage_error(what, err);
                false
            }
        }
    }

    fn report_storage_error(&mut self, what: &str, err: StorageError) {
        tracing::error!(?err, what, "diary storage failure");
        self.set_status(format!("Error {what}: {err}"));
    }

    fn set_status(&mut self, text: impl Into<String>) {
        self.status = Some(StatusMessage {
            text: text.into(),
            expires_at: Instant::now() + STATUS_TTL,
        });
        self.needs_draw = true;
    }

    /// Width and height become the terminal size; the position has no
    /// terminal counterpart and is written back as read.
    fn persist_geometry(&mut self, size: Rect) {
        let previous = self.settings.geometry();
        let geometry = WindowGeometry {
            width: i32::from(size.width),
            height: i32::from(size.height),
            ..previous
        };
        if let Err(err) = self.settings.set_geometry(geometry).save() {
            tracing::warn!(?err, path = %self.settings.path().display(), "failed to persist window geometry");
        } else {
            tracing::debug!(?geometry, "persisted window geometry");
        }
    }
}

fn global_action(key: &KeyEvent) -> Option<Action> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let alt = key.modifiers.contains(KeyModifiers::ALT);
    match key.code {
        KeyCode::Char('q') if ctrl => Some(Action::Quit),
        KeyCode::Char('s') if ctrl => Some(Action::Save),
        KeyCode::Char('w') if ctrl => Some(Action::ToggleWrap),
        KeyCode::Char('t') if ctrl => Some(Action::Today),
        KeyCode::F(12) => Some(Action::ToggleHidden),
        KeyCode::F(2) => Some(Action::ToggleFocus),
        KeyCode::Left if alt => Some(Action::PreviousDay),
        KeyCode::Right if alt => Some(Action::NextDay),
        KeyCode::PageUp if alt => Some(Action::PreviousPage),
        KeyCode::PageDown if alt => Some(Action::NextPage),
        _ => None,
    }
}

fn edit_key(key: &KeyEvent) -> Option<EditKey> {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('z') => Some(EditKey::Undo),
            KeyCode::Char('y') => Some(EditKey::Redo),
            KeyCode::Left => Some(EditKey::WordLeft),
            KeyCode::Right => Some(EditKey::WordRight),
            _ => None,
        };
    }
    match key.code {
        KeyCode::Char(ch)
            if !key
                .modifiers
                .intersects(KeyModifiers::ALT | KeyModifiers::SUPER) =>
        {
            Some(EditKey::Char(ch))
        }
        KeyCode::Enter => Some(EditKey::Enter),
        KeyCode::Tab => Some(EditKey::Tab),
        KeyCode::Backspace => Some(EditKey::Backspace),
        KeyCode::Delete => Some(EditKey::Delete),
        KeyCode::Left => Some(EditKey::Left),
        KeyCode::Right => Some(EditKey::Right),
        KeyCode::Up => Some(EditKey::Up),
        KeyCode::Down => Some(EditKey::Down),
        KeyCode::Home => Some(EditKey::Home),
        KeyCode::End => Some(EditKey::End),
        KeyCode::PageUp => Some(EditKey::PageUp),
        KeyCode::PageDown => Some(EditKey::PageDown),
        _ => None,
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().context("enabling raw mode")?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)
        .context("switching to alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("creating terminal backend")?;
    terminal.hide_cursor().context("hiding cursor")?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    terminal.show_cursor().ok();
    disable_raw_mode().context("disabling raw mode")?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )
    .context("restoring screen state")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn press(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    fn test_app(temp: &TempDir) -> App {
        let store = DiaryStore::open(temp.path().join("data"));
        let settings = Settings::load(temp.path().join("workdiary.toml"));
        let mut app = App::new(Arc::new(AppConfig::default()), store, settings).expect("app");
        app.layout_frame(Rect::new(0, 0, 80, 24));
        app
    }

    fn type_text(app: &mut App, text: &str) {
        for ch in text.chars() {
            app.handle_key(press(KeyCode::Char(ch), KeyModifiers::NONE));
        }
    }

    #[test]
    fn global_keys_map_to_actions() {
        assert_eq!(
            global_action(&press(KeyCode::Char('q'), KeyModifiers::CONTROL)),
            Some(Action::Quit)
        );
        assert_eq!(
            global_action(&press(KeyCode::Left, KeyModifiers::ALT)),
            Some(Action::PreviousDay)
        );
        assert_eq!(global_action(&press(KeyCode::Char('q'), KeyModifiers::NONE)), None);
        assert_eq!(
            edit_key(&press(KeyCode::Char('z'), KeyModifiers::CONTROL)),
            Some(EditKey::Undo)
        );
        assert_eq!(
            edit_key(&press(KeyCode::Char('Q'), KeyModifiers::SHIFT)),
            Some(EditKey::Char('Q'))
        );
    }

    #[test]
    fn next_day_saves_typed_text() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let mut app = test_app(&temp);
        let today = app.controller().current_date();
        type_text(&mut app, "standup");
        app.handle_key(press(KeyCode::Right, KeyModifiers::ALT));

        let stored = app.controller().store().path_for(today);
        assert_eq!(fs::read_to_string(stored)?, "standup");
        assert_eq!(Some(app.controller().current_date()), today.succ());
        assert_eq!(app.calendar().selected(), app.controller().current_date());
        Ok(())
    }

    #[test]
    fn calendar_keys_move_the_open_day() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let mut app = test_app(&temp);
        let start = app.controller().current_date();
        app.handle_key(press(KeyCode::F(2), KeyModifiers::NONE));
        app.handle_key(press(KeyCode::Down, KeyModifiers::NONE));
        let week_later = (0..7).try_fold(start, |date, _| date.succ());
        assert_eq!(Some(app.controller().current_date()), week_later);

        app.handle_key(press(KeyCode::Char(']'), KeyModifiers::NONE));
        let month_later = week_later.and_then(|date| date.shift_months(1));
        assert_eq!(Some(app.controller().current_date()), month_later);
        assert_eq!(app.calendar().page(), app.controller().current_date().page());
        Ok(())
    }

    #[test]
    fn hidden_screen_ignores_editing() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let mut app = test_app(&temp);
        app.handle_key(press(KeyCode::F(12), KeyModifiers::NONE));
        assert!(app.is_hidden());
        type_text(&mut app, "ignored");
        assert_eq!(app.controller().surface().text(), "");
        app.handle_key(press(KeyCode::F(12), KeyModifiers::NONE));
        assert!(!app.is_hidden());
        Ok(())
    }

    #[test]
    fn quit_saves_entry() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let mut app = test_app(&temp);
        let today = app.controller().current_date();
        type_text(&mut app, "wrap up");
        app.handle_key(press(KeyCode::Char('q'), KeyModifiers::CONTROL));
        assert!(app.should_quit());
        assert!(app.controller().store().path_for(today).is_file());
        Ok(())
    }

    #[test]
    fn aborted_loop_still_saves_entry() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let mut app = test_app(&temp);
        let today = app.controller().current_date();
        type_text(&mut app, "x");
        app.finish(Some(Rect::new(0, 0, 90, 25)));

        let stored = app.controller().store().path_for(today);
        assert_eq!(fs::read_to_string(stored)?, "x");
        let geometry = Settings::load(temp.path().join("workdiary.toml")).geometry();
        assert_eq!((geometry.width, geometry.height), (90, 25));
        Ok(())
    }

    #[test]
    fn failed_quit_save_needs_second_request() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let mut app = test_app(&temp);
        fs::write(temp.path().join("data"), "not a directory")?;
        type_text(&mut app, "lost");
        app.handle_key(press(KeyCode::Char('q'), KeyModifiers::CONTROL));
        assert!(!app.should_quit());
        assert!(app.status_message().is_some());
        app.handle_key(press(KeyCode::Char('q'), KeyModifiers::CONTROL));
        assert!(app.should_quit());
        Ok(())
    }

    #[test]
    fn geometry_keeps_position_and_takes_terminal_size() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("workdiary.toml");
        fs::write(&path, "[geometry]\nx = 5\ny = 6\n")?;
        let store = DiaryStore::open(temp.path().join("data"));
        let mut app = App::new(Arc::new(AppConfig::default()), store, Settings::load(&path))?;
        app.persist_geometry(Rect::new(0, 0, 100, 30));
        assert_eq!(
            Settings::load(&path).geometry(),
            WindowGeometry {
                x: 5,
                y: 6,
                width: 100,
                height: 30
            }
        );
        Ok(())
    }
}
