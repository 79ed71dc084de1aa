use bitflags::bitflags;

use crate::calendar::{CalendarDate, MonthPage};
use crate::editor::{EditKey, EditingSurface, FontMetrics, Viewport};
use crate::storage::{DiaryEntry, DiaryStore, EntryStore, StorageResult};

bitflags! {
    /// Visual layers a calendar day can carry. Both may apply at once.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct DayStyle: u8 {
        const HAS_ENTRY = 1;
        const TODAY = 1 << 1;
    }
}

/// Receiver of per-day styles, implemented by whatever draws the calendar.
pub trait CalendarAnnotator {
    fn set_day_style(&mut self, date: CalendarDate, style: DayStyle);
}

pub enum DiaryEvent<'a> {
    DateChanged(CalendarDate),
    PageChanged(MonthPage),
    KeyTyped(EditKey),
    Click { row: u16, col: u16 },
    PaintRequested(Viewport),
    FontChanged(&'a dyn FontMetrics),
    SaveRequested,
}

/// The open diary session: which day is being edited, which month page is
/// displayed, and the editing surface holding that day's text.
pub struct DiaryController<S: EntryStore = DiaryStore> {
    store: S,
    current: CalendarDate,
    page: MonthPage,
    surface: EditingSurface,
    clock: fn() -> CalendarDate,
}

impl<S: EntryStore> DiaryController<S> {
    /// Loads `date` into a fresh surface and annotates its month.
    pub fn open(
        store: S,
        date: CalendarDate,
        calendar: &mut dyn CalendarAnnotator,
    ) -> StorageResult<Self> {
        Self::open_with_clock(store, date, calendar, CalendarDate::today)
    }

    pub fn open_with_clock(
        store: S,
        date: CalendarDate,
        calendar: &mut dyn CalendarAnnotator,
        clock: fn() -> CalendarDate,
    ) -> StorageResult<Self> {
        let mut surface = EditingSurface::new();
        surface.set_text(store.load(date)?);
        let controller = Self {
            store,
            current: date,
            page: date.page(),
            surface,
            clock,
        };
        controller.annotate_month(controller.page, calendar)?;
        tracing::info!(%date, "opened diary");
        Ok(controller)
    }

    pub fn current_date(&self) -> CalendarDate {
        self.current
    }

    pub fn displayed_page(&self) -> MonthPage {
        self.page
    }

    pub fn surface(&self) -> &EditingSurface {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut EditingSurface {
        &mut self.surface
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn current_entry(&self) -> DiaryEntry {
        DiaryEntry {
            date: self.current,
            text: self.surface.text().to_string(),
        }
    }

    pub fn handle(
        &mut self,
        event: DiaryEvent<'_>,
        calendar: &mut dyn CalendarAnnotator,
    ) -> StorageResult<()> {
        match event {
            DiaryEvent::DateChanged(date) => self.change_date(date, calendar),
            DiaryEvent::PageChanged(page) => {
                self.page = page;
                self.annotate_month(page, calendar)
            }
            DiaryEvent::KeyTyped(key) => {
                self.surface.handle_key(key);
                Ok(())
            }
            DiaryEvent::Click { row, col } => {
                self.surface.click(row, col);
                Ok(())
            }
            DiaryEvent::PaintRequested(viewport) => {
                self.surface.prepare(viewport);
                Ok(())
            }
            DiaryEvent::FontChanged(metrics) => {
                self.surface.set_font(metrics);
                Ok(())
            }
            DiaryEvent::SaveRequested => {
                self.save_current()?;
                self.annotate_month(self.page, calendar)
            }
        }
    }

    /// Save the open day, load `date` in its place and refresh the month.
    /// When the save or the load fails nothing changes: the open day and
    /// its unsaved text stay put and the next transition saves again.
    pub fn change_date(
        &mut self,
        date: CalendarDate,
        calendar: &mut dyn CalendarAnnotator,
    ) -> StorageResult<()> {
        if date == self.current {
            return Ok(());
        }
        self.save_current()?;
        let text = self.store.load(date)?;
        let previous = std::mem::replace(&mut self.current, date);
        self.surface.set_text(text);
        self.page = date.page();
        tracing::info!(from = %previous, to = %date, "switched diary day");
        self.annotate_month(self.page, calendar)
    }

    /// Styles every day of `page`: one existence check per day, plus the
    /// today marker.
    pub fn annotate_month(
        &self,
        page: MonthPage,
        calendar: &mut dyn CalendarAnnotator,
    ) -> StorageResult<()> {
        let today = (self.clock)();
        let with_entries = self.store.month_entries(page)?;
        for date in page.days() {
            let mut style = DayStyle::empty();
            if with_entries.contains(&date) {
                style |= DayStyle::HAS_ENTRY;
            }
            if date == today {
                style |= DayStyle::TODAY;
            }
            calendar.set_day_style(date, style);
        }
        tracing::debug!(%page, with_entries = with_entries.len(), "annotated month");
        Ok(())
    }

    /// Saves unconditionally so that an emptied entry loses its file.
    pub fn save_current(&mut self) -> StorageResult<()> {
        self.store.save(self.current, self.surface.text())?;
        self.surface.mark_clean();
        Ok(())
    }

    pub fn shutdown(&mut self) -> StorageResult<()> {
        self.save_current()?;
        tracing::info!(date = %self.current, "closed diary");
        Ok(())
    }
}
