use std::collections::HashMap;

use crate::calendar::{CalendarDate, MonthPage};
use crate::diary::{CalendarAnnotator, DayStyle};

/// Month grid state: the selected day, the page being shown (which may
/// differ while browsing) and the styles handed down by the diary.
#[derive(Debug, Clone)]
pub struct CalendarPane {
    selected: CalendarDate,
    page: MonthPage,
    styles: HashMap<CalendarDate, DayStyle>,
    week_starts_monday: bool,
}

impl CalendarPane {
    pub fn new(selected: CalendarDate, week_starts_monday: bool) -> Self {
        Self {
            selected,
            page: selected.page(),
            styles: HashMap::new(),
            week_starts_monday,
        }
    }

    pub fn selected(&self) -> CalendarDate {
        self.selected
    }

    pub fn page(&self) -> MonthPage {
        self.page
    }

    pub fn style(&self, date: CalendarDate) -> DayStyle {
        self.styles.get(&date).copied().unwrap_or_default()
    }

    /// Selecting a day always brings its month into view.
    pub fn select(&mut self, date: CalendarDate) {
        self.selected = date;
        self.page = date.page();
    }

    pub fn show_page(&mut self, page: MonthPage) {
        self.page = page;
    }

    /// Day `delta` days away from the selection.
    pub fn offset_selection(&self, delta: i32) -> Option<CalendarDate> {
        let mut date = self.selected;
        for _ in 0..delta.unsigned_abs() {
            date = if delta < 0 { date.pred()? } else { date.succ()? };
        }
        Some(date)
    }

    pub fn weekday_labels(&self) -> [&'static str; 7] {
        if self.week_starts_monday {
            ["Mo", "Tu", "We", "Th", "Fr", "Sa", "Su"]
        } else {
            ["Su", "Mo", "Tu", "We", "Th", "Fr", "Sa"]
        }
    }

    /// The displayed month as rows of seven columns.
    pub fn weeks(&self) -> Vec<[Option<CalendarDate>; 7]> {
        let mut weeks = Vec::new();
        let mut week = [None; 7];
        for date in self.page.days() {
            let column = self.column_of(date);
            if column == 0 && week.iter().any(Option::is_some) {
                weeks.push(week);
                week = [None; 7];
            }
            week[column] = Some(date);
        }
        if week.iter().any(Option::is_some) {
            weeks.push(week);
        }
        weeks
    }

    fn column_of(&self, date: CalendarDate) -> usize {
        let from_monday = usize::from(date.weekday_from_monday());
        if self.week_starts_monday {
            from_monday
        } else {
            (from_monday + 1) % 7
        }
    }
}

impl CalendarAnnotator for CalendarPane {
    fn set_day_style(&mut self, date: CalendarDate, style: DayStyle) {
        if style.is_empty() {
            self.styles.remove(&date);
        } else {
            self.styles.insert(date, style);
        }
    }
}
