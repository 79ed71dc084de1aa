use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;

use crate::calendar::{CalendarDate, InvalidDate, MonthPage};

const ENTRY_EXTENSION: &str = "txt";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("creating entry directory {path}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("writing entry {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("reading entry {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("removing entry {path}")]
    Remove {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("inspecting entry {path}")]
    Inspect {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressParseError {
    #[error("storage address must have three components, got {0:?}")]
    Shape(String),
    #[error("storage address component {0:?} is not a plain decimal number")]
    Component(String),
    #[error(transparent)]
    Date(#[from] InvalidDate),
}

/// Location of one day's entry below the data root: `<year>/<month>/<day>`,
/// plain decimal, no zero padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StorageAddress {
    date: CalendarDate,
}

impl StorageAddress {
    pub fn of(date: CalendarDate) -> Self {
        Self { date }
    }

    pub fn date(&self) -> CalendarDate {
        self.date
    }

    pub fn parse(raw: &str) -> Result<Self, AddressParseError> {
        let parts: Vec<&str> = raw.split('/').collect();
        let [year, month, day] = parts.as_slice() else {
            return Err(AddressParseError::Shape(raw.to_string()));
        };
        let date = CalendarDate::new(
            parse_component(year)?,
            parse_component(month)?,
            parse_component(day)?,
        )?;
        Ok(Self::of(date))
    }

    pub fn relative_path(&self) -> PathBuf {
        PathBuf::from(self.date.year().to_string())
            .join(self.date.month().to_string())
            .join(format!("{}.{ENTRY_EXTENSION}", self.date.day()))
    }
}

impl fmt::Display for StorageAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.date.year(),
            self.date.month(),
            self.date.day()
        )
    }
}

impl FromStr for StorageAddress {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn parse_component<T: FromStr>(raw: &str) -> Result<T, AddressParseError> {
    let canonical = !raw.is_empty()
        && raw.chars().all(|ch| ch.is_ascii_digit() || ch == '-')
        && (raw == "0" || !raw.trim_start_matches('-').starts_with('0'));
    if !canonical {
        return Err(AddressParseError::Component(raw.to_string()));
    }
    raw.parse()
        .map_err(|_| AddressParseError::Component(raw.to_string()))
}

/// One day's note as held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiaryEntry {
    pub date: CalendarDate,
    pub text: String,
}

impl DiaryEntry {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Date-addressed entry persistence as seen by the diary controller.
pub trait EntryStore {
    fn load(&self, date: CalendarDate) -> StorageResult<String>;
    fn save(&self, date: CalendarDate, text: &str) -> StorageResult<()>;
    fn exists(&self, date: CalendarDate) -> StorageResult<bool>;
    fn delete(&self, date: CalendarDate) -> StorageResult<()>;

    /// Days of `page` that currently hold an entry, one existence check per
    /// day.
    fn month_entries(&self, page: MonthPage) -> StorageResult<Vec<CalendarDate>> {
        let mut present = Vec::new();
        for date in page.days() {
            if self.exists(date)? {
                present.push(date);
            }
        }
        Ok(present)
    }
}

impl EntryStore for DiaryStore {
    fn load(&self, date: CalendarDate) -> StorageResult<String> {
        DiaryStore::load(self, date)
    }

    fn save(&self, date: CalendarDate, text: &str) -> StorageResult<()> {
        DiaryStore::save(self, date, text)
    }

    fn exists(&self, date: CalendarDate) -> StorageResult<bool> {
        DiaryStore::exists(self, date)
    }

    fn delete(&self, date: CalendarDate) -> StorageResult<()> {
        DiaryStore::delete(self, date)
    }
}

/// Stateless gateway from calendar dates to plain-text files under a data
/// root. A record exists exactly when non-empty text was last saved.
#[derive(Debug, Clone)]
pub struct DiaryStore {
    root: Arc<PathBuf>,
}

impl DiaryStore {
    /// The root directory is not created here; directories appear on the
    /// first save below them.
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Arc::new(root.into()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn address(&self, date: CalendarDate) -> StorageAddress {
        StorageAddress::of(date)
    }

    pub fn path_for(&self, date: CalendarDate) -> PathBuf {
        self.root.join(self.address(date).relative_path())
    }

    pub fn save(&self, date: CalendarDate, text: &str) -> StorageResult<()> {
        if text.is_empty() {
            return self.delete(date);
        }
        let path = self.path_for(date);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| StorageError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(&path, text).map_err(|source| StorageError::Write {
            path: path.clone(),
            source,
        })?;
        tracing::debug!(%date, bytes = text.len(), "saved diary entry");
        Ok(())
    }

    pub fn load(&self, date: CalendarDate) -> StorageResult<String> {
        let path = self.path_for(date);
        match fs::read_to_string(&path) {
            Ok(text) => Ok(text),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(String::new()),
            Err(source) => Err(StorageError::Read { path, source }),
        }
    }

    /// Metadata-only check; the file content is never read.
    pub fn exists(&self, date: CalendarDate) -> StorageResult<bool> {
        let path = self.path_for(date);
        match fs::metadata(&path) {
            Ok(meta) => Ok(meta.is_file()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(StorageError::Inspect { path, source }),
        }
    }

    pub fn delete(&self, date: CalendarDate) -> StorageResult<()> {
        let path = self.path_for(date);
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!(%date, "removed empty diary entry");
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Remove { path, source }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::collections::HashSet;
    use tempfile::TempDir;

    fn date(y: i32, m: u8, d: u8) -> CalendarDate {
        CalendarDate::new(y, m, d).expect("valid date")
    }

    fn init_store() -> (TempDir, DiaryStore) {
        let temp = TempDir::new().expect("tempdir");
        let store = DiaryStore::open(temp.path().join("data"));
        (temp, store)
    }

    #[test]
    fn save_then_load_round_trips_verbatim() -> anyhow::Result<()> {
        let (_temp, store) = init_store();
        let day = date(2024, 3, 9);
        let text = "line one\r\n\tindented\n\n  trailing spaces  \nno newline";
        store.save(day, text)?;
        assert_eq!(store.load(day)?, text);
        assert!(store.exists(day)?);
        Ok(())
    }

    #[test]
    fn save_writes_unpadded_hierarchy() -> anyhow::Result<()> {
        let (temp, store) = init_store();
        store.save(date(2024, 3, 9), "x")?;
        let expected = temp.path().join("data").join("2024").join("3").join("9.txt");
        assert!(expected.is_file(), "expected {}", expected.display());
        assert_eq!(fs::read_to_string(expected)?, "x");
        Ok(())
    }

    #[test]
    fn empty_save_removes_existing_record() -> anyhow::Result<()> {
        let (_temp, store) = init_store();
        let day = date(2024, 5, 1);
        store.save(day, "draft")?;
        store.save(day, "")?;
        assert!(!store.exists(day)?);
        assert_eq!(store.load(day)?, "");
        Ok(())
    }

    #[test]
    fn deleting_missing_record_is_noop() -> anyhow::Result<()> {
        let (_temp, store) = init_store();
        let day = date(2024, 5, 2);
        store.delete(day)?;
        store.save(day, "")?;
        assert!(!store.exists(day)?);
        Ok(())
    }

    #[test]
    fn missing_record_loads_empty() -> anyhow::Result<()> {
        let (_temp, store) = init_store();
        assert_eq!(store.load(date(1999, 12, 31))?, "");
        Ok(())
    }

    #[test]
    fn overwrite_is_last_writer_wins() -> anyhow::Result<()> {
        let (_temp, store) = init_store();
        let day = date(2024, 6, 10);
        store.save(day, "a much longer first version")?;
        store.save(day, "short")?;
        assert_eq!(store.load(day)?, "short");
        Ok(())
    }

    #[test]
    fn write_failure_surfaces_as_storage_error() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let blocker = temp.path().join("data");
        fs::write(&blocker, "not a directory")?;
        let store = DiaryStore::open(&blocker);
        let result = store.save(date(2024, 1, 1), "text");
        assert_matches!(result, Err(StorageError::CreateDir { .. }));
        Ok(())
    }

    #[test]
    fn unremovable_record_surfaces_remove_error() -> anyhow::Result<()> {
        let (_temp, store) = init_store();
        let day = date(2024, 1, 1);
        fs::create_dir_all(store.path_for(day))?;
        let result = store.save(day, "");
        assert_matches!(result, Err(StorageError::Remove { .. }));
        Ok(())
    }

    #[test]
    fn uninspectable_record_surfaces_inspect_error() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let blocker = temp.path().join("data");
        fs::write(&blocker, "not a directory")?;
        let store = DiaryStore::open(&blocker);
        let result = store.exists(date(2024, 1, 1));
        assert_matches!(result, Err(StorageError::Inspect { path, .. }) if path == store.path_for(date(2024, 1, 1)));
        Ok(())
    }

    #[test]
    fn addresses_are_distinct_across_a_leap_year() {
        let page = MonthPage::new(2024, 1).expect("page");
        let mut seen = HashSet::new();
        for offset in 0..12 {
            let month = page.shift(offset).expect("month");
            for day in month.days() {
                let address = StorageAddress::of(day).to_string();
                assert!(seen.insert(address.clone()), "collision at {address}");
            }
        }
        assert_eq!(seen.len(), 366);
        assert!(seen.contains("2024/1/11"));
        assert!(seen.contains("2024/11/1"));
    }

    #[test]
    fn address_parse_rejects_padding_and_bad_dates() {
        let parsed: StorageAddress = "2024/2/29".parse().expect("parse");
        assert_eq!(parsed.date(), date(2024, 2, 29));
        assert_matches!(
            StorageAddress::parse("2024/02/29"),
            Err(AddressParseError::Component(_))
        );
        assert_matches!(
            StorageAddress::parse("2023/2/29"),
            Err(AddressParseError::Date(_))
        );
        assert_matches!(StorageAddress::parse("2024/2"), Err(AddressParseError::Shape(_)));
    }

    #[test]
    fn month_entries_lists_only_saved_days() -> anyhow::Result<()> {
        let (_temp, store) = init_store();
        store.save(date(2024, 2, 3), "a")?;
        store.save(date(2024, 2, 29), "b")?;
        store.save(date(2024, 3, 1), "other month")?;
        let page = MonthPage::new(2024, 2).expect("page");
        assert_eq!(
            store.month_entries(page)?,
            vec![date(2024, 2, 3), date(2024, 2, 29)]
        );
        Ok(())
    }
}
