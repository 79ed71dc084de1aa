pub mod app;
pub mod calendar;
pub mod cli;
pub mod config;
pub mod diary;
pub mod editor;
pub mod storage;
pub mod ui;

pub use config::{AppConfig, ConfigLoader, ConfigPaths};
pub use diary::{DiaryController, DiaryEvent};
pub use storage::{DiaryStore, StorageError};
