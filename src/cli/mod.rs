use std::env;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

use crate::app::App;
use crate::config::{ConfigLoader, Settings, CONFIG_ENV, DATA_ENV};
use crate::storage::DiaryStore;

const LOG_FILE: &str = "workdiary.log";

#[derive(Parser, Debug)]
#[command(
    name = "workdiary",
    version,
    about = "Calendar-driven work diary with one plain-text entry per day"
)]
pub struct Cli {
    /// Override the config file location (takes precedence over WORKDIARY_CONFIG)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the data directory (takes precedence over WORKDIARY_DATA)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        env::set_var(CONFIG_ENV, path);
    }
    if let Some(path) = &cli.data_dir {
        env::set_var(DATA_ENV, path);
    }

    let loader = ConfigLoader::discover()?;
    loader.paths().ensure_directories()?;
    let paths = loader.paths().clone();
    init_tracing(&cli.log_level, &paths.log_dir)
        .with_context(|| format!("initialising logging at level {}", cli.log_level))?;
    let config = loader.load_or_init()?;

    let store = DiaryStore::open(&config.storage.entries_dir);
    let settings = Settings::load(&config.storage.settings_file);
    tracing::info!(
        entries = %store.root().display(),
        geometry = ?settings.geometry(),
        "starting workdiary"
    );

    let mut app = App::new(Arc::new(config), store, settings)?;
    let result = app.run();
    if let Err(err) = &result {
        tracing::error!(?err, "workdiary exited with error");
    } else {
        tracing::info!("workdiary closed");
    }
    result
}

/// The terminal belongs to the UI, so events go to a log file; stderr is
/// only used when that file cannot be opened.
fn init_tracing(level: &str, log_dir: &Path) -> Result<()> {
    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_try_init(|| {
        let env_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
        let builder = fmt().with_env_filter(env_filter).with_ansi(false);
        match open_log_file(log_dir) {
            Ok(file) => builder.with_writer(Mutex::new(file)).init(),
            Err(err) => {
                builder.with_writer(std::io::stderr).init();
                tracing::warn!(?err, "log file unavailable, logging to stderr");
            }
        }
        Ok(())
    })
    .map(|_| ())
}

fn open_log_file(log_dir: &Path) -> Result<fs::File> {
    fs::create_dir_all(log_dir)
        .with_context(|| format!("creating log directory {}", log_dir.display()))?;
    let path = log_dir.join(LOG_FILE);
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("opening log file {}", path.display()))
}
