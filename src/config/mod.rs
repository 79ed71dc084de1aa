use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::config::themes::ThemeRegistry;

pub mod settings;
pub mod themes;

pub use settings::{Settings, WindowGeometry};

const APP_DOMAIN: &str = "io";
const APP_ORG: &str = "WorkDiary";
const APP_NAME: &str = "workdiary";

pub const CONFIG_ENV: &str = "WORKDIARY_CONFIG";
pub const DATA_ENV: &str = "WORKDIARY_DATA";

pub struct ConfigLoader {
    paths: ConfigPaths,
}

impl ConfigLoader {
    pub fn discover() -> Result<Self> {
        let paths = ConfigPaths::discover()?;
        Ok(Self { paths })
    }

    pub fn with_paths(paths: ConfigPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &ConfigPaths {
        &self.paths
    }

    pub fn load_or_init(&self) -> Result<AppConfig> {
        self.paths.ensure_directories()?;
        if !self.paths.config_file.exists() {
            let mut default_cfg = AppConfig::default();
            default_cfg.post_load(&self.paths);
            self.write_default_config(&default_cfg)?;
            return Ok(default_cfg);
        }

        self.load()
    }

    pub fn load(&self) -> Result<AppConfig> {
        let raw = fs::read_to_string(&self.paths.config_file)
            .with_context(|| format!("reading config {}", self.paths.config_file.display()))?;
        let mut cfg: AppConfig = toml::from_str(&raw).context("parsing config toml")?;
        cfg.post_load(&self.paths);
        Ok(cfg)
    }

    fn write_default_config(&self, cfg: &AppConfig) -> Result<()> {
        let toml = toml::to_string_pretty(cfg).context("serializing default config")?;
        if let Some(parent) = self.paths.config_file.parent() {
            fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
        let mut file = fs::File::create(&self.paths.config_file)
            .with_context(|| format!("creating config {}", self.paths.config_file.display()))?;
        file.write_all(toml.as_bytes())
            .context("writing default config")?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub config_dir: PathBuf,
    pub config_file: PathBuf,
    /// Window geometry remembered between runs.
    pub settings_file: PathBuf,
    pub data_dir: PathBuf,
    /// Root of the `<year>/<month>/<day>.txt` hierarchy.
    pub entries_dir: PathBuf,
    pub log_dir: PathBuf,
    pub state_dir: PathBuf,
}

impl ConfigPaths {
    pub fn discover() -> Result<Self> {
        let override_config = env::var(CONFIG_ENV).ok().map(PathBuf::from);
        let override_data = env::var(DATA_ENV).ok().map(PathBuf::from);

        let project_dirs = ProjectDirs::from(APP_DOMAIN, APP_ORG, APP_NAME)
            .context("resolving XDG project directories")?;

        let config_dir = override_config
            .clone()
            .map(|p| {
                if p.is_dir() {
                    p
                } else {
                    p.parent().map(Path::to_path_buf).unwrap_or(p)
                }
            })
            .unwrap_or_else(|| project_dirs.config_dir().to_path_buf());

        let config_file = override_config
            .filter(|p| p.is_file() || p.extension().is_some())
            .unwrap_or_else(|| config_dir.join("config.toml"));

        let data_root = override_data.unwrap_or_else(|| project_dirs.data_dir().to_path_buf());
        let state_dir = project_dirs
            .state_dir()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| data_root.join("state"));

        Ok(Self::rooted(config_dir, config_file, data_root, state_dir))
    }

    /// Lays out every derived path below explicit roots.
    pub fn rooted(
        config_dir: PathBuf,
        config_file: PathBuf,
        data_dir: PathBuf,
        state_dir: PathBuf,
    ) -> Self {
        Self {
            settings_file: config_dir.join("workdiary.toml"),
            entries_dir: data_dir.join("data"),
            log_dir: state_dir.join("logs"),
            config_dir,
            config_file,
            data_dir,
            state_dir,
        }
    }

    /// Entry directories are left to the store, which creates them lazily.
    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [
            &self.config_dir,
            &self.data_dir,
            &self.log_dir,
            &self.state_dir,
        ] {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating application directory {}", dir.display()))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub theme: ThemeName,
    pub editor: EditorOptions,
    pub calendar: CalendarOptions,
    pub storage: StorageOptions,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            theme: ThemeName::Light,
            editor: EditorOptions::default(),
            calendar: CalendarOptions::default(),
            storage: StorageOptions::default(),
        }
    }
}

impl AppConfig {
    fn post_load(&mut self, paths: &ConfigPaths) {
        self.storage.resolve(paths);
        if !ThemeRegistry::default().contains(&self.theme) {
            tracing::warn!(?self.theme, "unknown theme in config, falling back to Light");
            self.theme = ThemeName::Light;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorOptions {
    pub soft_wrap: bool,
    /// Underline the row holding the cursor.
    pub current_line_marker: bool,
}

impl Default for EditorOptions {
    fn default() -> Self {
        Self {
            soft_wrap: true,
            current_line_marker: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarOptions {
    pub week_starts_monday: bool,
}

impl Default for CalendarOptions {
    fn default() -> Self {
        Self {
            week_starts_monday: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageOptions {
    #[serde(skip)]
    pub entries_dir: PathBuf,
    #[serde(skip)]
    pub settings_file: PathBuf,
}

impl StorageOptions {
    fn resolve(&mut self, paths: &ConfigPaths) {
        if self.entries_dir.as_os_str().is_empty() {
            self.entries_dir = paths.entries_dir.clone();
        }
        if self.settings_file.as_os_str().is_empty() {
            self.settings_file = paths.settings_file.clone();
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, std::hash::Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ThemeName {
    Light,
    Dark,
    HighContrast,
}

impl Default for ThemeName {
    fn default() -> Self {
        ThemeName::Light
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn temp_paths(root: &TempDir) -> ConfigPaths {
        let base = root.path();
        let config_dir = base.join("config");
        ConfigPaths::rooted(
            config_dir.clone(),
            config_dir.join("config.toml"),
            base.join("share"),
            base.join("state"),
        )
    }

    #[test]
    fn first_run_writes_default_config() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let loader = ConfigLoader::with_paths(temp_paths(&temp));
        let cfg = loader.load_or_init()?;
        assert!(loader.paths().config_file.is_file());
        assert!(cfg.editor.soft_wrap);
        assert_eq!(cfg.storage.entries_dir, temp.path().join("share").join("data"));
        assert!(!cfg.storage.entries_dir.exists());
        Ok(())
    }

    #[test]
    fn partial_config_keeps_defaults() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let paths = temp_paths(&temp);
        paths.ensure_directories()?;
        fs::write(
            &paths.config_file,
            "theme = \"dark\"\n[editor]\nsoft_wrap = false\n",
        )?;
        let cfg = ConfigLoader::with_paths(paths).load()?;
        assert_eq!(cfg.theme, ThemeName::Dark);
        assert!(!cfg.editor.soft_wrap);
        assert!(cfg.editor.current_line_marker);
        assert!(!cfg.calendar.week_starts_monday);
        Ok(())
    }

    #[test]
    fn settings_file_sits_beside_config() {
        let temp = TempDir::new().expect("tempdir");
        let paths = temp_paths(&temp);
        assert_eq!(
            paths.settings_file,
            temp.path().join("config").join("workdiary.toml")
        );
        assert_eq!(paths.log_dir, temp.path().join("state").join("logs"));
    }
}
