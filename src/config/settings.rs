use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use toml::{Table, Value};

const GEOMETRY_SECTION: &str = "geometry";

/// Window rectangle remembered across runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowGeometry {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Default for WindowGeometry {
    fn default() -> Self {
        Self {
            x: 300,
            y: 300,
            width: 640,
            height: 300,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SettingsDocument {
    geometry: WindowGeometry,
}

/// The small key/value file holding the `[geometry]` section. Reading never
/// fails: a missing file, a broken file or a bad field all fall back to the
/// defaults for whatever could not be read.
#[derive(Debug, Clone)]
pub struct Settings {
    path: PathBuf,
    document: SettingsDocument,
}

impl Settings {
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let geometry = match fs::read_to_string(&path) {
            Ok(raw) => parse_geometry(&raw, &path),
            Err(err) => {
                if err.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(?err, path = %path.display(), "settings unreadable, using defaults");
                }
                WindowGeometry::default()
            }
        };
        Self {
            path,
            document: SettingsDocument { geometry },
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn geometry(&self) -> WindowGeometry {
        self.document.geometry
    }

    pub fn set_geometry(&mut self, geometry: WindowGeometry) -> &mut Self {
        self.document.geometry = geometry;
        self
    }

    pub fn save(&self) -> Result<()> {
        let raw = toml::to_string_pretty(&self.document).context("serializing settings")?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
        fs::write(&self.path, raw)
            .with_context(|| format!("writing settings {}", self.path.display()))?;
        Ok(())
    }
}

fn parse_geometry(raw: &str, path: &Path) -> WindowGeometry {
    let mut geometry = WindowGeometry::default();
    let table = match raw.parse::<Table>() {
        Ok(table) => table,
        Err(err) => {
            tracing::warn!(%err, path = %path.display(), "malformed settings, using defaults");
            return geometry;
        }
    };
    let Some(section) = table.get(GEOMETRY_SECTION).and_then(Value::as_table) else {
        return geometry;
    };
    for (key, slot) in [
        ("x", &mut geometry.x),
        ("y", &mut geometry.y),
        ("width", &mut geometry.width),
        ("height", &mut geometry.height),
    ] {
        let Some(value) = section.get(key) else {
            continue;
        };
        match integer_field(value) {
            Some(parsed) => *slot = parsed,
            None => tracing::warn!(key, ?value, "ignoring malformed geometry field"),
        }
    }
    geometry
}

fn integer_field(value: &Value) -> Option<i32> {
    match value {
        Value::Integer(int) => i32::try_from(*int).ok(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let temp = TempDir::new().expect("tempdir");
        let settings = Settings::load(temp.path().join("absent.toml"));
        assert_eq!(settings.geometry(), WindowGeometry::default());
    }

    #[test]
    fn missing_width_falls_back_alone() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("workdiary.toml");
        fs::write(&path, "[geometry]\nx = 10\ny = 20\nheight = 480\n")?;
        let geometry = Settings::load(&path).geometry();
        assert_eq!(
            geometry,
            WindowGeometry {
                x: 10,
                y: 20,
                width: 640,
                height: 480
            }
        );
        Ok(())
    }

    #[test]
    fn malformed_fields_and_files_recover() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("workdiary.toml");
        fs::write(&path, "[geometry]\nx = \"12\"\nwidth = \"wide\"\n")?;
        let geometry = Settings::load(&path).geometry();
        assert_eq!(geometry.x, 12);
        assert_eq!(geometry.width, 640);

        fs::write(&path, "this is = not [toml")?;
        assert_eq!(Settings::load(&path).geometry(), WindowGeometry::default());
        Ok(())
    }

    #[test]
    fn save_then_load_keeps_geometry() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("nested").join("workdiary.toml");
        let mut settings = Settings::load(&path);
        let geometry = WindowGeometry {
            x: 1,
            y: 2,
            width: 120,
            height: 40,
        };
        settings.set_geometry(geometry).save()?;
        assert_eq!(Settings::load(&path).geometry(), geometry);
        Ok(())
    }
}
