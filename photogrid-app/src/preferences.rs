use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use photogrid_core::LoaderConfig;

/// Fewest and most columns the sheet may be zoomed to.
pub const MIN_COLUMNS: u32 = 1;
pub const MAX_COLUMNS: u32 = 8;
pub const MAX_ROWS: u32 = 32;
/// Thumbnail side length range, in pixels.
pub const MIN_THUMBNAIL_SIZE: u32 = 16;
pub const MAX_THUMBNAIL_SIZE: u32 = 512;

// ---------------------------------------------------------------------------
// Application preferences
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppPreferences {
    /// Thumbnail pipeline tunables.
    #[serde(default)]
    pub loader: LoaderConfig,
    /// Grid zoom level.
    #[serde(default = "default_columns")]
    pub columns: u32,
    #[serde(default = "default_rows")]
    pub rows: u32,
    /// Index of the first visible image when the app last exited.
    #[serde(default)]
    pub resume_position: usize,
    #[serde(default)]
    pub last_root: Option<PathBuf>,
}

fn default_columns() -> u32 {
    4
}
fn default_rows() -> u32 {
    5
}

impl Default for AppPreferences {
    fn default() -> Self {
        Self {
            loader: LoaderConfig::default(),
            columns: default_columns(),
            rows: default_rows(),
            resume_position: 0,
            last_root: None,
        }
    }
}

impl AppPreferences {
    /// Load preferences from beside the executable, falling back to defaults.
    pub fn load() -> Self {
        Self::load_from(&config_path())
    }

    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(json) => match serde_json::from_str::<AppPreferences>(&json) {
                    Ok(mut prefs) => {
                        info!("Loaded preferences from {}", path.display());
                        prefs.repair();
                        return prefs;
                    }
                    Err(e) => {
                        error!("Failed to parse preferences: {e}");
                    }
                },
                Err(e) => {
                    error!("Failed to read preferences file: {e}");
                }
            }
        } else {
            debug!("No preferences file at {}", path.display());
        }
        Self::default()
    }

    /// Persist preferences to disk.
    pub fn save(&self) {
        self.save_to(&config_path());
    }

    pub fn save_to(&self, path: &Path) {
        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                error!("Failed to create config directory: {e}");
                return;
            }
        }
        match serde_json::to_string_pretty(self) {
            Ok(json) => {
                if let Err(e) = fs::write(path, &json) {
                    error!("Failed to write preferences: {e}");
                } else {
                    debug!("Saved preferences");
                }
            }
            Err(e) => error!("Failed to serialize preferences: {e}"),
        }
    }

    /// Pull the grid dimensions back into the ranges the sheet supports.
    pub fn repair(&mut self) {
        self.columns = clamp_columns(self.columns);
        self.rows = clamp_rows(self.rows);
        self.loader.thumbnail_size = clamp_thumbnail_size(self.loader.thumbnail_size);
    }
}

pub fn clamp_columns(columns: u32) -> u32 {
    columns.clamp(MIN_COLUMNS, MAX_COLUMNS)
}

pub fn clamp_rows(rows: u32) -> u32 {
    rows.clamp(1, MAX_ROWS)
}

pub fn clamp_thumbnail_size(size: u32) -> u32 {
    size.clamp(MIN_THUMBNAIL_SIZE, MAX_THUMBNAIL_SIZE)
}

/// Where to resume in a collection of `len` images.
pub fn clamp_resume(resume: usize, len: usize) -> usize {
    if len == 0 {
        0
    } else {
        resume.min(len - 1)
    }
}

fn config_path() -> PathBuf {
    crate::app_dir::exe_directory().join("preferences.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let prefs = AppPreferences::load_from(Path::new("/no/such/photogrid/preferences.json"));
        assert_eq!(prefs, AppPreferences::default());
    }

    #[test]
    fn save_then_load_keeps_values() {
        let dir = std::env::temp_dir().join("photogrid_test_prefs");
        let _ = fs::remove_dir_all(&dir);
        let path = dir.join("preferences.json");

        let prefs = AppPreferences {
            columns: 6,
            resume_position: 42,
            last_root: Some(PathBuf::from("/photos")),
            loader: LoaderConfig::default().with_thumbnail_size(96),
            ..AppPreferences::default()
        };
        prefs.save_to(&path);
        assert_eq!(AppPreferences::load_from(&path), prefs);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn partial_and_out_of_range_files_are_repaired() {
        let dir = std::env::temp_dir().join("photogrid_test_prefs_partial");
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("preferences.json");
        fs::write(&path, r#"{"columns": 40, "rows": 0}"#).unwrap();

        let prefs = AppPreferences::load_from(&path);
        assert_eq!(prefs.columns, MAX_COLUMNS);
        assert_eq!(prefs.rows, 1);
        assert_eq!(prefs.loader, LoaderConfig::default());

        fs::write(
            &path,
            r#"{"rows": 4000000000, "loader": {"thumbnail_size": 4000000000}}"#,
        )
        .unwrap();
        let prefs = AppPreferences::load_from(&path);
        assert_eq!(prefs.rows, MAX_ROWS);
        assert_eq!(prefs.loader.thumbnail_size, MAX_THUMBNAIL_SIZE);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() {
        let dir = std::env::temp_dir().join("photogrid_test_prefs_corrupt");
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("preferences.json");
        fs::write(&path, "{ not json").unwrap();

        assert_eq!(AppPreferences::load_from(&path), AppPreferences::default());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn resume_is_clamped_to_last_item() {
        assert_eq!(clamp_resume(10, 3), 2);
        assert_eq!(clamp_resume(1, 3), 1);
        assert_eq!(clamp_resume(5, 0), 0);
    }
}
