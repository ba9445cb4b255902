//! Where the app keeps its files. Preferences live next to the executable so a
//! portable copy carries its settings with it.

use std::path::PathBuf;

/// Directory containing the running executable. Falls back to current directory if unavailable.
pub fn exe_directory() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(PathBuf::from))
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

/// The user's pictures folder, or the home directory when the platform has none.
pub fn default_photo_root() -> PathBuf {
    directories::UserDirs::new()
        .and_then(|d| {
            d.picture_dir()
                .map(PathBuf::from)
                .or_else(|| Some(d.home_dir().to_path_buf()))
        })
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Default location of the exported contact sheet.
pub fn default_sheet_path() -> PathBuf {
    exe_directory().join("contact_sheet.png")
}
