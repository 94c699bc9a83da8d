//! Application directory structure for mokhatt-widget.
//!
//! - Config: `~/.config/mokhatt/` (human-editable, XDG-style, holds `widget.toml`)
//! - Data:   `~/Library/Application Support/com.mokhatt.widget/` on macOS,
//!   `$XDG_DATA_HOME/mokhatt/` elsewhere (holds the visitor store)
//! - Logs:   `~/Library/Logs/mokhatt/` on macOS, `<data>/logs/` elsewhere

use std::path::{Path, PathBuf};
use tracing::debug;

#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
const BUNDLE_ID: &str = "com.mokhatt.widget";
pub const APP_NAME: &str = "mokhatt";

/// All resolved application directory paths.
#[derive(Debug, Clone)]
pub struct MokhattPaths {
    /// Human-editable config: `~/.config/mokhatt/`
    pub config: PathBuf,
    /// Machine-managed data (visitor store)
    pub data: PathBuf,
    /// Application logs
    pub logs: PathBuf,
}

impl MokhattPaths {
    /// Resolve all paths from the user's home directory.
    /// Does not create any directories; call `ensure()` for that.
    pub fn resolve() -> Option<Self> {
        let home = std::env::var("HOME").ok().map(PathBuf::from)?;
        Some(Self {
            config: resolve_config_dir(&home),
            data: resolve_data_dir(&home),
            logs: resolve_log_dir(&home),
        })
    }

    /// Create all directories that don't already exist.
    pub fn ensure(&self) -> std::io::Result<()> {
        for dir in [&self.config, &self.data, &self.logs] {
            std::fs::create_dir_all(dir)?;
            debug!(target: "paths", "ensured directory: {}", dir.display());
        }
        Ok(())
    }

    /// Default location of the widget configuration file.
    pub fn config_file(&self) -> PathBuf {
        self.config.join("widget.toml")
    }

    /// Location of the key-value file backing the visitor identity.
    pub fn visitor_store(&self) -> PathBuf {
        self.data.join("visitor.json")
    }
}

fn resolve_config_dir(home: &Path) -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        PathBuf::from(xdg).join(APP_NAME)
    } else {
        home.join(".config").join(APP_NAME)
    }
}

#[cfg(target_os = "macos")]
fn resolve_data_dir(home: &Path) -> PathBuf {
    home.join("Library")
        .join("Application Support")
        .join(BUNDLE_ID)
}

#[cfg(not(target_os = "macos"))]
fn resolve_data_dir(home: &Path) -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        PathBuf::from(xdg).join(APP_NAME)
    } else {
        home.join(".local").join("share").join(APP_NAME)
    }
}

#[cfg(target_os = "macos")]
fn resolve_log_dir(home: &Path) -> PathBuf {
    home.join("Library").join("Logs").join(APP_NAME)
}

#[cfg(not(target_os = "macos"))]
fn resolve_log_dir(home: &Path) -> PathBuf {
    resolve_data_dir(home).join("logs")
}
