use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Preview bound on the long edge when nothing else is configured.
pub const DEFAULT_PREVIEW_MAX: u32 = 1024;

pub const PREVIEW_MAX_ENV: &str = "SNAPEASE_PREVIEW_MAX";

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
/// Persisted application settings for SnapEase.
pub struct AppConfig {
    pub last_project: Option<PathBuf>,
    /// Directory last used for opening or saving image lists.
    pub list_dir: Option<PathBuf>,
    pub preview_max: Option<u32>,
    pub export_dir: Option<PathBuf>,
    pub export_format: Option<String>,
    pub export_quality: Option<u8>,
    pub export_max_width: Option<u32>,
    pub export_max_height: Option<u32>,
}

impl AppConfig {
    /// Returns the user config file path, if a config directory is available.
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("snapease").join("config.toml"))
    }

    /// Loads config from disk, falling back to defaults on any error.
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    pub fn load_from(path: &Path) -> Self {
        let Ok(contents) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        toml::from_str(&contents).unwrap_or_default()
    }

    /// Writes config to disk, ignoring filesystem/serialization errors.
    pub fn save(&self) {
        if let Some(path) = Self::config_path() {
            self.save_to(&path);
        }
    }

    pub fn save_to(&self, path: &Path) {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Ok(s) = toml::to_string_pretty(self) {
            let _ = std::fs::write(path, s);
        }
    }

    /// Preview bound: the environment first, then the config file.
    pub fn preview_max_resolved(&self) -> u32 {
        resolve_preview_max(std::env::var(PREVIEW_MAX_ENV).ok().as_deref(), self.preview_max)
    }
}

fn parse_preview_max(value: &str) -> Option<u32> {
    value.trim().parse::<u32>().ok().filter(|&v| v > 0)
}

fn resolve_preview_max(env: Option<&str>, configured: Option<u32>) -> u32 {
    env.and_then(parse_preview_max)
        .or(configured.filter(|&v| v > 0))
        .unwrap_or(DEFAULT_PREVIEW_MAX)
}
