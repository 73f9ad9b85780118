use std::path::PathBuf;

use directories::ProjectDirs;
use serde::Deserialize;

use crate::thresholds::Preset;

/// Application configuration loaded from TOML config file.
/// Every field has a default; the config file is optional.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Custom store path (overrides XDG default).
    pub db_path: Option<PathBuf>,
    /// Directory holding catalog playlist dumps (`<playlist>.json`).
    pub catalog_dir: Option<PathBuf>,
    /// Where `import` looks for history exports when given no paths.
    pub history_dirs: Vec<PathBuf>,
    /// Preset used when no thresholds have been saved yet.
    pub default_preset: Option<Preset>,
}

impl AppConfig {
    /// Load config from `~/.config/splitlist/config.toml`.
    /// Returns default config if file doesn't exist.
    /// Logs a warning if the file exists but can't be parsed.
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) if path.exists() => match std::fs::read_to_string(&path) {
                Ok(contents) => Self::parse(&contents).unwrap_or_else(|e| {
                    log::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    Self::default()
                }),
                Err(e) => {
                    log::warn!("Failed to read {}: {}. Using defaults.", path.display(), e);
                    Self::default()
                }
            },
            _ => {
                log::debug!("No config file found, using defaults");
                Self::default()
            }
        }
    }

    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        let config: AppConfig = toml::from_str(contents)?;
        Ok(config)
    }

    /// Catalog dump directory: config value or `<data dir>/catalog`.
    pub fn resolve_catalog_dir(&self) -> PathBuf {
        self.catalog_dir.clone().unwrap_or_else(|| {
            ProjectDirs::from("", "", crate::APP_NAME)
                .map(|dirs| dirs.data_dir().join("catalog"))
                .unwrap_or_else(|| PathBuf::from("catalog"))
        })
    }

    /// Get the config file path.
    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", crate::APP_NAME)
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

/// Resolve the default store path using XDG data directory.
pub fn default_db_path() -> PathBuf {
    if let Some(dirs) = ProjectDirs::from("", "", crate::APP_NAME) {
        let data_dir = dirs.data_dir();
        std::fs::create_dir_all(data_dir).ok();
        data_dir.join("splitlist.db")
    } else {
        // Fallback: current directory
        PathBuf::from("splitlist.db")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_is_default() {
        let config = AppConfig::parse("").unwrap();
        assert!(config.db_path.is_none());
        assert!(config.history_dirs.is_empty());
        assert!(config.default_preset.is_none());
    }

    #[test]
    fn test_parse_fields() {
        let config = AppConfig::parse(
            r#"
            db_path = "/tmp/s.db"
            catalog_dir = "/tmp/catalog"
            history_dirs = ["/home/me/export"]
            default_preset = "aggressive"
            "#,
        )
        .unwrap();
        assert_eq!(config.db_path, Some(PathBuf::from("/tmp/s.db")));
        assert_eq!(config.resolve_catalog_dir(), PathBuf::from("/tmp/catalog"));
        assert_eq!(config.history_dirs, vec![PathBuf::from("/home/me/export")]);
        assert_eq!(config.default_preset, Some(Preset::Aggressive));
    }

    #[test]
    fn test_bad_preset_is_an_error() {
        assert!(AppConfig::parse(r#"default_preset = "wild""#).is_err());
    }
}
