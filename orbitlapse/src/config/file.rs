//! INI configuration file support.
//!
//! ```ini
//! [storage]
//! data_root = /home/user/.local/share/orbitlapse
//!
//! [provider]
//! default = aws
//!
//! [search]
//! max_cloud_cover = 30
//! limit = 10
//! series_max_cloud_cover = 20
//! resolution = 512
//! low_percentile = 2
//! high_percentile = 98
//!
//! [season]
//! start = 03-01
//! end = 10-31
//! ```
//!
//! Missing keys keep their defaults.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use ini::{Ini, Properties};
use thiserror::Error;

use super::LoaderConfig;
use crate::provider::ProviderKind;
use crate::sampler::SeasonalWindow;

/// Errors loading or saving the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {reason}", path.display())]
    ReadFailed { path: PathBuf, reason: String },

    #[error("failed to write config {}: {reason}", path.display())]
    WriteFailed { path: PathBuf, reason: String },

    #[error("invalid value for {section}.{key}: '{value}'")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
    },
}

/// Returns the configuration file path (`~/.config/orbitlapse/config.ini` on Linux).
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("orbitlapse")
        .join("config.ini")
}

impl LoaderConfig {
    /// Loads the configuration from the default path.
    ///
    /// A missing file yields the default configuration.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path())
    }

    /// Loads the configuration from `path`; a missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let ini = Ini::load_from_file(path).map_err(|e| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_ini(&ini)
    }

    /// Saves the configuration to the default path.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&config_file_path())
    }

    /// Saves the configuration to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |reason: String| ConfigError::WriteFailed {
            path: path.to_path_buf(),
            reason,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| write_err(e.to_string()))?;
        }
        self.to_ini()
            .write_to_file(path)
            .map_err(|e| write_err(e.to_string()))
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(s) = ini.section(Some("storage")) {
            if let Some(root) = s.get("data_root") {
                config.data_root = PathBuf::from(root);
            }
        }

        if let Some(s) = ini.section(Some("provider")) {
            read(s, "provider", "default", &mut config.default_provider)?;
        }

        if let Some(s) = ini.section(Some("search")) {
            let search = &mut config.search;
            read(s, "search", "max_cloud_cover", &mut search.max_cloud_cover)?;
            read(s, "search", "limit", &mut search.limit)?;
            read(
                s,
                "search",
                "series_max_cloud_cover",
                &mut search.series_max_cloud_cover,
            )?;
            read(s, "search", "resolution", &mut config.resolution)?;
            read(s, "search", "low_percentile", &mut config.stretch.low_percentile)?;
            read(s, "search", "high_percentile", &mut config.stretch.high_percentile)?;
        }

        if let Some(s) = ini.section(Some("season")) {
            let start = s.get("start").unwrap_or("");
            let end = s.get("end").unwrap_or("");
            if !start.is_empty() || !end.is_empty() {
                let default = SeasonalWindow::default();
                let start = if start.is_empty() { default.start_str() } else { start.to_string() };
                let end = if end.is_empty() { default.end_str() } else { end.to_string() };
                config.season = SeasonalWindow::parse(&start, &end).map_err(|_| {
                    ConfigError::InvalidValue {
                        section: "season".to_string(),
                        key: "start/end".to_string(),
                        value: format!("{}/{}", start, end),
                    }
                })?;
            }
        }

        if let Some(s) = ini.section(Some("stac")) {
            let stac = &mut config.stac;
            read(s, "stac", "catalog_url", &mut stac.catalog_url)?;
            read(s, "stac", "sentinel2_collection", &mut stac.sentinel2_collection)?;
            read(s, "stac", "landsat_collection", &mut stac.landsat_collection)?;
            read(s, "stac", "sentinel2_buffer", &mut stac.sentinel2_buffer)?;
            read(s, "stac", "landsat_buffer", &mut stac.landsat_buffer)?;
            read(s, "stac", "cloud_property", &mut stac.cloud_property)?;
            read(s, "stac", "oversample", &mut stac.oversample)?;
        }

        if let Some(s) = ini.section(Some("earth_engine")) {
            let ee = &mut config.earth_engine;
            read(s, "earth_engine", "api_url", &mut ee.api_url)?;
            read(s, "earth_engine", "project", &mut ee.project)?;
            read(s, "earth_engine", "collection", &mut ee.collection)?;
            read(s, "earth_engine", "cloud_property", &mut ee.cloud_property)?;
            read(s, "earth_engine", "display_min", &mut ee.display_min)?;
            read(s, "earth_engine", "display_max", &mut ee.display_max)?;
            read(s, "earth_engine", "buffer", &mut ee.buffer)?;
            read(s, "earth_engine", "token_env", &mut ee.token_env)?;
            read(s, "earth_engine", "gcloud", &mut ee.gcloud_bin)?;
            read(s, "earth_engine", "interactive", &mut ee.interactive)?;
        }

        if let Some(s) = ini.section(Some("http")) {
            read(s, "http", "timeout", &mut config.http_timeout_secs)?;
        }

        Ok(config)
    }

    fn to_ini(&self) -> Ini {
        let mut ini = Ini::new();
        ini.with_section(Some("storage"))
            .set("data_root", self.data_root.to_string_lossy());
        ini.with_section(Some("provider"))
            .set("default", self.default_provider.id());
        ini.with_section(Some("search"))
            .set("max_cloud_cover", self.search.max_cloud_cover.to_string())
            .set("limit", self.search.limit.to_string())
            .set(
                "series_max_cloud_cover",
                self.search.series_max_cloud_cover.to_string(),
            )
            .set("resolution", self.resolution.to_string())
            .set("low_percentile", self.stretch.low_percentile.to_string())
            .set("high_percentile", self.stretch.high_percentile.to_string());
        ini.with_section(Some("season"))
            .set("start", self.season.start_str())
            .set("end", self.season.end_str());
        ini.with_section(Some("stac"))
            .set("catalog_url", self.stac.catalog_url.as_str())
            .set("sentinel2_collection", self.stac.sentinel2_collection.as_str())
            .set("landsat_collection", self.stac.landsat_collection.as_str())
            .set("sentinel2_buffer", self.stac.sentinel2_buffer.to_string())
            .set("landsat_buffer", self.stac.landsat_buffer.to_string())
            .set("cloud_property", self.stac.cloud_property.as_str())
            .set("oversample", self.stac.oversample.to_string());
        let ee = &self.earth_engine;
        ini.with_section(Some("earth_engine"))
            .set("api_url", ee.api_url.as_str())
            .set("project", ee.project.as_str())
            .set("collection", ee.collection.as_str())
            .set("cloud_property", ee.cloud_property.as_str())
            .set("display_min", ee.display_min.to_string())
            .set("display_max", ee.display_max.to_string())
            .set("buffer", ee.buffer.to_string())
            .set("token_env", ee.token_env.as_str())
            .set("gcloud", ee.gcloud_bin.as_str())
            .set("interactive", ee.interactive.to_string());
        ini.with_section(Some("http"))
            .set("timeout", self.http_timeout_secs.to_string());
        ini
    }
}

/// Parses `section.key` into `target` when present and non-empty.
fn read<T: FromStr>(
    props: &Properties,
    section: &str,
    key: &str,
    target: &mut T,
) -> Result<(), ConfigError> {
    match props.get(key).map(str::trim) {
        Some(value) if !value.is_empty() => {
            *target = value.parse().map_err(|_| ConfigError::InvalidValue {
                section: section.to_string(),
                key: key.to_string(),
                value: value.to_string(),
            })?;
            Ok(())
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp = TempDir::new().unwrap();
        let config = LoaderConfig::load_from(&temp.path().join("absent.ini")).unwrap();
        assert_eq!(config.search.limit, 10);
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested/config.ini");

        let mut config = LoaderConfig::new(temp.path().join("data"))
            .with_default_provider(ProviderKind::Synthetic)
            .with_resolution(256);
        config.search.series_max_cloud_cover = 12.5;
        config.season = SeasonalWindow::parse("04-15", "09-30").unwrap();
        config.earth_engine.interactive = true;
        config.save_to(&path).unwrap();

        let loaded = LoaderConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.ini");
        fs::write(&path, "[search]\nlimit = 3\n\n[provider]\ndefault = gee\n").unwrap();

        let config = LoaderConfig::load_from(&path).unwrap();
        assert_eq!(config.search.limit, 3);
        assert_eq!(config.search.max_cloud_cover, 30.0);
        assert_eq!(config.default_provider, ProviderKind::EarthEngine);
        assert_eq!(config.season, SeasonalWindow::default());
    }

    #[test]
    fn test_invalid_value_reported() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.ini");
        fs::write(&path, "[search]\nlimit = many\n").unwrap();

        let err = LoaderConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "limit"));
        assert!(err.to_string().contains("search.limit"));
    }

    #[test]
    fn test_invalid_season_reported() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.ini");
        fs::write(&path, "[season]\nstart = 13-01\n").unwrap();

        let err = LoaderConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }
}
