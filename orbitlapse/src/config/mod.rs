//! Configuration for the imagery loader.
//!
//! [`LoaderConfig`] is the single configuration object injected into the
//! loader, the sampler and every adapter. Nothing in the core reads
//! environment or files on its own; the INI file support in this module is
//! used by front ends to build a `LoaderConfig`.

mod file;

pub use file::{config_file_path, ConfigError};

use std::path::PathBuf;

use crate::normalize::Stretch;
use crate::provider::{ProviderKind, Satellite};
use crate::sampler::SeasonalWindow;

/// Default output resolution in pixels.
pub const DEFAULT_RESOLUTION: u32 = 512;

/// Name of the file recording the active provider.
pub const STATE_FILE_NAME: &str = "data_source_info.json";

/// Returns the default data root (`~/.local/share/orbitlapse` on Linux).
pub fn default_data_root() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("orbitlapse")
}

/// Defaults applied to searches and series when the caller does not override them.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchDefaults {
    /// Cloud cover ceiling for plain searches.
    pub max_cloud_cover: f64,
    /// Result limit for plain searches.
    pub limit: usize,
    /// Cloud cover ceiling used when sampling a series.
    pub series_max_cloud_cover: f64,
}

impl Default for SearchDefaults {
    fn default() -> Self {
        Self {
            max_cloud_cover: 30.0,
            limit: 10,
            series_max_cloud_cover: 20.0,
        }
    }
}

/// Settings for the public STAC catalog adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct StacConfig {
    /// STAC API root.
    pub catalog_url: String,
    pub sentinel2_collection: String,
    pub landsat_collection: String,
    /// Half-width of the search box in degrees for Sentinel-2 (10 m).
    pub sentinel2_buffer: f64,
    /// Half-width of the search box in degrees for Landsat (30 m).
    pub landsat_buffer: f64,
    /// Asset keys of the red, green and blue bands.
    pub band_assets: [String; 3],
    /// Item property holding cloud cover.
    pub cloud_property: String,
    /// The center crop spans `resolution × oversample` source pixels.
    pub oversample: u32,
}

impl Default for StacConfig {
    fn default() -> Self {
        Self {
            catalog_url: "https://earth-search.aws.element84.com/v1".to_string(),
            sentinel2_collection: "sentinel-2-l2a".to_string(),
            landsat_collection: "landsat-c2-l2".to_string(),
            sentinel2_buffer: 0.05,
            landsat_buffer: 0.1,
            band_assets: ["red".to_string(), "green".to_string(), "blue".to_string()],
            cloud_property: "eo:cloud_cover".to_string(),
            oversample: 10,
        }
    }
}

impl StacConfig {
    pub fn collection(&self, satellite: Satellite) -> &str {
        match satellite {
            Satellite::Sentinel2 => &self.sentinel2_collection,
            Satellite::Landsat => &self.landsat_collection,
        }
    }

    pub fn buffer(&self, satellite: Satellite) -> f64 {
        match satellite {
            Satellite::Sentinel2 => self.sentinel2_buffer,
            Satellite::Landsat => self.landsat_buffer,
        }
    }
}

/// Settings for the Earth Engine adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct EarthEngineConfig {
    /// REST API root.
    pub api_url: String,
    /// Cloud project billed for requests.
    pub project: String,
    /// Image collection asset id.
    pub collection: String,
    /// Image property holding cloud cover.
    pub cloud_property: String,
    /// Band ids rendered as red, green and blue.
    pub bands: [String; 3],
    /// Display range applied by the server when rendering.
    pub display_min: f64,
    pub display_max: f64,
    /// Half-width of the rendered region in degrees.
    pub buffer: f64,
    /// Environment variable checked first for an access token.
    pub token_env: String,
    /// gcloud executable used for non-interactive and interactive auth.
    pub gcloud_bin: String,
    /// Whether an interactive login may be started.
    pub interactive: bool,
}

impl Default for EarthEngineConfig {
    fn default() -> Self {
        Self {
            api_url: "https://earthengine.googleapis.com/v1".to_string(),
            project: "earthengine-public".to_string(),
            collection: "COPERNICUS/S2_SR_HARMONIZED".to_string(),
            cloud_property: "CLOUDY_PIXEL_PERCENTAGE".to_string(),
            bands: ["B4".to_string(), "B3".to_string(), "B2".to_string()],
            display_min: 0.0,
            display_max: 3000.0,
            buffer: 0.05,
            token_env: "EARTHENGINE_TOKEN".to_string(),
            gcloud_bin: "gcloud".to_string(),
            interactive: false,
        }
    }
}

/// Complete loader configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct LoaderConfig {
    /// Root of all persisted data.
    pub data_root: PathBuf,
    /// Provider used when nothing else selects one.
    pub default_provider: ProviderKind,
    pub search: SearchDefaults,
    pub season: SeasonalWindow,
    /// Output image size in pixels.
    pub resolution: u32,
    pub stretch: Stretch,
    pub stac: StacConfig,
    pub earth_engine: EarthEngineConfig,
    /// HTTP timeout in seconds.
    pub http_timeout_secs: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self::new(default_data_root())
    }
}

impl LoaderConfig {
    /// Creates a configuration rooted at `data_root` with default settings.
    pub fn new(data_root: PathBuf) -> Self {
        Self {
            data_root,
            default_provider: ProviderKind::CloudCatalog,
            search: SearchDefaults::default(),
            season: SeasonalWindow::default(),
            resolution: DEFAULT_RESOLUTION,
            stretch: Stretch::default(),
            stac: StacConfig::default(),
            earth_engine: EarthEngineConfig::default(),
            http_timeout_secs: crate::provider::DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Directory holding one provider's images.
    ///
    /// Each provider has its own directory so listings never mix sources.
    pub fn provider_dir(&self, kind: ProviderKind) -> PathBuf {
        self.data_root.join("raw").join(kind.id())
    }

    /// Path of the persisted provider state.
    pub fn state_file(&self) -> PathBuf {
        self.data_root.join(STATE_FILE_NAME)
    }

    pub fn with_default_provider(mut self, kind: ProviderKind) -> Self {
        self.default_provider = kind;
        self
    }

    pub fn with_season(mut self, season: SeasonalWindow) -> Self {
        self.season = season;
        self
    }

    pub fn with_resolution(mut self, resolution: u32) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn with_stac(mut self, stac: StacConfig) -> Self {
        self.stac = stac;
        self
    }

    pub fn with_earth_engine(mut self, earth_engine: EarthEngineConfig) -> Self {
        self.earth_engine = earth_engine;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LoaderConfig::new(PathBuf::from("/data"));
        assert_eq!(config.default_provider, ProviderKind::CloudCatalog);
        assert_eq!(config.search.max_cloud_cover, 30.0);
        assert_eq!(config.search.series_max_cloud_cover, 20.0);
        assert_eq!(config.resolution, 512);
        assert_eq!(config.stretch, Stretch::new(2.0, 98.0));
        assert_eq!(config.stac.oversample, 10);
    }

    #[test]
    fn test_provider_dirs_are_distinct() {
        let config = LoaderConfig::new(PathBuf::from("/data"));
        assert_eq!(
            config.provider_dir(ProviderKind::CloudCatalog),
            PathBuf::from("/data/raw/aws")
        );
        assert_eq!(
            config.provider_dir(ProviderKind::EarthEngine),
            PathBuf::from("/data/raw/gee")
        );
        assert_eq!(
            config.provider_dir(ProviderKind::Synthetic),
            PathBuf::from("/data/raw/sample")
        );
        assert_eq!(
            config.state_file(),
            PathBuf::from("/data/data_source_info.json")
        );
    }

    #[test]
    fn test_stac_buffer_grows_with_ground_resolution() {
        let stac = StacConfig::default();
        assert!(stac.buffer(Satellite::Landsat) > stac.buffer(Satellite::Sentinel2));
        assert_eq!(stac.collection(Satellite::Landsat), "landsat-c2-l2");
    }

    #[test]
    fn test_builder_pattern() {
        let config = LoaderConfig::new(PathBuf::from("/data"))
            .with_default_provider(ProviderKind::Synthetic)
            .with_resolution(128);
        assert_eq!(config.default_provider, ProviderKind::Synthetic);
        assert_eq!(config.resolution, 128);
    }
}
