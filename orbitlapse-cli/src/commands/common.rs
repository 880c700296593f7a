//! Common types and utilities shared across CLI commands.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, ValueEnum};
use orbitlapse::config::LoaderConfig;
use orbitlapse::loader::{ImageryLoader, ProviderState};
use orbitlapse::provider::{ImageRecord, ProviderFactory, ProviderKind, ReqwestClient, Satellite};
use tracing::debug;

use crate::error::CliError;

/// Imagery provider selection for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
pub enum ProviderArg {
    /// AWS Open Data STAC catalog (no registration required)
    Aws,
    /// Google Earth Engine (requires authentication)
    Gee,
    /// Synthetic placeholder imagery for development
    Sample,
}

impl From<ProviderArg> for ProviderKind {
    fn from(arg: ProviderArg) -> Self {
        match arg {
            ProviderArg::Aws => ProviderKind::CloudCatalog,
            ProviderArg::Gee => ProviderKind::EarthEngine,
            ProviderArg::Sample => ProviderKind::Synthetic,
        }
    }
}

/// Satellite selection for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
pub enum SatelliteArg {
    /// Sentinel-2, 10 m visible bands
    Sentinel2,
    /// Landsat 8/9, 30 m visible bands
    Landsat,
}

impl From<SatelliteArg> for Satellite {
    fn from(arg: SatelliteArg) -> Self {
        match arg {
            SatelliteArg::Sentinel2 => Satellite::Sentinel2,
            SatelliteArg::Landsat => Satellite::Landsat,
        }
    }
}

/// Options accepted by every command.
#[derive(Debug, Clone, Args)]
pub struct GlobalArgs {
    /// Provider to use instead of the last active one
    #[arg(long, global = true, value_enum)]
    pub provider: Option<ProviderArg>,

    /// Data directory (overrides storage.data_root)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Configuration file (defaults to the user config path)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Allow an interactive gcloud login for Earth Engine
    #[arg(long, global = true)]
    pub interactive: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Location and date range of a search.
#[derive(Debug, Clone, Args)]
pub struct SearchArgs {
    /// Latitude in decimal degrees
    #[arg(long, allow_negative_numbers = true)]
    pub lat: f64,

    /// Longitude in decimal degrees
    #[arg(long, allow_negative_numbers = true)]
    pub lon: f64,

    /// First acquisition date (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub start: NaiveDate,

    /// Last acquisition date (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub end: NaiveDate,

    /// Maximum cloud cover percentage
    #[arg(long)]
    pub max_cloud: Option<f64>,

    /// Maximum number of results
    #[arg(long)]
    pub limit: Option<usize>,

    /// Satellite family
    #[arg(long, value_enum)]
    pub satellite: Option<SatelliteArg>,
}

/// Parses a `YYYY-MM-DD` date.
pub fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| format!("'{}' is not a YYYY-MM-DD date: {}", s, e))
}

/// Loads the configuration file and applies CLI overrides.
pub fn load_config(global: &GlobalArgs) -> Result<LoaderConfig, CliError> {
    let mut config = match &global.config {
        Some(path) => LoaderConfig::load_from(path)?,
        None => LoaderConfig::load()?,
    };
    if let Some(dir) = &global.data_dir {
        config.data_root = dir.clone();
    }
    if global.interactive {
        config.earth_engine.interactive = true;
    }
    Ok(config)
}

/// Resolve the provider from CLI args, saved state and config.
pub fn resolve_provider(cli_provider: Option<ProviderArg>, config: &LoaderConfig) -> ProviderKind {
    // CLI takes precedence, then the last active provider, then config
    if let Some(arg) = cli_provider {
        return arg.into();
    }
    match ProviderState::load(&config.state_file()) {
        Ok(Some(state)) => state.active_source,
        Ok(None) => config.default_provider,
        Err(e) => {
            debug!(error = %e, "Ignoring unreadable provider state");
            config.default_provider
        }
    }
}

/// Builds a loader with the resolved provider active.
pub fn open_loader(
    global: &GlobalArgs,
    config: LoaderConfig,
) -> Result<ImageryLoader<ReqwestClient>, CliError> {
    let provider = resolve_provider(global.provider, &config);
    let http = ReqwestClient::with_timeout(config.http_timeout_secs)?;
    let factory = ProviderFactory::from_config(http, config);
    Ok(ImageryLoader::new(factory, provider)?)
}

/// Prints one record as a table row.
pub fn print_record(index: usize, record: &ImageRecord) {
    println!(
        "  {:>2}. {}  {:>5.1}%  {:<12} {}",
        index + 1,
        record.date,
        record.cloud_cover,
        record.satellite,
        record.id
    );
}

/// Prints collected warnings, if any.
pub fn print_warnings(warnings: &[String]) {
    if warnings.is_empty() {
        return;
    }
    println!();
    println!("Warnings:");
    for warning in warnings {
        println!("  - {}", warning);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date("2021-03-01").unwrap(),
            NaiveDate::from_ymd_opt(2021, 3, 1).unwrap()
        );
        assert!(parse_date("03/01/2021").is_err());
    }

    #[test]
    fn test_resolve_provider_precedence() {
        let temp = TempDir::new().unwrap();
        let config = LoaderConfig::new(temp.path().to_path_buf())
            .with_default_provider(ProviderKind::Synthetic);

        assert_eq!(resolve_provider(None, &config), ProviderKind::Synthetic);

        ProviderState::new(ProviderKind::EarthEngine, temp.path().join("raw/gee"))
            .save(&config.state_file())
            .unwrap();
        assert_eq!(resolve_provider(None, &config), ProviderKind::EarthEngine);

        assert_eq!(
            resolve_provider(Some(ProviderArg::Aws), &config),
            ProviderKind::CloudCatalog
        );
    }

    #[test]
    fn test_resolve_provider_ignores_corrupt_state() {
        let temp = TempDir::new().unwrap();
        let config = LoaderConfig::new(temp.path().to_path_buf());
        std::fs::write(config.state_file(), "not json").unwrap();

        assert_eq!(resolve_provider(None, &config), config.default_provider);
    }
}
