//! Configuration management CLI commands.
//!
//! Provides `config path`, `config show` and `config init`.

use std::path::Path;

use clap::Subcommand;
use orbitlapse::config::{config_file_path, LoaderConfig};

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show the configuration file path
    Path,

    /// Show the effective configuration
    Show,

    /// Write a configuration file with default settings
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Run a config subcommand.
///
/// `file` is the `--config` override, `config` the effective settings.
pub fn run(
    command: ConfigCommands,
    file: Option<&Path>,
    config: &LoaderConfig,
) -> Result<(), CliError> {
    let path = file.map(Path::to_path_buf).unwrap_or_else(config_file_path);
    match command {
        ConfigCommands::Path => run_path(&path),
        ConfigCommands::Show => run_show(&path, config),
        ConfigCommands::Init { force } => run_init(&path, force),
    }
}

fn run_path(path: &Path) -> Result<(), CliError> {
    println!("{}", path.display());
    Ok(())
}

fn run_show(path: &Path, config: &LoaderConfig) -> Result<(), CliError> {
    println!("Configuration Settings");
    println!("======================");
    if !path.exists() {
        println!("({} not found, showing defaults)", path.display());
    }
    println!();

    let sections: Vec<(&str, Vec<(&str, String)>)> = vec![
        (
            "storage",
            vec![("data_root", config.data_root.display().to_string())],
        ),
        (
            "provider",
            vec![("default", config.default_provider.id().to_string())],
        ),
        (
            "search",
            vec![
                ("max_cloud_cover", config.search.max_cloud_cover.to_string()),
                ("limit", config.search.limit.to_string()),
                (
                    "series_max_cloud_cover",
                    config.search.series_max_cloud_cover.to_string(),
                ),
                ("resolution", config.resolution.to_string()),
                ("low_percentile", config.stretch.low_percentile.to_string()),
                ("high_percentile", config.stretch.high_percentile.to_string()),
            ],
        ),
        (
            "season",
            vec![
                ("start", config.season.start_str()),
                ("end", config.season.end_str()),
            ],
        ),
        (
            "stac",
            vec![
                ("catalog_url", config.stac.catalog_url.clone()),
                ("sentinel2_collection", config.stac.sentinel2_collection.clone()),
                ("landsat_collection", config.stac.landsat_collection.clone()),
                ("cloud_property", config.stac.cloud_property.clone()),
                ("oversample", config.stac.oversample.to_string()),
            ],
        ),
        (
            "earth_engine",
            vec![
                ("project", config.earth_engine.project.clone()),
                ("collection", config.earth_engine.collection.clone()),
                ("gcloud", config.earth_engine.gcloud_bin.clone()),
                ("token_env", config.earth_engine.token_env.clone()),
                ("interactive", config.earth_engine.interactive.to_string()),
            ],
        ),
        (
            "http",
            vec![("timeout", config.http_timeout_secs.to_string())],
        ),
    ];

    for (i, (section, keys)) in sections.iter().enumerate() {
        if i > 0 {
            println!();
        }
        println!("[{}]", section);
        for (key, value) in keys {
            println!("  {} = {}", key, value);
        }
    }
    Ok(())
}

fn run_init(path: &Path, force: bool) -> Result<(), CliError> {
    if path.exists() && !force {
        return Err(CliError::Config(format!(
            "{} already exists; use --force to overwrite it",
            path.display()
        )));
    }
    LoaderConfig::default().save_to(path)?;

    println!("Configuration file: {}", path.display());
    println!();
    println!("Edit this file to customize OrbitLapse settings.");
    println!("CLI arguments override config file values when specified.");
    Ok(())
}
