//! `search` and `fetch` commands.

use orbitlapse::loader::{ImageryLoader, LoadOutcome, SearchReport};
use orbitlapse::provider::{ProviderStatus, ReqwestClient, SearchQuery};
use orbitlapse::storage::image_filename;

use super::common::{print_record, print_warnings, SearchArgs};
use crate::error::CliError;

/// Builds the query, filling unset options from the configuration.
fn build_query(
    loader: &ImageryLoader<ReqwestClient>,
    args: &SearchArgs,
) -> Result<SearchQuery, CliError> {
    let defaults = &loader.config().search;
    let query = SearchQuery::new(
        args.lat,
        args.lon,
        args.start,
        args.end,
        args.max_cloud.unwrap_or(defaults.max_cloud_cover),
        args.limit.unwrap_or(defaults.limit),
    )?;
    Ok(match args.satellite {
        Some(satellite) => query.with_satellite(satellite.into()),
        None => query,
    })
}

fn print_report(report: &SearchReport) {
    if let ProviderStatus::Unavailable { reason } = &report.status {
        println!("{} is unavailable: {}", report.source.label(), reason);
        return;
    }
    if report.records.is_empty() {
        println!("No images found.");
    } else {
        println!(
            "Found {} image(s) from {}:",
            report.records.len(),
            report.source.label()
        );
        for (i, record) in report.records.iter().enumerate() {
            print_record(i, record);
        }
    }
    print_warnings(&report.warnings);
}

/// Search the active provider.
pub fn run_search(
    loader: &mut ImageryLoader<ReqwestClient>,
    args: &SearchArgs,
) -> Result<(), CliError> {
    let query = build_query(loader, args)?;
    let report = loader.search(&query);
    print_report(&report);
    Ok(())
}

/// Search, then download and save the best `count` images.
pub fn run_fetch(
    loader: &mut ImageryLoader<ReqwestClient>,
    args: &SearchArgs,
    count: usize,
    resolution: Option<u32>,
) -> Result<(), CliError> {
    if count == 0 {
        return Err(CliError::InvalidArgument(
            "count must be positive".to_string(),
        ));
    }
    let resolution = resolution.unwrap_or(loader.config().resolution);
    let query = build_query(loader, args)?;
    let report = loader.search(&query);
    print_report(&report);

    let mut warnings = Vec::new();
    let mut saved = 0;
    for record in report.records.iter().take(count) {
        match loader.load_image(record, resolution)? {
            LoadOutcome::Loaded(image) => {
                let filename = image_filename(args.lat, args.lon, record, resolution);
                let location = loader.save_image(&image, &filename, record)?;
                println!("Saved {}", location.display());
                saved += 1;
            }
            LoadOutcome::Refused { message, .. } => warnings.push(message),
            LoadOutcome::Failed { message } => {
                warnings.push(format!("{}: {}", record.id, message))
            }
        }
    }

    if !report.records.is_empty() {
        println!();
        println!("{} image(s) saved", saved);
    }
    print_warnings(&warnings);
    Ok(())
}
