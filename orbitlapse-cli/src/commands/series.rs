//! `series` command: one image per year from the active provider.

use clap::Args;
use orbitlapse::loader::ImageryLoader;
use orbitlapse::provider::ReqwestClient;
use orbitlapse::sampler::{SeasonalWindow, SeriesRequest};

use super::common::{print_warnings, SatelliteArg};
use crate::error::CliError;

/// Arguments of the `series` command.
#[derive(Debug, Clone, Args)]
pub struct SeriesArgs {
    /// Latitude in decimal degrees
    #[arg(long, allow_negative_numbers = true)]
    pub lat: f64,

    /// Longitude in decimal degrees
    #[arg(long, allow_negative_numbers = true)]
    pub lon: f64,

    /// First year of the series
    #[arg(long)]
    pub start_year: i32,

    /// Last year of the series (inclusive)
    #[arg(long)]
    pub end_year: i32,

    /// Candidates fetched per year; the clearest becomes the entry
    #[arg(long, default_value_t = 1)]
    pub per_year: usize,

    /// Output size in pixels (defaults to the configured resolution)
    #[arg(long)]
    pub resolution: Option<u32>,

    /// Maximum cloud cover percentage (defaults to search.series_max_cloud_cover)
    #[arg(long)]
    pub max_cloud: Option<f64>,

    /// First day of the seasonal window (MM-DD)
    #[arg(long, requires = "season_end")]
    pub season_start: Option<String>,

    /// Last day of the seasonal window (MM-DD)
    #[arg(long, requires = "season_start")]
    pub season_end: Option<String>,

    /// Satellite family
    #[arg(long, value_enum)]
    pub satellite: Option<SatelliteArg>,
}

impl SeriesArgs {
    fn to_request(&self, default_resolution: u32) -> Result<SeriesRequest, CliError> {
        let mut request = SeriesRequest::new(
            self.lat,
            self.lon,
            self.start_year,
            self.end_year,
            self.per_year,
            self.resolution.unwrap_or(default_resolution),
        )?;
        if let Some(satellite) = self.satellite {
            request = request.with_satellite(satellite.into());
        }
        if let Some(max_cloud) = self.max_cloud {
            request = request.with_max_cloud_cover(max_cloud);
        }
        if let (Some(start), Some(end)) = (&self.season_start, &self.season_end) {
            request = request.with_window(SeasonalWindow::parse(start, end)?);
        }
        Ok(request)
    }
}

/// Run the series command.
pub fn run(loader: &mut ImageryLoader<ReqwestClient>, args: &SeriesArgs) -> Result<(), CliError> {
    let request = args.to_request(loader.config().resolution)?;
    let report = loader.sample(&request)?;
    let series = &report.series;

    println!(
        "Series {}-{} from {}",
        request.start_year,
        request.end_year,
        series.source().label()
    );
    println!();
    for entry in series.entries() {
        println!(
            "  {}  {}  {:>5.1}%  {}",
            entry.year,
            entry.record.date,
            entry.record.cloud_cover,
            entry.location.display()
        );
        for alternate in &entry.alternates {
            println!(
                "        alt {}  {:>5.1}%  {}",
                alternate.record.date,
                alternate.record.cloud_cover,
                alternate.location.display()
            );
        }
    }
    if !report.empty_years.is_empty() {
        let years: Vec<String> = report.empty_years.iter().map(|y| y.to_string()).collect();
        println!();
        println!("No images found for: {}", years.join(", "));
    }

    println!();
    println!(
        "{} year(s) in series, {} image(s) saved, {} skipped",
        series.len(),
        report.images_saved,
        report.images_skipped
    );
    print_warnings(&report.warnings);
    Ok(())
}
