//! Temporal sampling of one image per year.
//!
//! For every year in a range the sampler searches the active provider inside
//! a seasonal window (March to October by default, when scenes are clearer
//! and vegetation is visible), materializes the candidates, persists them
//! and keeps the lowest-cloud success as that year's entry.
//!
//! # Failure containment
//!
//! ```text
//! bad input (coordinates, years, window) ──► QueryError, before any request
//! search fails for a year                ──► warning, year skipped
//! one image fails to fetch or persist    ──► warning, image skipped
//! year with no candidates                ──► no entry, not an error
//! ```

use std::path::PathBuf;

use chrono::NaiveDate;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::LoaderConfig;
use crate::provider::{
    validate_cloud_cover, validate_point, validate_resolution, ImageRecord, ImageryProvider,
    ProviderError, ProviderKind, QueryError, Satellite, SearchQuery,
};
use crate::storage::image_filename;

/// Month/day bounds applied to every year of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonalWindow {
    pub start_month: u32,
    pub start_day: u32,
    pub end_month: u32,
    pub end_day: u32,
}

impl Default for SeasonalWindow {
    fn default() -> Self {
        Self {
            start_month: 3,
            start_day: 1,
            end_month: 10,
            end_day: 31,
        }
    }
}

impl SeasonalWindow {
    /// Creates a window; both bounds must be valid days and in order.
    pub fn new(
        start_month: u32,
        start_day: u32,
        end_month: u32,
        end_day: u32,
    ) -> Result<Self, QueryError> {
        // A leap year accepts every month/day a window may name.
        let bound = |month, day| {
            NaiveDate::from_ymd_opt(2000, month, day).ok_or_else(|| {
                QueryError::InvalidWindow(format!("{:02}-{:02} is not a day", month, day))
            })
        };
        if bound(start_month, start_day)? > bound(end_month, end_day)? {
            return Err(QueryError::InvalidWindow(format!(
                "{:02}-{:02} is after {:02}-{:02}",
                start_month, start_day, end_month, end_day
            )));
        }
        Ok(Self {
            start_month,
            start_day,
            end_month,
            end_day,
        })
    }

    /// Parses `MM-DD` bounds.
    pub fn parse(start: &str, end: &str) -> Result<Self, QueryError> {
        let month_day = |s: &str| -> Result<(u32, u32), QueryError> {
            s.trim()
                .split_once('-')
                .and_then(|(m, d)| Some((m.parse().ok()?, d.parse().ok()?)))
                .ok_or_else(|| QueryError::InvalidWindow(format!("expected MM-DD, got '{}'", s)))
        };
        let (start_month, start_day) = month_day(start)?;
        let (end_month, end_day) = month_day(end)?;
        Self::new(start_month, start_day, end_month, end_day)
    }

    pub fn start_str(&self) -> String {
        format!("{:02}-{:02}", self.start_month, self.start_day)
    }

    pub fn end_str(&self) -> String {
        format!("{:02}-{:02}", self.end_month, self.end_day)
    }

    /// Date range of the window in `year`.
    ///
    /// A February 29 bound falls back to February 28 in common years.
    pub fn for_year(&self, year: i32) -> Result<(NaiveDate, NaiveDate), QueryError> {
        let date = |month: u32, day: u32| {
            NaiveDate::from_ymd_opt(year, month, day)
                .or_else(|| (month == 2 && day == 29).then(|| NaiveDate::from_ymd_opt(year, 2, 28)).flatten())
                .ok_or(QueryError::InvalidYear(year))
        };
        Ok((
            date(self.start_month, self.start_day)?,
            date(self.end_month, self.end_day)?,
        ))
    }
}

/// Parameters of one series.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesRequest {
    pub lat: f64,
    pub lon: f64,
    pub start_year: i32,
    pub end_year: i32,
    pub images_per_year: usize,
    pub resolution: u32,
    pub satellite: Satellite,
    /// Overrides the sampler's cloud cover ceiling.
    pub max_cloud_cover: Option<f64>,
    /// Overrides the sampler's seasonal window.
    pub window: Option<SeasonalWindow>,
}

impl SeriesRequest {
    pub fn new(
        lat: f64,
        lon: f64,
        start_year: i32,
        end_year: i32,
        images_per_year: usize,
        resolution: u32,
    ) -> Result<Self, QueryError> {
        validate_point(lat, lon)?;
        if start_year > end_year {
            return Err(QueryError::YearOrder {
                start: start_year,
                end: end_year,
            });
        }
        if images_per_year == 0 {
            return Err(QueryError::InvalidLimit);
        }
        validate_resolution(resolution)?;

        Ok(Self {
            lat,
            lon,
            start_year,
            end_year,
            images_per_year,
            resolution,
            satellite: Satellite::default(),
            max_cloud_cover: None,
            window: None,
        })
    }

    pub fn with_satellite(mut self, satellite: Satellite) -> Self {
        self.satellite = satellite;
        self
    }

    pub fn with_max_cloud_cover(mut self, max_cloud_cover: f64) -> Self {
        self.max_cloud_cover = Some(max_cloud_cover);
        self
    }

    pub fn with_window(mut self, window: SeasonalWindow) -> Self {
        self.window = Some(window);
        self
    }
}

/// A persisted image of a year that was not chosen as its entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alternate {
    pub record: ImageRecord,
    pub location: PathBuf,
}

/// The chosen image of one year.
#[derive(Debug, Clone)]
pub struct SeriesEntry {
    pub year: i32,
    pub record: ImageRecord,
    pub image: RgbImage,
    /// Where the image was persisted.
    pub location: PathBuf,
    pub alternates: Vec<Alternate>,
}

/// Year-ordered images from a single provider.
///
/// Entries are sorted by ascending year, at most one per year, and all
/// carry the series' source tag.
#[derive(Debug, Clone)]
pub struct TemporalSeries {
    source: ProviderKind,
    entries: Vec<SeriesEntry>,
}

impl TemporalSeries {
    fn new(source: ProviderKind) -> Self {
        Self {
            source,
            entries: Vec::new(),
        }
    }

    fn push(&mut self, entry: SeriesEntry) {
        debug_assert_eq!(entry.record.source, self.source);
        self.entries.push(entry);
        self.entries.sort_by_key(|e| e.year);
        self.entries.dedup_by_key(|e| e.year);
    }

    pub fn source(&self) -> ProviderKind {
        self.source
    }

    pub fn entries(&self) -> &[SeriesEntry] {
        &self.entries
    }

    pub fn years(&self) -> Vec<i32> {
        self.entries.iter().map(|e| e.year).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<SeriesEntry> {
        self.entries
    }
}

/// Outcome of a sampling run.
#[derive(Debug, Clone)]
pub struct SeriesReport {
    pub series: TemporalSeries,
    /// Images materialized and persisted, alternates included.
    pub images_saved: usize,
    /// Images that failed to materialize or persist.
    pub images_skipped: usize,
    /// Years without any candidate.
    pub empty_years: Vec<i32>,
    pub warnings: Vec<String>,
}

/// Builds yearly series from a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct TemporalSampler {
    max_cloud_cover: f64,
    window: SeasonalWindow,
}

impl Default for TemporalSampler {
    fn default() -> Self {
        Self::new(20.0, SeasonalWindow::default())
    }
}

impl TemporalSampler {
    pub fn new(max_cloud_cover: f64, window: SeasonalWindow) -> Self {
        Self {
            max_cloud_cover,
            window,
        }
    }

    pub fn from_config(config: &LoaderConfig) -> Self {
        Self::new(config.search.series_max_cloud_cover, config.season)
    }

    /// Samples one image per year from `provider`.
    ///
    /// Every record in the series is stamped with `provider.kind()`.
    /// Provider failures are contained per year and per image; only
    /// malformed parameters return an error.
    pub fn sample(
        &self,
        provider: &mut dyn ImageryProvider,
        request: &SeriesRequest,
    ) -> Result<SeriesReport, QueryError> {
        let max_cloud_cover = request.max_cloud_cover.unwrap_or(self.max_cloud_cover);
        validate_cloud_cover(max_cloud_cover)?;
        let window = request.window.unwrap_or(self.window);

        let queries = (request.start_year..=request.end_year)
            .map(|year| {
                let (start, end) = window.for_year(year)?;
                let query = SearchQuery::new(
                    request.lat,
                    request.lon,
                    start,
                    end,
                    max_cloud_cover,
                    request.images_per_year,
                )?
                .with_satellite(request.satellite);
                Ok((year, query))
            })
            .collect::<Result<Vec<_>, QueryError>>()?;

        let source = provider.kind();
        info!(
            source = %source,
            lat = request.lat,
            lon = request.lon,
            start_year = request.start_year,
            end_year = request.end_year,
            "Sampling temporal series"
        );

        let mut report = SeriesReport {
            series: TemporalSeries::new(source),
            images_saved: 0,
            images_skipped: 0,
            empty_years: Vec::new(),
            warnings: Vec::new(),
        };

        for (year, query) in queries {
            let records = match provider.search(&query) {
                Ok(records) => records,
                Err(e) => {
                    warn!(year, error = %e, "Search failed, skipping year");
                    report.warnings.push(format!("{}: search failed: {}", year, e));
                    continue;
                }
            };
            if records.is_empty() {
                debug!(year, "No candidates");
                report.empty_years.push(year);
                continue;
            }

            let mut fetched = Vec::new();
            for mut record in records {
                record.source = source;
                match fetch(provider, &record, request) {
                    Ok((image, location)) => {
                        report.images_saved += 1;
                        fetched.push((record, image, location));
                    }
                    Err(e) => {
                        warn!(year, record = %record.id, error = %e, "Skipping image");
                        report
                            .warnings
                            .push(format!("{}: {} skipped: {}", year, record.id, e));
                        report.images_skipped += 1;
                    }
                }
            }

            fetched.sort_by(|a, b| a.0.cloud_cover.total_cmp(&b.0.cloud_cover));
            let mut fetched = fetched.into_iter();
            if let Some((record, image, location)) = fetched.next() {
                let alternates = fetched
                    .map(|(record, _, location)| Alternate { record, location })
                    .collect();
                report.series.push(SeriesEntry {
                    year,
                    record,
                    image,
                    location,
                    alternates,
                });
            }
        }

        info!(
            source = %source,
            entries = report.series.len(),
            saved = report.images_saved,
            skipped = report.images_skipped,
            "Temporal series complete"
        );
        Ok(report)
    }
}

/// Materializes and persists one record with its sidecar.
fn fetch(
    provider: &mut dyn ImageryProvider,
    record: &ImageRecord,
    request: &SeriesRequest,
) -> Result<(RgbImage, PathBuf), ProviderError> {
    let image = provider.materialize(record, request.resolution)?;
    let filename = image_filename(request.lat, request.lon, record, request.resolution);
    let location = provider.persist(&image, &filename)?;
    provider.persist_metadata(record, &location)?;
    Ok((image, location))
}
