//! Search parameters and up-front validation.
//!
//! Malformed input is rejected here, before any adapter touches the network.

use chrono::NaiveDate;
use thiserror::Error;

use super::types::Satellite;

/// Minimum valid latitude.
pub const MIN_LAT: f64 = -90.0;
/// Maximum valid latitude.
pub const MAX_LAT: f64 = 90.0;
/// Minimum valid longitude.
pub const MIN_LON: f64 = -180.0;
/// Maximum valid longitude.
pub const MAX_LON: f64 = 180.0;

/// Contract violations in caller-supplied parameters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    #[error("latitude {0} outside -90..=90")]
    InvalidLatitude(f64),

    #[error("longitude {0} outside -180..=180")]
    InvalidLongitude(f64),

    #[error("start date {start} is after end date {end}")]
    DateOrder { start: NaiveDate, end: NaiveDate },

    #[error("start year {start} is after end year {end}")]
    YearOrder { start: i32, end: i32 },

    #[error("year {0} cannot be represented")]
    InvalidYear(i32),

    #[error("cloud cover ceiling {0} outside 0..=100")]
    InvalidCloudCover(f64),

    #[error("resolution must be positive")]
    InvalidResolution,

    #[error("limit must be positive")]
    InvalidLimit,

    #[error("invalid seasonal window: {0}")]
    InvalidWindow(String),
}

/// Validates a geographic point.
pub fn validate_point(lat: f64, lon: f64) -> Result<(), QueryError> {
    if !(MIN_LAT..=MAX_LAT).contains(&lat) {
        return Err(QueryError::InvalidLatitude(lat));
    }
    if !(MIN_LON..=MAX_LON).contains(&lon) {
        return Err(QueryError::InvalidLongitude(lon));
    }
    Ok(())
}

/// Validates a cloud cover ceiling.
pub fn validate_cloud_cover(max_cloud_cover: f64) -> Result<(), QueryError> {
    if !(0.0..=100.0).contains(&max_cloud_cover) {
        return Err(QueryError::InvalidCloudCover(max_cloud_cover));
    }
    Ok(())
}

/// Validates an output resolution.
pub fn validate_resolution(resolution: u32) -> Result<(), QueryError> {
    if resolution == 0 {
        return Err(QueryError::InvalidResolution);
    }
    Ok(())
}

/// A validated image search near a point.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub lat: f64,
    pub lon: f64,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub max_cloud_cover: f64,
    pub limit: usize,
    pub satellite: Satellite,
}

impl SearchQuery {
    /// Builds a query, rejecting out-of-range or inconsistent parameters.
    pub fn new(
        lat: f64,
        lon: f64,
        start: NaiveDate,
        end: NaiveDate,
        max_cloud_cover: f64,
        limit: usize,
    ) -> Result<Self, QueryError> {
        validate_point(lat, lon)?;
        if start > end {
            return Err(QueryError::DateOrder { start, end });
        }
        validate_cloud_cover(max_cloud_cover)?;
        if limit == 0 {
            return Err(QueryError::InvalidLimit);
        }

        Ok(Self {
            lat,
            lon,
            start,
            end,
            max_cloud_cover,
            limit,
            satellite: Satellite::default(),
        })
    }

    /// Selects the satellite family.
    pub fn with_satellite(mut self, satellite: Satellite) -> Self {
        self.satellite = satellite;
        self
    }

    /// Bounding box `[west, south, east, north]` around the point.
    pub fn bbox(&self, buffer_degrees: f64) -> [f64; 4] {
        [
            (self.lon - buffer_degrees).max(MIN_LON),
            (self.lat - buffer_degrees).max(MIN_LAT),
            (self.lon + buffer_degrees).min(MAX_LON),
            (self.lat + buffer_degrees).min(MAX_LAT),
        ]
    }

    /// Date range formatted as an RFC 3339 interval covering whole days.
    pub fn datetime_interval(&self) -> String {
        format!("{}T00:00:00Z/{}T23:59:59Z", self.start, self.end)
    }
}
