//! Core provider types: source tags, image records and the adapter contract.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::NaiveDate;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::query::SearchQuery;
use crate::normalize::NormalizeError;
use crate::storage::{ImageStore, StorageError};

/// Identifies an imagery provider variant.
///
/// Used as the source tag stamped on every record so that a series or a
/// load never mixes imagery from two providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Public cloud catalog (STAC + Cloud Optimized GeoTIFF), no auth.
    #[serde(rename = "aws")]
    CloudCatalog,
    /// Authenticated platform (Google Earth Engine).
    #[serde(rename = "gee")]
    EarthEngine,
    /// Deterministic placeholder imagery for offline development.
    #[serde(rename = "sample")]
    Synthetic,
}

impl ProviderKind {
    /// All provider variants in display order.
    pub const ALL: [ProviderKind; 3] = [
        ProviderKind::CloudCatalog,
        ProviderKind::EarthEngine,
        ProviderKind::Synthetic,
    ];

    /// Stable short identifier, also used as the storage directory name.
    pub fn id(&self) -> &'static str {
        match self {
            ProviderKind::CloudCatalog => "aws",
            ProviderKind::EarthEngine => "gee",
            ProviderKind::Synthetic => "sample",
        }
    }

    /// Human readable label.
    pub fn label(&self) -> &'static str {
        match self {
            ProviderKind::CloudCatalog => "AWS Open Data",
            ProviderKind::EarthEngine => "Google Earth Engine",
            ProviderKind::Synthetic => "Sample Data",
        }
    }

    /// Whether the provider needs external authentication.
    pub fn requires_auth(&self) -> bool {
        matches!(self, ProviderKind::EarthEngine)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.id())
    }
}

impl FromStr for ProviderKind {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "aws" | "stac" | "cloud-catalog" => Ok(ProviderKind::CloudCatalog),
            "gee" | "earth-engine" | "earthengine" => Ok(ProviderKind::EarthEngine),
            "sample" | "synthetic" | "mock" => Ok(ProviderKind::Synthetic),
            other => Err(ProviderError::UnknownProvider(other.to_string())),
        }
    }
}

/// Satellite family requested in a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Satellite {
    #[default]
    Sentinel2,
    Landsat,
}

impl Satellite {
    /// Nominal ground resolution of the visible bands in metres.
    pub fn ground_resolution_m(&self) -> f64 {
        match self {
            Satellite::Sentinel2 => 10.0,
            Satellite::Landsat => 30.0,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Satellite::Sentinel2 => "Sentinel-2",
            Satellite::Landsat => "Landsat",
        }
    }
}

impl FromStr for Satellite {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', '_'], "").as_str() {
            "sentinel2" | "s2" => Ok(Satellite::Sentinel2),
            "landsat" => Ok(Satellite::Landsat),
            _ => Err(ProviderError::UnknownSatellite(s.to_string())),
        }
    }
}

static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);

/// Identity of one adapter instance.
///
/// Every adapter takes a fresh id on construction. Records remember the id
/// of the adapter that issued them; the id is never serialized, so a record
/// read back from disk or held across a provider switch cannot be
/// materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl SessionId {
    pub fn next() -> Self {
        SessionId(NEXT_SESSION.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// One discoverable image.
///
/// Only the scalar fields are serialized. The provider-local reference
/// needed to fetch pixels lives in the issuing adapter's handle table and
/// is reachable only while that adapter (identified by `session`) is alive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// Provider-scoped identifier.
    pub id: String,
    /// Acquisition date.
    pub date: NaiveDate,
    /// Cloud cover percentage (0-100).
    pub cloud_cover: f64,
    /// Provider that produced this record.
    pub source: ProviderKind,
    /// Satellite or platform label.
    pub satellite: String,
    #[serde(skip)]
    pub(crate) session: Option<SessionId>,
}

impl ImageRecord {
    pub fn new(
        id: impl Into<String>,
        date: NaiveDate,
        cloud_cover: f64,
        source: ProviderKind,
        satellite: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            date,
            cloud_cover,
            source,
            satellite: satellite.into(),
            session: None,
        }
    }

    /// Binds the record to the adapter session that can materialize it.
    pub(crate) fn issued_by(mut self, session: SessionId) -> Self {
        self.session = Some(session);
        self
    }

    /// Whether this record can still be materialized by some adapter.
    pub fn is_live(&self) -> bool {
        self.session.is_some()
    }
}

/// Runtime readiness of an adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum ProviderStatus {
    Ready,
    Unavailable { reason: String },
}

impl ProviderStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, ProviderStatus::Ready)
    }
}

/// Errors that can occur in provider operations.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Response body could not be understood.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Image bytes could not be decoded.
    #[error("decode failed: {0}")]
    Decode(String),

    /// Credentials missing or rejected.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The adapter's prerequisites are not met.
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    /// Record was issued by a different or discarded adapter instance.
    #[error("record {id} was not issued by the active {provider} session")]
    StaleRecord { id: String, provider: ProviderKind },

    /// Record is from this session but its handle is gone.
    #[error("no handle for record {0}")]
    UnknownRecord(String),

    /// A required band asset is missing from a catalog item.
    #[error("item {id} has no '{asset}' asset")]
    MissingAsset { id: String, asset: String },

    /// Raster layout not supported by the window reader.
    #[error("unsupported raster: {0}")]
    UnsupportedRaster(String),

    /// Unrecognized provider identifier.
    #[error("unknown provider '{0}'")]
    UnknownProvider(String),

    /// Unrecognized satellite name.
    #[error("unknown satellite '{0}'")]
    UnknownSatellite(String),

    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Capability set shared by all imagery backends.
///
/// Adapters are single-owner and blocking: every call completes its network
/// or disk work before returning.
pub trait ImageryProvider {
    /// Which provider this adapter implements.
    fn kind(&self) -> ProviderKind;

    /// Identity of this adapter instance.
    fn session(&self) -> SessionId;

    /// Whether runtime prerequisites (credentials, endpoints) are satisfied.
    fn status(&self) -> ProviderStatus;

    /// Finds candidate images ordered by ascending cloud cover.
    ///
    /// Returns at most `query.limit` records. An adapter whose
    /// prerequisites are unmet returns an empty list, never an error.
    fn search(&mut self, query: &SearchQuery) -> Result<Vec<ImageRecord>, ProviderError>;

    /// Fetches the pixels of a record issued by this adapter instance.
    ///
    /// The result is exactly `resolution × resolution` RGB.
    fn materialize(
        &mut self,
        record: &ImageRecord,
        resolution: u32,
    ) -> Result<RgbImage, ProviderError>;

    /// Storage area owned by this provider.
    fn store(&self) -> &ImageStore;

    /// Writes an image to this provider's storage area.
    fn persist(&self, image: &RgbImage, filename: &str) -> Result<PathBuf, ProviderError> {
        Ok(self.store().save_png(image, filename)?)
    }

    /// Writes the scalar sidecar for a persisted image.
    fn persist_metadata(
        &self,
        record: &ImageRecord,
        location: &std::path::Path,
    ) -> Result<PathBuf, ProviderError> {
        Ok(self.store().save_sidecar(record, location)?)
    }

    /// Rejects records this instance did not issue.
    fn check_issued(&self, record: &ImageRecord) -> Result<(), ProviderError> {
        if record.source != self.kind() || record.session != Some(self.session()) {
            return Err(ProviderError::StaleRecord {
                id: record.id.clone(),
                provider: self.kind(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> ImageRecord {
        ImageRecord::new(
            "S2A_1",
            NaiveDate::from_ymd_opt(2021, 6, 1).unwrap(),
            4.5,
            ProviderKind::CloudCatalog,
            "sentinel-2a",
        )
    }

    #[test]
    fn test_provider_kind_roundtrip_ids() {
        for kind in ProviderKind::ALL {
            assert_eq!(kind.id().parse::<ProviderKind>().unwrap(), kind);
        }
        assert!("bing".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_only_earth_engine_requires_auth() {
        assert!(ProviderKind::EarthEngine.requires_auth());
        assert!(!ProviderKind::CloudCatalog.requires_auth());
        assert!(!ProviderKind::Synthetic.requires_auth());
    }

    #[test]
    fn test_session_ids_are_unique() {
        let a = SessionId::next();
        let b = SessionId::next();
        assert_ne!(a, b);
    }

    #[test]
    fn test_record_serialization_drops_session() {
        let record = record().issued_by(SessionId::next());
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["source"], "aws");
        assert_eq!(json["date"], "2021-06-01");
        assert!(json.get("session").is_none());

        let back: ImageRecord = serde_json::from_value(json).unwrap();
        assert!(!back.is_live());
        assert_eq!(back.id, record.id);
    }

    #[test]
    fn test_satellite_parse() {
        assert_eq!("sentinel-2".parse::<Satellite>().unwrap(), Satellite::Sentinel2);
        assert_eq!("landsat".parse::<Satellite>().unwrap(), Satellite::Landsat);
        assert!("modis".parse::<Satellite>().is_err());
    }
}
