//! OrbitLapse - multi-year satellite image series for a single location
//!
//! This library finds, downloads and normalizes optical satellite imagery
//! from interchangeable providers (a public STAC catalog, Google Earth
//! Engine, or a synthetic source) and assembles one image per year into a
//! temporal series.
//!
//! Exactly one provider is active at a time. [`loader::ImageryLoader`]
//! refuses to load imagery tagged with any other provider, and every
//! provider keeps its images in its own directory, so an analysis never
//! mixes sources.
//!
//! # Example
//!
//! ```no_run
//! use chrono::NaiveDate;
//! use orbitlapse::config::LoaderConfig;
//! use orbitlapse::loader::{ImageryLoader, LoadOutcome};
//! use orbitlapse::provider::{ProviderKind, ReqwestClient};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = LoaderConfig::default().with_default_provider(ProviderKind::Synthetic);
//! let mut loader = ImageryLoader::from_config(ReqwestClient::new()?, config)?;
//!
//! let query = loader.query(
//!     -3.47,
//!     -62.21,
//!     NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
//!     NaiveDate::from_ymd_opt(2021, 12, 31).unwrap(),
//! )?;
//! let report = loader.search(&query);
//! if let Some(record) = report.records.first() {
//!     if let LoadOutcome::Loaded(image) = loader.load_image(record, 512)? {
//!         loader.save_image(&image, &record.id, record)?;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod loader;
pub mod logging;
pub mod normalize;
pub mod provider;
pub mod sampler;
pub mod storage;

pub use loader::{ImageryLoader, LoadOutcome, LoaderError};
pub use provider::{ImageRecord, ProviderKind};
