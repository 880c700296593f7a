//! Single entry point over the imagery providers.
//!
//! [`ImageryLoader`] owns exactly one active provider at a time. Every
//! record it hands out is tagged with that provider, and every load checks
//! the tag again, so one analysis never mixes imagery from two sources.
//!
//! # Switching
//!
//! ```text
//! switch(kind) ──► persist ProviderState ──► drop old adapter ──► build new adapter
//! ```
//!
//! Dropping the old adapter drops its handle table, so records obtained
//! before the switch can no longer be materialized, even after switching
//! back.

mod state;

pub use state::ProviderState;

use std::io;
use std::path::PathBuf;

use chrono::NaiveDate;
use image::RgbImage;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::LoaderConfig;
use crate::provider::{
    validate_resolution, HttpClient, ImageRecord, ImageryProvider, ProviderError,
    ProviderFactory, ProviderKind, ProviderStatus, QueryError, SearchQuery,
};
use crate::sampler::{SeriesReport, SeriesRequest, TemporalSampler};
use crate::storage::{DownloadedImage, StorageError};

/// Errors from facade operations.
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("failed to write provider state {}: {source}", path.display())]
    StateWrite { path: PathBuf, source: io::Error },

    #[error("failed to read provider state {}: {source}", path.display())]
    StateRead { path: PathBuf, source: io::Error },

    #[error("invalid provider state {}: {source}", path.display())]
    StateParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("record from {record} cannot be saved while {active} is active")]
    SourceMismatch {
        record: ProviderKind,
        active: ProviderKind,
    },

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Static description of a provider and whether it can be used now.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderDescriptor {
    pub id: ProviderKind,
    pub name: &'static str,
    pub available: bool,
    pub requires_auth: bool,
    pub description: String,
}

/// The active provider as seen by callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceInfo {
    pub source: ProviderKind,
    pub source_name: &'static str,
    pub data_directory: PathBuf,
    pub is_ready: bool,
    pub status: ProviderStatus,
}

/// Result of a search through the facade.
///
/// An unavailable provider yields no records and a non-ready `status`; a
/// failed provider call yields no records and a warning.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchReport {
    pub source: ProviderKind,
    pub status: ProviderStatus,
    pub records: Vec<ImageRecord>,
    pub warnings: Vec<String>,
}

/// Why a load was refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RefusalReason {
    /// The record came from a provider other than the active one.
    SourceMismatch {
        record: ProviderKind,
        active: ProviderKind,
    },
    /// The record predates the active adapter (a switch happened since).
    StaleRecord,
}

/// Outcome of [`ImageryLoader::load_image`].
#[derive(Debug, Clone)]
pub enum LoadOutcome {
    Loaded(RgbImage),
    /// The record is not available from the active provider.
    Refused {
        reason: RefusalReason,
        message: String,
    },
    /// The provider could not produce the pixels.
    Failed { message: String },
}

impl LoadOutcome {
    pub fn image(self) -> Option<RgbImage> {
        match self {
            LoadOutcome::Loaded(image) => Some(image),
            _ => None,
        }
    }

    pub fn is_refused(&self) -> bool {
        matches!(self, LoadOutcome::Refused { .. })
    }
}

/// Source-exclusive imagery facade.
pub struct ImageryLoader<C: HttpClient + Clone + 'static> {
    factory: ProviderFactory<C>,
    sampler: TemporalSampler,
    provider: Box<dyn ImageryProvider>,
    state: ProviderState,
}

impl<C: HttpClient + Clone + 'static> ImageryLoader<C> {
    /// Creates a loader with `initial` active and records that in the
    /// state file.
    ///
    /// A stored state that already names `initial` and its directory is
    /// reused as is, so opening the loader does not touch the file.
    pub fn new(factory: ProviderFactory<C>, initial: ProviderKind) -> Result<Self, LoaderError> {
        let config = factory.config();
        let state_file = config.state_file();
        let data_directory = config.provider_dir(initial);
        let stored = ProviderState::load(&state_file).unwrap_or_else(|e| {
            warn!(error = %e, "Ignoring unreadable provider state");
            None
        });
        let state = match stored {
            Some(state)
                if state.active_source == initial && state.data_directory == data_directory =>
            {
                state
            }
            _ => {
                let state = ProviderState::new(initial, data_directory);
                state.save(&state_file)?;
                state
            }
        };
        let sampler = TemporalSampler::from_config(config);
        let provider = factory.create(initial);
        info!(source = %initial, status = ?provider.status(), "Imagery loader ready");

        Ok(Self {
            factory,
            sampler,
            provider,
            state,
        })
    }

    /// Creates a loader with gcloud credentials, disk storage and the
    /// configured default provider.
    pub fn from_config(http_client: C, config: LoaderConfig) -> Result<Self, LoaderError> {
        let initial = config.default_provider;
        Self::new(ProviderFactory::from_config(http_client, config), initial)
    }

    pub fn config(&self) -> &LoaderConfig {
        self.factory.config()
    }

    pub fn active(&self) -> ProviderKind {
        self.state.active_source
    }

    pub fn state(&self) -> &ProviderState {
        &self.state
    }

    /// Describes every provider, active or not.
    pub fn get_available_sources(&self) -> Vec<ProviderDescriptor> {
        ProviderKind::ALL
            .into_iter()
            .map(|kind| {
                let status = if kind == self.active() {
                    self.provider.status()
                } else {
                    self.factory.probe(kind)
                };
                describe(kind, &status)
            })
            .collect()
    }

    /// Information about the active provider.
    pub fn current_source(&self) -> SourceInfo {
        let status = self.provider.status();
        SourceInfo {
            source: self.active(),
            source_name: self.active().label(),
            data_directory: self.state.data_directory.clone(),
            is_ready: status.is_ready(),
            status,
        }
    }

    /// Makes `kind` the active provider.
    ///
    /// The state file is written first; if that fails nothing changes.
    /// Otherwise the old adapter is dropped and a new one built, even when
    /// `kind` is already active.
    pub fn switch(&mut self, kind: ProviderKind) -> Result<&ProviderState, LoaderError> {
        let config = self.factory.config();
        let state = ProviderState::new(kind, config.provider_dir(kind));
        state.save(&config.state_file())?;

        let previous = self.state.active_source;
        self.provider = self.factory.create(kind);
        self.state = state;
        info!(from = %previous, to = %kind, status = ?self.provider.status(), "Switched provider");
        Ok(&self.state)
    }

    /// Builds a query using the configured cloud ceiling and limit.
    pub fn query(
        &self,
        lat: f64,
        lon: f64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<SearchQuery, QueryError> {
        let defaults = &self.config().search;
        SearchQuery::new(lat, lon, start, end, defaults.max_cloud_cover, defaults.limit)
    }

    /// Searches the active provider.
    ///
    /// Never fails: provider errors become warnings and an empty list.
    pub fn search(&mut self, query: &SearchQuery) -> SearchReport {
        let source = self.active();
        let status = self.provider.status();
        let mut warnings = Vec::new();

        let records = match self.provider.search(query) {
            Ok(records) => records,
            Err(e) => {
                warn!(source = %source, error = %e, "Search failed");
                warnings.push(format!("search failed: {}", e));
                Vec::new()
            }
        };
        if let ProviderStatus::Unavailable { reason } = &status {
            warnings.push(format!("{} unavailable: {}", source.label(), reason));
        }

        let records = records
            .into_iter()
            .map(|mut record| {
                record.source = source;
                record
            })
            .collect();

        SearchReport {
            source,
            status,
            records,
            warnings,
        }
    }

    /// Samples a yearly series from the active provider.
    pub fn sample(&mut self, request: &SeriesRequest) -> Result<SeriesReport, QueryError> {
        self.sampler.sample(self.provider.as_mut(), request)
    }

    /// Materializes a record from the active provider.
    ///
    /// A record tagged with another provider, or issued before the last
    /// switch, is refused without contacting any provider.
    pub fn load_image(
        &mut self,
        record: &ImageRecord,
        resolution: u32,
    ) -> Result<LoadOutcome, QueryError> {
        validate_resolution(resolution)?;

        let active = self.active();
        if record.source != active {
            warn!(
                record = %record.id,
                record_source = %record.source,
                active = %active,
                "Refusing to load image from another source"
            );
            return Ok(LoadOutcome::Refused {
                reason: RefusalReason::SourceMismatch {
                    record: record.source,
                    active,
                },
                message: format!(
                    "image {} comes from {} but {} is active",
                    record.id,
                    record.source.label(),
                    active.label()
                ),
            });
        }

        Ok(match self.provider.materialize(record, resolution) {
            Ok(image) => LoadOutcome::Loaded(image),
            Err(e @ (ProviderError::StaleRecord { .. } | ProviderError::UnknownRecord(_))) => {
                warn!(record = %record.id, error = %e, "Refusing stale record");
                LoadOutcome::Refused {
                    reason: RefusalReason::StaleRecord,
                    message: format!("{}; search again with the active provider", e),
                }
            }
            Err(e) => {
                warn!(record = %record.id, error = %e, "Failed to load image");
                LoadOutcome::Failed {
                    message: e.to_string(),
                }
            }
        })
    }

    /// Persists an image and its sidecar in the active provider's directory.
    pub fn save_image(
        &self,
        image: &RgbImage,
        filename: &str,
        record: &ImageRecord,
    ) -> Result<PathBuf, LoaderError> {
        let active = self.active();
        if record.source != active {
            return Err(LoaderError::SourceMismatch {
                record: record.source,
                active,
            });
        }
        let location = self.provider.persist(image, filename)?;
        self.provider.persist_metadata(record, &location)?;
        Ok(location)
    }

    /// Images persisted by the active provider only.
    pub fn list_downloaded_images(&self) -> Result<Vec<DownloadedImage>, LoaderError> {
        Ok(self.provider.store().list_images()?)
    }
}

fn describe(kind: ProviderKind, status: &ProviderStatus) -> ProviderDescriptor {
    let description = match (kind, status) {
        (ProviderKind::CloudCatalog, ProviderStatus::Ready) => {
            "Free Sentinel-2 and Landsat imagery, no registration needed".to_string()
        }
        (ProviderKind::EarthEngine, ProviderStatus::Ready) => {
            "Requires an Earth Engine account and authentication".to_string()
        }
        (ProviderKind::Synthetic, _) => "Placeholder imagery for development and testing".to_string(),
        (_, ProviderStatus::Unavailable { reason }) => reason.clone(),
    };
    ProviderDescriptor {
        id: kind,
        name: kind.label(),
        available: status.is_ready(),
        requires_auth: kind.requires_auth(),
        description,
    }
}
