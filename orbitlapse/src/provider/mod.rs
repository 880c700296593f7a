//! Satellite imagery provider abstraction
//!
//! This module provides the [`ImageryProvider`] contract and its three
//! adapters: a public STAC catalog serving Cloud Optimized GeoTIFFs, Google
//! Earth Engine, and a synthetic source for offline development.
//!
//! # Factory Pattern
//!
//! Adapters are built through the [`ProviderFactory`]:
//!
//! ```ignore
//! use orbitlapse::provider::{ProviderFactory, ProviderKind, ReqwestClient};
//!
//! let factory = ProviderFactory::from_config(ReqwestClient::new()?, config);
//! let provider = factory.create(ProviderKind::CloudCatalog);
//! ```
//!
//! # Handles
//!
//! Records returned by `search` carry only scalar fields. The reference an
//! adapter needs to fetch pixels stays in the adapter's [`HandleTable`] and
//! is dropped with the adapter.

mod earth_engine;
mod factory;
mod handles;
mod http;
mod query;
mod stac;
mod synthetic;
mod types;

pub use earth_engine::{
    CredentialSource, EarthEngineProvider, GcloudCredentials, StaticCredentials,
};
pub use factory::ProviderFactory;
pub use handles::HandleTable;
pub use http::{HttpClient, ReqwestClient, DEFAULT_TIMEOUT_SECS};
pub use query::{
    validate_cloud_cover, validate_point, validate_resolution, QueryError, SearchQuery, MAX_LAT,
    MAX_LON, MIN_LAT, MIN_LON,
};
pub use stac::StacProvider;
pub use synthetic::SyntheticProvider;
pub use types::{
    ImageRecord, ImageryProvider, ProviderError, ProviderKind, ProviderStatus, Satellite,
    SessionId,
};

#[cfg(test)]
pub use http::tests::{MockHttpClient, RecordedRequest};
