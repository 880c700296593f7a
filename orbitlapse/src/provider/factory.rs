//! Provider factory for centralized adapter creation.

use std::sync::Arc;

use crate::config::LoaderConfig;
use crate::provider::{
    CredentialSource, EarthEngineProvider, GcloudCredentials, HttpClient, ImageryProvider,
    ProviderKind, ProviderStatus, StacProvider, SyntheticProvider,
};
use crate::storage::{DiskStorage, ImageStore, Storage};

/// Factory for creating imagery providers.
///
/// Holds everything an adapter needs (HTTP client, credentials, storage
/// backend and configuration) so the loader can build a fresh adapter on
/// every provider switch.
#[derive(Clone)]
pub struct ProviderFactory<C: HttpClient + Clone> {
    http_client: C,
    credentials: Arc<dyn CredentialSource>,
    storage: Arc<dyn Storage>,
    config: LoaderConfig,
}

impl<C: HttpClient + Clone + 'static> ProviderFactory<C> {
    pub fn new(
        http_client: C,
        credentials: Arc<dyn CredentialSource>,
        storage: Arc<dyn Storage>,
        config: LoaderConfig,
    ) -> Self {
        Self {
            http_client,
            credentials,
            storage,
            config,
        }
    }

    /// Creates a factory with gcloud credentials and disk storage.
    pub fn from_config(http_client: C, config: LoaderConfig) -> Self {
        let credentials = Arc::new(GcloudCredentials::from_config(&config.earth_engine));
        Self::new(http_client, credentials, Arc::new(DiskStorage), config)
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Storage area of a provider.
    pub fn store(&self, kind: ProviderKind) -> ImageStore {
        ImageStore::new(
            kind,
            self.config.provider_dir(kind),
            Arc::clone(&self.storage),
        )
    }

    /// Readiness of a provider that may not be active.
    ///
    /// Never starts an interactive login.
    pub fn probe(&self, kind: ProviderKind) -> ProviderStatus {
        match kind {
            ProviderKind::EarthEngine if !self.credentials.probe() => ProviderStatus::Unavailable {
                reason: "Earth Engine credentials not found".to_string(),
            },
            ProviderKind::EarthEngine => ProviderStatus::Ready,
            _ => self.create(kind).status(),
        }
    }

    /// Builds a new adapter instance with its own session.
    pub fn create(&self, kind: ProviderKind) -> Box<dyn ImageryProvider> {
        let store = self.store(kind);
        match kind {
            ProviderKind::CloudCatalog => Box::new(StacProvider::new(
                self.http_client.clone(),
                self.config.stac.clone(),
                self.config.stretch,
                store,
            )),
            ProviderKind::EarthEngine => Box::new(EarthEngineProvider::new(
                self.http_client.clone(),
                self.config.earth_engine.clone(),
                Arc::clone(&self.credentials),
                store,
            )),
            ProviderKind::Synthetic => Box::new(SyntheticProvider::new(self.config.stretch, store)),
        }
    }
}
