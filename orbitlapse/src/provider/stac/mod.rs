//! Public STAC catalog provider (AWS Open Data).
//!
//! Searches a STAC API such as Earth Search for Sentinel-2 or Landsat items
//! and reads the red, green and blue bands straight from their Cloud
//! Optimized GeoTIFF assets.
//!
//! # Search
//!
//! `POST {catalog}/search` with the satellite's collection, a bounding box
//! around the point (wider for coarser sensors), the date interval and a
//! `lte` query on the cloud cover property. Results are re-sorted and
//! filtered client side, since not every catalog honours `sortby`.
//!
//! # Materialize
//!
//! Each band's center window is read with [`cog::read_center_window`],
//! the three windows are stretched by the normalizer and the result is
//! resized to the requested resolution.
//!
//! No authentication is required.

mod cog;
mod models;

use image::RgbImage;
use ndarray::Array2;
use tracing::{debug, warn};

use self::models::{StacItem, StacItemCollection, StacSearchParams};
use crate::config::StacConfig;
use crate::normalize::{fit_to_resolution, normalize, Stretch};
use crate::provider::{
    HandleTable, HttpClient, ImageRecord, ImageryProvider, ProviderError, ProviderKind,
    ProviderStatus, SearchQuery, SessionId,
};
use crate::storage::ImageStore;

/// STAC catalog provider.
///
/// Items found by [`search`](ImageryProvider::search) are kept in the
/// provider's handle table so their asset hrefs never leave the adapter.
pub struct StacProvider<C: HttpClient> {
    http_client: C,
    config: StacConfig,
    stretch: Stretch,
    store: ImageStore,
    session: SessionId,
    handles: HandleTable<StacItem>,
}

impl<C: HttpClient> StacProvider<C> {
    /// Creates a new STAC provider.
    ///
    /// # Arguments
    ///
    /// * `http_client` - HTTP client for catalog and COG requests
    /// * `config` - Catalog URL, collections and band assets
    /// * `stretch` - Percentiles applied when normalizing bands
    /// * `store` - Storage area for persisted images
    pub fn new(http_client: C, config: StacConfig, stretch: Stretch, store: ImageStore) -> Self {
        Self {
            http_client,
            config,
            stretch,
            store,
            session: SessionId::next(),
            handles: HandleTable::new(),
        }
    }

    fn search_url(&self) -> String {
        format!("{}/search", self.config.catalog_url.trim_end_matches('/'))
    }

    fn read_band(&self, item: &StacItem, key: &str, resolution: u32) -> Result<Array2<f32>, ProviderError> {
        let asset = item.asset(key).ok_or_else(|| ProviderError::MissingAsset {
            id: item.id.clone(),
            asset: key.to_string(),
        })?;
        cog::read_center_window(
            &self.http_client,
            &asset.https_href(),
            resolution,
            self.config.oversample,
        )
    }
}

impl<C: HttpClient> ImageryProvider for StacProvider<C> {
    fn kind(&self) -> ProviderKind {
        ProviderKind::CloudCatalog
    }

    fn session(&self) -> SessionId {
        self.session
    }

    fn status(&self) -> ProviderStatus {
        if self.config.catalog_url.trim().is_empty() {
            return ProviderStatus::Unavailable {
                reason: "no STAC catalog URL configured".to_string(),
            };
        }
        ProviderStatus::Ready
    }

    fn search(&mut self, query: &SearchQuery) -> Result<Vec<ImageRecord>, ProviderError> {
        if let ProviderStatus::Unavailable { reason } = self.status() {
            warn!(reason = %reason, "STAC catalog unavailable, returning no results");
            return Ok(Vec::new());
        }

        let satellite = query.satellite;
        let params = StacSearchParams::new(
            self.config.collection(satellite),
            query.bbox(self.config.buffer(satellite)),
            query.datetime_interval(),
            query.limit,
        )
        .cloud_filter(&self.config.cloud_property, query.max_cloud_cover);
        let body = serde_json::to_value(&params)
            .map_err(|e| ProviderError::InvalidResponse(format!("search body: {}", e)))?;

        let url = self.search_url();
        debug!(url = %url, collection = %params.collections[0], "Searching STAC catalog");
        let bytes = self.http_client.post_json(&url, &body, None)?;
        let collection: StacItemCollection = serde_json::from_slice(&bytes)
            .map_err(|e| ProviderError::InvalidResponse(format!("STAC search: {}", e)))?;

        let property = &self.config.cloud_property;
        let mut candidates: Vec<(ImageRecord, StacItem)> = collection
            .features
            .into_iter()
            .filter_map(|item| {
                let (Some(date), Some(cloud_cover)) = (item.date(), item.cloud_cover(property))
                else {
                    debug!(item = %item.id, "Skipping item without date or cloud cover");
                    return None;
                };
                if cloud_cover > query.max_cloud_cover {
                    return None;
                }
                let record = ImageRecord::new(
                    item.id.clone(),
                    date,
                    cloud_cover,
                    ProviderKind::CloudCatalog,
                    item.platform(),
                )
                .issued_by(self.session);
                Some((record, item))
            })
            .collect();

        candidates.sort_by(|a, b| a.0.cloud_cover.total_cmp(&b.0.cloud_cover));
        candidates.truncate(query.limit);

        let mut records = Vec::with_capacity(candidates.len());
        for (record, item) in candidates {
            self.handles.insert(record.id.clone(), item);
            records.push(record);
        }
        debug!(count = records.len(), "STAC search complete");
        Ok(records)
    }

    fn materialize(
        &mut self,
        record: &ImageRecord,
        resolution: u32,
    ) -> Result<RgbImage, ProviderError> {
        let item = self.handles.resolve(&*self, record)?.clone();

        let [red, green, blue] = &self.config.band_assets;
        let red = self.read_band(&item, red, resolution)?;
        let green = self.read_band(&item, green, resolution)?;
        let blue = self.read_band(&item, blue, resolution)?;

        let image = normalize([&red, &green, &blue], self.stretch)?;
        Ok(fit_to_resolution(image, resolution))
    }

    fn store(&self) -> &ImageStore {
        &self.store
    }
}
